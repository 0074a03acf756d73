use std::io::Read;

use super::{BoundedLine, LineAssembler, CHUNK_SIZE_BYTES};

pub struct SyncBoundedLineReader<R: Read> {
    reader: R,
    assembler: LineAssembler,
    buffer: Box<[u8; CHUNK_SIZE_BYTES]>,
    buffer_pos: usize,
    buffer_len: usize,
    done: bool,
}

impl<R: Read> SyncBoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            assembler: LineAssembler::new(max_line_bytes),
            buffer: Box::new([0u8; CHUNK_SIZE_BYTES]),
            buffer_pos: 0,
            buffer_len: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for SyncBoundedLineReader<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.buffer_pos >= self.buffer_len {
                self.buffer_pos = 0;
                match self.reader.read(&mut self.buffer[..]) {
                    Ok(0) => {
                        self.done = true;
                        return self.assembler.finish();
                    }
                    Ok(n) => self.buffer_len = n,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        self.done = true;
                        return Some(self.assembler.io_error());
                    }
                }
            }

            let (used, line) = self
                .assembler
                .push(&self.buffer[self.buffer_pos..self.buffer_len]);
            self.buffer_pos += used;
            if line.is_some() {
                return line;
            }
        }
    }
}

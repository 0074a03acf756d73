use tokio::io::{AsyncRead, AsyncReadExt};

use super::{BoundedLine, LineAssembler, CHUNK_SIZE_BYTES};

pub struct AsyncBoundedLineReader<R: AsyncRead + Unpin> {
    reader: R,
    assembler: LineAssembler,
    buffer: Box<[u8; CHUNK_SIZE_BYTES]>,
    buffer_pos: usize,
    buffer_len: usize,
    done: bool,
}

impl<R: AsyncRead + Unpin> AsyncBoundedLineReader<R> {
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

    pub async fn next_line(&mut self) -> Option<BoundedLine> {
        if self.done {
            return None;
        }

        loop {
            if self.buffer_pos >= self.buffer_len {
                self.buffer_pos = 0;
                match self.reader.read(&mut self.buffer[..]).await {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_lines_across_small_chunks() {
        let (mut tx, rx) = tokio::io::duplex(4);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            tx.write_all(b"first line\nsecond").await.unwrap();
        });

        let mut reader = AsyncBoundedLineReader::new(rx, 64);
        assert_eq!(
            reader.next_line().await,
            Some(BoundedLine::Line {
                line_number: 1,
                bytes: b"first line".to_vec()
            })
        );
        assert_eq!(
            reader.next_line().await,
            Some(BoundedLine::Line {
                line_number: 2,
                bytes: b"second".to_vec()
            })
        );
        assert_eq!(reader.next_line().await, None);
        writer.await.unwrap();
    }
}

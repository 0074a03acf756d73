//! Bounded line splitting over byte streams.
//!
//! A line longer than the configured limit is never buffered in full: once it
//! crosses the limit its bytes are dropped and a single
//! [`BoundedLine::LineTooLong`] is reported when its newline arrives.

mod sync;

#[cfg(feature = "tokio")]
mod tokio;

pub use sync::SyncBoundedLineReader;

#[cfg(feature = "tokio")]
pub use self::tokio::AsyncBoundedLineReader;

pub(crate) const CHUNK_SIZE_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    IoError {
        line_number: usize,
    },
}

/// Reader-agnostic line state shared by the sync and async readers.
#[derive(Debug)]
pub(crate) struct LineAssembler {
    max_line_bytes: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    too_long: bool,
    line_number: usize,
}

impl LineAssembler {
    pub(crate) fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            current_line: Vec::new(),
            observed_bytes: 0,
            too_long: false,
            line_number: 0,
        }
    }

    /// Consumes `chunk` up to and including its first newline.
    ///
    /// Returns the number of bytes consumed and the line that newline closed, if any.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> (usize, Option<BoundedLine>) {
        match chunk.iter().position(|b| *b == b'\n') {
            Some(idx) => {
                self.append(&chunk[..idx]);
                (idx + 1, Some(self.take_line()))
            }
            None => {
                self.append(chunk);
                (chunk.len(), None)
            }
        }
    }

    /// Flushes an unterminated final line at end of input.
    pub(crate) fn finish(&mut self) -> Option<BoundedLine> {
        if self.too_long || !self.current_line.is_empty() {
            Some(self.take_line())
        } else {
            None
        }
    }

    pub(crate) fn io_error(&mut self) -> BoundedLine {
        self.line_number += 1;
        BoundedLine::IoError {
            line_number: self.line_number,
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.observed_bytes = self.observed_bytes.saturating_add(bytes.len());
        if self.too_long {
            return;
        }
        if self.observed_bytes > self.max_line_bytes {
            self.too_long = true;
            self.current_line = Vec::new();
            return;
        }
        self.current_line.extend_from_slice(bytes);
    }

    fn take_line(&mut self) -> BoundedLine {
        self.line_number += 1;
        let line_number = self.line_number;
        let observed_bytes = std::mem::take(&mut self.observed_bytes);
        let bytes = std::mem::take(&mut self.current_line);
        if std::mem::take(&mut self.too_long) {
            return BoundedLine::LineTooLong {
                line_number,
                observed_bytes,
                max_line_bytes: self.max_line_bytes,
            };
        }
        BoundedLine::Line { line_number, bytes }
    }
}

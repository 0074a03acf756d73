use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AdapterErrorCode {
    JsonParse,
    Unknown,
}

/// Why a single line of agent output produced no record.
///
/// None of these end ingestion; the next line is read as usual.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LineRecordError {
    #[error("I/O error while reading agent output")]
    Io,
    #[error("invalid UTF-8 in agent output")]
    InvalidUtf8,
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("adapter parse failure ({code:?}): {summary}")]
    Adapter {
        code: AdapterErrorCode,
        summary: String,
        /// Present only with [`crate::ErrorDetailCapture::FullDetails`].
        details: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord<T> {
    pub line_number: usize,
    pub outcome: Result<T, LineRecordError>,
}

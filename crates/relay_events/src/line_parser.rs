use std::error::Error;

use crate::error::AdapterErrorCode;

/// One non-blank line, with any trailing `\r` already removed.
pub struct LineInput<'a> {
    pub line: &'a str,
}

pub trait LineParser {
    type Event;
    type Error: ClassifiedParserError;

    /// `Ok(None)` skips the line without surfacing anything.
    fn parse_line(&mut self, input: LineInput<'_>) -> Result<Option<Self::Event>, Self::Error>;
}

pub trait ClassifiedParserError: Error {
    fn code(&self) -> AdapterErrorCode;
    /// Must not contain the raw input line.
    fn redacted_summary(&self) -> String;
    fn full_details(&self) -> String;
}

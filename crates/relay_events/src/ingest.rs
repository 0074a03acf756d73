use std::io::Read;

use crate::config::{ErrorDetailCapture, IngestConfig};
use crate::error::{LineRecord, LineRecordError};
use crate::line_parser::{ClassifiedParserError, LineInput, LineParser};
use crate::reader::{BoundedLine, SyncBoundedLineReader};

/// Turns bounded lines into parser records; shared by both ingestors.
struct LineDecoder<P: LineParser> {
    parser: P,
    config: IngestConfig,
}

impl<P: LineParser> LineDecoder<P> {
    fn new(parser: P, config: IngestConfig) -> Self {
        Self { parser, config }
    }

    /// `None` means the line is skipped (blank, or the parser declined it).
    fn decode(&mut self, next: BoundedLine) -> Option<LineRecord<P::Event>> {
        let (line_number, outcome) = match next {
            BoundedLine::IoError { line_number } => (line_number, Err(LineRecordError::Io)),
            BoundedLine::LineTooLong {
                line_number,
                observed_bytes,
                max_line_bytes,
            } => (
                line_number,
                Err(LineRecordError::LineTooLong {
                    observed_bytes,
                    max_line_bytes,
                }),
            ),
            BoundedLine::Line { line_number, bytes } => {
                let Ok(raw_line) = String::from_utf8(bytes) else {
                    return Some(LineRecord {
                        line_number,
                        outcome: Err(LineRecordError::InvalidUtf8),
                    });
                };
                let line = raw_line.strip_suffix('\r').unwrap_or(&raw_line);
                if line.trim().is_empty() {
                    return None;
                }
                match self.parser.parse_line(LineInput { line }) {
                    Ok(None) => return None,
                    Ok(Some(event)) => (line_number, Ok(event)),
                    Err(err) => (line_number, Err(self.adapter_error(&err))),
                }
            }
        };
        Some(LineRecord {
            line_number,
            outcome,
        })
    }

    fn adapter_error<E: ClassifiedParserError>(&self, err: &E) -> LineRecordError {
        let details = match self.config.error_detail_capture {
            ErrorDetailCapture::FullDetails => Some(err.full_details()),
            ErrorDetailCapture::RedactedSummaryOnly => None,
        };
        LineRecordError::Adapter {
            code: err.code(),
            summary: err.redacted_summary(),
            details,
        }
    }
}

/// Blocking line-by-line ingestion, e.g. for replaying a captured transcript.
pub struct LineIngestor<R: Read, P: LineParser> {
    reader: SyncBoundedLineReader<R>,
    decoder: LineDecoder<P>,
}

impl<R: Read, P: LineParser> LineIngestor<R, P> {
    pub fn new(reader: R, parser: P, config: IngestConfig) -> Self {
        Self {
            reader: SyncBoundedLineReader::new(reader, config.limits.max_line_bytes),
            decoder: LineDecoder::new(parser, config),
        }
    }
}

impl<R: Read, P: LineParser> Iterator for LineIngestor<R, P> {
    type Item = LineRecord<P::Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.reader.next()?;
            if let Some(record) = self.decoder.decode(next) {
                return Some(record);
            }
        }
    }
}

#[cfg(feature = "tokio")]
mod tokio_ingest {
    use tokio::io::AsyncRead;

    use super::LineDecoder;
    use crate::config::IngestConfig;
    use crate::error::LineRecord;
    use crate::line_parser::LineParser;
    use crate::reader::AsyncBoundedLineReader;

    pub struct AsyncLineIngestor<R: AsyncRead + Unpin, P: LineParser> {
        reader: AsyncBoundedLineReader<R>,
        decoder: LineDecoder<P>,
    }

    impl<R: AsyncRead + Unpin, P: LineParser> AsyncLineIngestor<R, P> {
        pub fn new(reader: R, parser: P, config: IngestConfig) -> Self {
            Self {
                reader: AsyncBoundedLineReader::new(reader, config.limits.max_line_bytes),
                decoder: LineDecoder::new(parser, config),
            }
        }

        pub async fn next_record(&mut self) -> Option<LineRecord<P::Event>> {
            loop {
                let next = self.reader.next_line().await?;
                if let Some(record) = self.decoder.decode(next) {
                    return Some(record);
                }
            }
        }
    }

}

#[cfg(feature = "tokio")]
pub use tokio_ingest::AsyncLineIngestor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestLimits;
    use crate::error::AdapterErrorCode;

    #[derive(Default)]
    struct TestParser;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct TestErr;

    impl ClassifiedParserError for TestErr {
        fn code(&self) -> AdapterErrorCode {
            AdapterErrorCode::Unknown
        }

        fn redacted_summary(&self) -> String {
            "boom".to_string()
        }

        fn full_details(&self) -> String {
            "boom details".to_string()
        }
    }

    impl LineParser for TestParser {
        type Event = String;
        type Error = TestErr;

        fn parse_line(&mut self, input: LineInput<'_>) -> Result<Option<Self::Event>, Self::Error> {
            match input.line {
                "skip" => Ok(None),
                "fail" => Err(TestErr),
                line => Ok(Some(line.to_string())),
            }
        }
    }

    fn ingest(data: &[u8], config: IngestConfig) -> Vec<LineRecord<String>> {
        LineIngestor::new(std::io::Cursor::new(data.to_vec()), TestParser, config).collect()
    }

    #[test]
    fn bad_lines_do_not_stop_ingestion() {
        let mut data = b"one\n\xff\xfe\n".to_vec();
        data.extend_from_slice(&[b'x'; 40]);
        data.extend_from_slice(b"\nskip\nfail\ntwo");
        let config = IngestConfig {
            limits: IngestLimits { max_line_bytes: 16 },
            ..IngestConfig::default()
        };

        let records = ingest(&data, config);
        let outcomes: Vec<_> = records
            .iter()
            .map(|rec| (rec.line_number, rec.outcome.clone()))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                (1, Ok("one".to_string())),
                (2, Err(LineRecordError::InvalidUtf8)),
                (
                    3,
                    Err(LineRecordError::LineTooLong {
                        observed_bytes: 40,
                        max_line_bytes: 16
                    })
                ),
                (
                    5,
                    Err(LineRecordError::Adapter {
                        code: AdapterErrorCode::Unknown,
                        summary: "boom".to_string(),
                        details: None
                    })
                ),
                (6, Ok("two".to_string())),
            ]
        );
    }

    #[test]
    fn full_details_are_opt_in() {
        let config = IngestConfig {
            error_detail_capture: ErrorDetailCapture::FullDetails,
            ..IngestConfig::default()
        };
        let records = ingest(b"fail\n", config);
        match &records[0].outcome {
            Err(LineRecordError::Adapter { details, .. }) => {
                assert_eq!(details.as_deref(), Some("boom details"));
            }
            other => panic!("expected adapter error, got {other:?}"),
        }
    }
}

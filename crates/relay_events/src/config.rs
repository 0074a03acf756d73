/// How much of a parser failure is kept on the emitted [`crate::LineRecordError`].
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ErrorDetailCapture {
    /// Only a summary that never echoes the offending line.
    #[default]
    RedactedSummaryOnly,
    /// Also keep the parser's full diagnostic, raw input included.
    FullDetails,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestLimits {
    pub max_line_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct IngestConfig {
    pub limits: IngestLimits,
    pub error_detail_capture: ErrorDetailCapture,
}

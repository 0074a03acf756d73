use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent a run from being started or observed.
///
/// Anything the agent itself reports, including a non-zero exit or a
/// timeout, arrives as a terminal event instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("codex binary `{binary}` could not be spawned: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for codex process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("codex stdout unavailable")]
    StdoutUnavailable,
    #[error("codex stderr unavailable")]
    StderrUnavailable,
    #[error("codex stdin unavailable")]
    StdinUnavailable,
    #[error("failed to write prompt to codex stdin: {0}")]
    StdinWrite(#[source] std::io::Error),
    #[error("failed to capture codex output: {0}")]
    CaptureIo(#[from] std::io::Error),
    #[error("failed to join codex run task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

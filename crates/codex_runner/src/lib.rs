#![forbid(unsafe_code)]
//! Runs `codex exec --json` and streams its output as [`relay_events::NormalizedEvent`]s.
//!
//! ```rust,no_run
//! use codex_runner::{CodexRunner, RunRequest};
//! use futures_util::StreamExt;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = CodexRunner::builder().profile("work").build();
//! let mut run = runner.run(RunRequest::new("Summarize the repo")).await?;
//! while let Some(event) = run.events.next().await {
//!     println!("{event:?}");
//! }
//! let summary = run.completion.await?;
//! println!("exit: {:?}", summary.status);
//! # Ok(()) }
//! ```

mod builder;
mod error;
mod process;
mod run;
mod stream;

pub use builder::{
    default_binary_path, default_extra_args, CodexRunnerBuilder, CODEX_BINARY_ENV,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use error::RunnerError;
pub use process::StderrTail;
pub use run::{
    CodexRunner, DynEventStream, DynRunCompletion, RunRequest, RunStream, RunSummary,
    STDERR_DRAIN_GRACE,
};

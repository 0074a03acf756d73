#![forbid(unsafe_code)]
//! Codex event adaptation and live-status rendering.
//!
//! This crate holds the synchronous core of a relay run:
//! - A bounded-memory, line-oriented ingestion loop (sync + optional tokio).
//! - [`CodexAdapter`], which folds `codex exec --json` records into [`NormalizedEvent`]s.
//! - [`ExecProgressRenderer`], which turns those events into progress and final messages.
//!
//! Nothing here spawns processes or talks to a transport.

mod config;
mod error;
mod ingest;
mod line_parser;
mod reader;

pub mod classify;
pub mod codex_adapter;
pub mod model;
pub mod record;
pub mod render;
pub mod text;

pub use codex_adapter::{CodexAdapter, CodexLineParser, CodexRunState};
pub use config::{ErrorDetailCapture, IngestConfig, IngestLimits};
pub use error::{AdapterErrorCode, LineRecord, LineRecordError};
pub use ingest::LineIngestor;
pub use line_parser::{ClassifiedParserError, LineInput, LineParser};
pub use model::{
    Action, ActionDetail, ActionEvent, ActionKind, ActionLevel, ActionPhase, CompletedEvent,
    EngineId, NormalizedEvent, ResumeToken, StartedEvent,
};
pub use record::Record;
pub use render::{ExecProgressRenderer, ExecRenderState};

#[cfg(feature = "tokio")]
pub use ingest::AsyncLineIngestor;

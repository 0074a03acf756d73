//! Offline replay of a recorded `codex exec --json` stream.

use std::{
    fs::File,
    io::{self, BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use relay_events::{
    CodexAdapter, CodexLineParser, CompletedEvent, ExecProgressRenderer, IngestConfig,
    LineIngestor, NormalizedEvent,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::relay::{render_summary, RelayOptions};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to open `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write replay output: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub completed: Option<CompletedEvent>,
    pub skipped_lines: usize,
}

/// Where replayed output goes: rendered snapshots, or one JSON event per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayFormat {
    #[default]
    Rendered,
    Json,
}

pub fn replay_file<W: Write>(
    path: &Path,
    options: &RelayOptions,
    format: ReplayFormat,
    out: &mut W,
) -> Result<ReplaySummary, ReplayError> {
    let file = File::open(path).map_err(|source| ReplayError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "replaying recorded stream");
    replay_reader(BufReader::new(file), options, format, out)
}

/// Drives adapter and renderer over `reader`, as a live run would, with the clock stopped.
pub fn replay_reader<R: io::Read, W: Write>(
    reader: R,
    options: &RelayOptions,
    format: ReplayFormat,
    out: &mut W,
) -> Result<ReplaySummary, ReplayError> {
    let mut printer = Printer {
        adapter: CodexAdapter::default(),
        renderer: ExecProgressRenderer::new(options.max_actions, options.max_chars),
        format,
        last_snapshot: None,
        completed: None,
    };

    let mut skipped_lines = 0;
    let ingestor = LineIngestor::new(reader, CodexLineParser::new(), IngestConfig::default());
    for record in ingestor {
        let record = match record.outcome {
            Ok(record) => record,
            Err(err) => {
                warn!(line = record.line_number, error = %err, "skipping unreadable line");
                skipped_lines += 1;
                continue;
            }
        };
        let events = printer.adapter.translate(&record);
        printer.emit(events, out)?;
        if printer.completed.is_some() {
            break;
        }
    }

    if printer.completed.is_none() {
        let events = printer.adapter.finish();
        printer.emit(events, out)?;
    }

    if let (ReplayFormat::Rendered, Some(done)) = (format, printer.completed.as_ref()) {
        writeln!(out, "{}", render_summary(&printer.renderer, Duration::ZERO, done))?;
    }

    Ok(ReplaySummary {
        completed: printer.completed,
        skipped_lines,
    })
}

struct Printer {
    adapter: CodexAdapter,
    renderer: ExecProgressRenderer,
    format: ReplayFormat,
    last_snapshot: Option<String>,
    completed: Option<CompletedEvent>,
}

impl Printer {
    fn emit<W: Write>(
        &mut self,
        events: Vec<NormalizedEvent>,
        out: &mut W,
    ) -> Result<(), ReplayError> {
        for event in events {
            if self.format == ReplayFormat::Json {
                serde_json::to_writer(&mut *out, &event)?;
                writeln!(out)?;
            }
            if let NormalizedEvent::Completed(done) = event {
                self.completed = Some(done);
                return Ok(());
            }
            if !self.renderer.note_event(&event) || self.format == ReplayFormat::Json {
                continue;
            }
            let snapshot = self.renderer.render_progress(Duration::ZERO);
            if self.last_snapshot.as_deref() != Some(snapshot.as_str()) {
                writeln!(out, "{snapshot}\n")?;
                self.last_snapshot = Some(snapshot);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transcript(records: &[serde_json::Value]) -> String {
        records.iter().map(|record| format!("{record}\n")).collect()
    }

    fn run(data: &str, format: ReplayFormat) -> (ReplaySummary, String) {
        let mut out = Vec::new();
        let summary =
            replay_reader(data.as_bytes(), &RelayOptions::default(), format, &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    fn ls_transcript() -> String {
        transcript(&[
            json!({"type": "thread.started", "thread_id": "thread-9"}),
            json!({"type": "item.started", "item": {"id": "item_0", "type": "command_execution", "command": "ls -la", "status": "in_progress"}}),
            json!({"type": "item.completed", "item": {"id": "item_0", "type": "command_execution", "command": "ls -la", "exit_code": 0, "status": "completed"}}),
            json!({"type": "turn.completed"}),
        ])
    }

    #[test]
    fn rendered_replay_prints_snapshots_then_summary() {
        let (summary, output) = run(&ls_transcript(), ReplayFormat::Rendered);

        let done = summary.completed.expect("completion");
        assert!(done.ok);
        assert_eq!(done.resume.map(|token| token.value).as_deref(), Some("thread-9"));
        assert_eq!(summary.skipped_lines, 0);

        assert!(output.contains("▸ running: `ls -la`"), "{output}");
        assert!(output.contains("✓ ran: `ls -la` (exit 0)"), "{output}");
        assert!(output.trim_end().ends_with("done · 0s · turn 0"), "{output}");
    }

    #[test]
    fn json_replay_prints_one_event_per_line() {
        let (summary, output) = run(&ls_transcript(), ReplayFormat::Json);
        assert!(summary.completed.is_some());

        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["event"], "started");
        assert_eq!(lines[3]["event"], "completed");
        assert_eq!(lines[3]["ok"], true);
    }

    #[test]
    fn truncated_stream_reports_session_loss_and_skips_garbage() {
        let data = "garbage\n{\"type\":\"turn.started\"}\n";
        let (summary, output) = run(data, ReplayFormat::Rendered);

        assert_eq!(summary.skipped_lines, 1);
        let done = summary.completed.expect("completion");
        assert!(!done.ok);
        assert!(output.contains("no session_id/thread_id"), "{output}");
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let err = replay_file(
            &dir.path().join("missing.jsonl"),
            &RelayOptions::default(),
            ReplayFormat::Rendered,
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, ReplayError::Open { .. }));
    }
}

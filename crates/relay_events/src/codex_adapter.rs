//! Protocol adapter for `codex exec --json`.
//!
//! [`CodexAdapter`] folds one [`Record`] at a time into zero or more
//! [`NormalizedEvent`]s, tracking the per-run state it needs: the synthetic
//! turn counter, the captured session token, and the latest agent message.

use std::{
    path::PathBuf,
    sync::OnceLock,
    time::Duration,
};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classify::classify_item;
use crate::error::AdapterErrorCode;
use crate::line_parser::{ClassifiedParserError, LineInput, LineParser};
use crate::model::{
    Action, ActionDetail, ActionEvent, ActionKind, ActionLevel, ActionPhase, CompletedEvent,
    EngineId, NormalizedEvent, ResumeToken, StartedEvent,
};
use crate::record::{extract_numeric_id, item_id, Item, Record, StreamError};

pub const ENGINE: &str = "codex";
pub const RECONNECT_ACTION_ID: &str = "codex.reconnect";
pub const STDERR_TAIL_LINES: usize = 200;
pub const DEFAULT_SESSION_TITLE: &str = "Codex";

pub fn codex_engine() -> EngineId {
    EngineId::new(ENGINE)
}

#[derive(Debug, Clone, Default)]
pub struct CodexLineParser;

impl CodexLineParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{redacted}")]
pub struct CodexLineParserError {
    code: AdapterErrorCode,
    redacted: String,
    details: String,
}

impl ClassifiedParserError for CodexLineParserError {
    fn code(&self) -> AdapterErrorCode {
        self.code
    }

    fn redacted_summary(&self) -> String {
        self.redacted.clone()
    }

    fn full_details(&self) -> String {
        self.details.clone()
    }
}

impl LineParser for CodexLineParser {
    type Event = Record;
    type Error = CodexLineParserError;

    fn parse_line(&mut self, input: LineInput<'_>) -> Result<Option<Self::Event>, Self::Error> {
        Record::parse_line(input.line)
            .map(Some)
            .map_err(|source| CodexLineParserError {
                code: AdapterErrorCode::JsonParse,
                redacted: format!("parse error: {source}"),
                details: format!("{source}: `{}`", input.line),
            })
    }
}

/// Mutable per-run state threaded through [`CodexAdapter::translate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodexRunState {
    pub turn_index: u64,
    pub note_seq: u64,
    /// Last numeric item id seen; stands in for items whose id carries no digits.
    pub last_item_id: Option<u64>,
    pub final_answer: Option<String>,
    pub found_session: Option<ResumeToken>,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct CodexAdapter {
    engine: EngineId,
    title: String,
    resume: Option<ResumeToken>,
    working_dir: Option<PathBuf>,
    state: CodexRunState,
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TITLE)
    }
}

impl CodexAdapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            engine: codex_engine(),
            title: title.into(),
            resume: None,
            working_dir: None,
            state: CodexRunState::default(),
        }
    }

    /// Token the run was launched with; reported on completion until the stream yields its own.
    pub fn with_resume(mut self, resume: Option<ResumeToken>) -> Self {
        self.resume = resume;
        self
    }

    /// Directory whose absolute paths are shortened in command titles.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> &CodexRunState {
        &self.state
    }

    pub fn found_session(&self) -> Option<&ResumeToken> {
        self.state.found_session.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed
    }

    /// Translates one decoded record. Records after a terminal event are ignored.
    pub fn translate(&mut self, record: &Record) -> Vec<NormalizedEvent> {
        if self.state.completed {
            debug!(?record, "[codex] ignoring record after completion");
            return Vec::new();
        }
        let events = self.translate_record(record);
        if events.iter().any(NormalizedEvent::is_terminal) {
            self.state.completed = true;
        }
        events
    }

    pub fn translate_value(&mut self, value: Value) -> Vec<NormalizedEvent> {
        self.translate(&Record::from_value(value))
    }

    fn translate_record(&mut self, record: &Record) -> Vec<NormalizedEvent> {
        match record {
            Record::ThreadStarted(started) => {
                let Some(thread_id) = started.thread_id().filter(|id| !id.is_empty()) else {
                    debug!("[codex] thread.started without thread_id");
                    return Vec::new();
                };
                if let Some(found) = &self.state.found_session {
                    if found.value != thread_id {
                        warn!(
                            first = %found.value,
                            ignored = %thread_id,
                            "[codex] emitted multiple session ids; keeping the first"
                        );
                    }
                    return Vec::new();
                }
                let token = ResumeToken::new(self.engine.clone(), thread_id);
                self.state.found_session = Some(token.clone());
                vec![NormalizedEvent::Started(StartedEvent {
                    engine: self.engine.clone(),
                    resume: token,
                    title: self.title.clone(),
                })]
            }
            Record::TurnStarted => {
                let action_id = format!("turn_{}", self.state.turn_index);
                self.state.turn_index += 1;
                vec![self.action_event(
                    ActionPhase::Started,
                    action_id,
                    ActionKind::Turn,
                    "turn started".to_string(),
                    ActionDetail::None,
                    None,
                    None,
                    None,
                )]
            }
            Record::TurnCompleted(done) => {
                self.capture_session(done.session_id().as_deref());
                vec![self.completed(true, None, done.usage.clone())]
            }
            Record::TurnFailed(failed) => {
                self.capture_session(failed.session_id().as_deref());
                vec![self.completed(false, Some(failed.message()), None)]
            }
            Record::TurnRateLimited(limited) => {
                let retry_after_ms = limited.retry_after_ms.as_ref().and_then(Value::as_u64);
                let message = match retry_after_ms {
                    Some(ms) => format!("rate limited (retry after {ms}ms)"),
                    None => "rate limited".to_string(),
                };
                vec![self.note_event(message, false, ActionDetail::RateLimited { retry_after_ms })]
            }
            Record::Error(error) => self.translate_stream_error(error),
            Record::Item { phase, item } => self.translate_item(*phase, item),
            Record::Unrecognized { record_type } => {
                debug!(%record_type, "[codex] ignoring unrecognized record");
                Vec::new()
            }
            Record::Malformed {
                record_type,
                reason,
            } => {
                debug!(?record_type, %reason, "[codex] ignoring malformed record");
                Vec::new()
            }
        }
    }

    fn translate_stream_error(&mut self, error: &StreamError) -> Vec<NormalizedEvent> {
        let message = error.message();

        if let Some((attempt, max)) = parse_reconnect_message(&message) {
            let phase = if attempt <= 1 {
                ActionPhase::Started
            } else {
                ActionPhase::Updated
            };
            return vec![self.action_event(
                phase,
                RECONNECT_ACTION_ID.to_string(),
                ActionKind::Note,
                message,
                ActionDetail::Reconnect { attempt, max },
                None,
                None,
                Some(ActionLevel::Info),
            )];
        }

        if is_fatal(error.fatal.as_ref()) {
            return vec![self.completed(false, Some(message), None)];
        }

        vec![self.note_event(
            message,
            false,
            ActionDetail::StreamError {
                code: error.code.clone(),
                fatal: error.fatal.clone(),
            },
        )]
    }

    fn translate_item(&mut self, phase: ActionPhase, raw: &Value) -> Vec<NormalizedEvent> {
        let seq = extract_numeric_id(raw.get("id"), self.state.last_item_id);
        self.state.last_item_id = seq;

        let Some(item) = Item::decode(raw) else {
            debug!(?phase, "[codex] skipping item without a usable shape");
            return Vec::new();
        };

        if let Item::AgentMessage(message) = &item {
            if phase == ActionPhase::Completed {
                if self.state.final_answer.is_some() {
                    debug!("[codex] emitted multiple agent messages; using the last one");
                }
                self.state.final_answer = Some(message.text.clone());
            }
            return Vec::new();
        }

        let Some(action_id) = item_id(raw) else {
            debug!(?phase, "[codex] skipping item without id");
            return Vec::new();
        };
        let Some(classified) = classify_item(phase, &item, self.working_dir.as_deref()) else {
            return Vec::new();
        };

        let mut event = self.action_event(
            phase,
            action_id,
            classified.kind,
            classified.title,
            classified.detail,
            classified.ok,
            classified.message,
            classified.level,
        );
        if let NormalizedEvent::Action(action) = &mut event {
            action.action.seq = seq;
        }
        vec![event]
    }

    /// Events for a clean end of the output stream.
    ///
    /// A run that never reported a session id cannot be resumed, so it is a
    /// failure even though the process exited successfully.
    pub fn finish(&mut self) -> Vec<NormalizedEvent> {
        if self.state.completed {
            return Vec::new();
        }
        self.state.completed = true;
        match self.state.found_session.clone() {
            None => vec![self.completed(
                false,
                Some("codex exec finished but no session_id/thread_id was captured".to_string()),
                None,
            )],
            Some(session) => {
                info!(session = %session.value, "[codex] done run");
                vec![self.completed(true, None, None)]
            }
        }
    }

    /// Events for a non-zero process exit, using the diagnostic tail for a reason.
    pub fn process_failed(&mut self, exit_code: i32, stderr_tail: &str) -> Vec<NormalizedEvent> {
        if self.state.completed {
            return Vec::new();
        }
        self.state.completed = true;
        let message = match extract_stderr_reason(stderr_tail) {
            Some(reason) => format!("codex exec failed (rc={exit_code}).\n\n{reason}"),
            None => format!("codex exec failed (rc={exit_code})."),
        };
        vec![
            self.note_event(
                message.clone(),
                false,
                ActionDetail::ProcessFailure {
                    exit_code,
                    stderr_tail: stderr_tail.to_string(),
                },
            ),
            self.completed(false, Some(message), None),
        ]
    }

    /// Terminal failure for a run cut short by the orchestrator's wall-clock limit.
    pub fn timed_out(&mut self, timeout: Duration) -> Vec<NormalizedEvent> {
        if self.state.completed {
            return Vec::new();
        }
        self.state.completed = true;
        vec![self.completed(
            false,
            Some(format!("codex exec exceeded timeout of {timeout:?}")),
            None,
        )]
    }

    fn capture_session(&mut self, session_id: Option<&str>) {
        if self.state.found_session.is_some() {
            return;
        }
        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            self.state.found_session = Some(ResumeToken::new(self.engine.clone(), id));
        }
    }

    fn completed(&self, ok: bool, error: Option<String>, usage: Option<Value>) -> NormalizedEvent {
        NormalizedEvent::Completed(CompletedEvent {
            engine: self.engine.clone(),
            ok,
            answer: self.state.final_answer.clone().unwrap_or_default(),
            resume: self
                .state
                .found_session
                .clone()
                .or_else(|| self.resume.clone()),
            error,
            usage,
        })
    }

    fn note_event(&mut self, message: String, ok: bool, detail: ActionDetail) -> NormalizedEvent {
        let action_id = format!("{}.note.{}", self.engine, self.state.note_seq);
        self.state.note_seq += 1;
        let level = if ok {
            ActionLevel::Info
        } else {
            ActionLevel::Warning
        };
        self.action_event(
            ActionPhase::Completed,
            action_id,
            ActionKind::Note,
            message.clone(),
            detail,
            Some(ok),
            Some(message),
            Some(level),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn action_event(
        &self,
        phase: ActionPhase,
        id: String,
        kind: ActionKind,
        title: String,
        detail: ActionDetail,
        ok: Option<bool>,
        message: Option<String>,
        level: Option<ActionLevel>,
    ) -> NormalizedEvent {
        NormalizedEvent::Action(ActionEvent {
            engine: self.engine.clone(),
            action: Action {
                id,
                seq: None,
                kind,
                title,
                detail,
            },
            phase,
            ok,
            message,
            level,
        })
    }
}

/// Only an explicit `false` (or any other non-`true`, non-null value) makes an
/// `error` record non-fatal; an absent flag fails the run.
fn is_fatal(flag: Option<&Value>) -> bool {
    matches!(flag, None | Some(Value::Null) | Some(Value::Bool(true)))
}

fn reconnect_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^Reconnecting\.{3}\s*(?P<attempt>\d+)/(?P<max>\d+)\s*$")
            .expect("valid reconnect regex")
    })
}

fn ansi_escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ansi regex"))
}

fn trusted_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)not inside a trusted directory").expect("valid trusted-dir regex")
    })
}

fn resume_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*`?codex\s+resume\s+(?P<token>[^`\s]+)`?\s*$")
            .expect("valid resume line regex")
    })
}

/// Renders the line a user can paste back to continue a session.
pub fn format_resume_line(token: &ResumeToken) -> String {
    format!("`codex resume {}`", token.value)
}

/// Finds the first `codex resume <token>` line in `text`.
pub fn extract_resume_token(text: &str) -> Option<ResumeToken> {
    let caps = resume_line_re().captures(text)?;
    let value = caps.name("token")?.as_str();
    Some(ResumeToken::new(codex_engine(), value))
}

/// Parses `Reconnecting... 2/5` into `(attempt, max)`.
pub fn parse_reconnect_message(message: &str) -> Option<(u32, u32)> {
    let caps = reconnect_re().captures(message)?;
    let attempt = caps.name("attempt")?.as_str().parse().ok()?;
    let max = caps.name("max")?.as_str().parse().ok()?;
    Some((attempt, max))
}

pub fn strip_ansi(text: &str) -> String {
    ansi_escape_re().replace_all(text, "").into_owned()
}

/// Picks the most useful line from a stderr tail: a trusted-directory
/// complaint when present, otherwise the last non-empty line.
pub fn extract_stderr_reason(stderr_tail: &str) -> Option<String> {
    let cleaned = strip_ansi(stderr_tail);
    let lines: Vec<&str> = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines
        .iter()
        .find(|line| trusted_dir_re().is_match(line))
        .or_else(|| lines.last())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IngestConfig, IngestLimits, LineIngestor, LineRecordError};
    use serde_json::json;

    fn completed(events: &[NormalizedEvent]) -> &CompletedEvent {
        events
            .iter()
            .find_map(NormalizedEvent::as_completed)
            .expect("completed event")
    }

    #[test]
    fn resume_lines_round_trip_through_text() {
        let token = ResumeToken::new(codex_engine(), "0199a213-81c0");
        let line = format_resume_line(&token);
        assert_eq!(line, "`codex resume 0199a213-81c0`");

        let reply = format!("done · 3s\n\n{line}\n");
        assert_eq!(extract_resume_token(&reply), Some(token));
        assert_eq!(
            extract_resume_token("  CODEX Resume abc-1  ").map(|token| token.value),
            Some("abc-1".to_string())
        );
        assert_eq!(extract_resume_token("please codex resume abc"), None);
    }

    #[test]
    fn redacted_summary_never_includes_raw_line() {
        let data = b"{not-json}\n";
        let config = IngestConfig {
            limits: IngestLimits {
                max_line_bytes: 1024,
            },
            ..IngestConfig::default()
        };

        let mut ingestor =
            LineIngestor::new(std::io::Cursor::new(data), CodexLineParser::new(), config);
        let rec = ingestor.next().unwrap();
        match rec.outcome {
            Err(LineRecordError::Adapter { summary, .. }) => {
                assert!(!summary.contains("{not-json}"));
            }
            other => panic!("expected adapter error, got {other:?}"),
        }
    }

    #[test]
    fn thread_started_captures_first_token_only() {
        let mut adapter = CodexAdapter::new("work");
        let events = adapter.translate_value(json!({"type": "thread.started", "thread_id": "t-1"}));
        match events.as_slice() {
            [NormalizedEvent::Started(started)] => {
                assert_eq!(started.resume.value, "t-1");
                assert_eq!(started.title, "work");
            }
            other => panic!("unexpected events: {other:?}"),
        }

        let events = adapter.translate_value(json!({"type": "thread.started", "thread_id": "t-2"}));
        assert!(events.is_empty());
        assert_eq!(adapter.found_session().unwrap().value, "t-1");
    }

    #[test]
    fn turn_started_emits_synthetic_turn_ids() {
        let mut adapter = CodexAdapter::default();
        let first = adapter.translate_value(json!({"type": "turn.started"}));
        let second = adapter.translate_value(json!({"type": "turn.started"}));
        let ids: Vec<_> = first
            .iter()
            .chain(second.iter())
            .filter_map(NormalizedEvent::as_action)
            .map(|event| (event.action.id.clone(), event.action.kind))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("turn_0".to_string(), ActionKind::Turn),
                ("turn_1".to_string(), ActionKind::Turn)
            ]
        );
        assert_eq!(adapter.state().turn_index, 2);
    }

    #[test]
    fn error_without_fatal_flag_is_terminal() {
        let mut adapter = CodexAdapter::default()
            .with_resume(Some(ResumeToken::new(codex_engine(), "prior")));
        let events = adapter.translate_value(json!({"type": "error", "message": "stream broke"}));
        let done = completed(&events);
        assert!(!done.ok);
        assert_eq!(done.error.as_deref(), Some("stream broke"));
        assert_eq!(done.resume.as_ref().unwrap().value, "prior");
        assert!(adapter.is_completed());
    }

    #[test]
    fn error_with_fatal_false_is_a_note() {
        let mut adapter = CodexAdapter::default();
        let events = adapter.translate_value(
            json!({"type": "error", "message": "stream broke", "fatal": false, "code": "E1"}),
        );
        let [NormalizedEvent::Action(note)] = events.as_slice() else {
            panic!("expected one note, got {events:?}");
        };
        assert_eq!(note.action.kind, ActionKind::Note);
        assert_eq!(note.action.id, "codex.note.0");
        assert_eq!(note.ok, Some(false));
        assert_eq!(note.level, Some(ActionLevel::Warning));
        assert_eq!(
            note.action.detail,
            ActionDetail::StreamError {
                code: Some(json!("E1")),
                fatal: Some(json!(false))
            }
        );
        assert!(!adapter.is_completed());
    }

    #[test]
    fn reconnect_sequence_starts_then_updates() {
        let mut adapter = CodexAdapter::default();
        let first = adapter.translate_value(json!({"type": "error", "message": "Reconnecting... 1/5"}));
        let second =
            adapter.translate_value(json!({"type": "error", "message": "reconnecting...2/5 "}));

        let first = first[0].as_action().unwrap();
        let second = second[0].as_action().unwrap();
        assert_eq!(first.phase, ActionPhase::Started);
        assert_eq!(second.phase, ActionPhase::Updated);
        assert_eq!(first.action.id, RECONNECT_ACTION_ID);
        assert_eq!(second.action.id, RECONNECT_ACTION_ID);
        assert_eq!(
            second.action.detail,
            ActionDetail::Reconnect { attempt: 2, max: 5 }
        );
        assert!(!adapter.is_completed());
    }

    #[test]
    fn turn_failed_uses_nested_message() {
        let mut adapter = CodexAdapter::default();
        adapter.translate_value(json!({"type": "thread.started", "thread_id": "t-9"}));
        let events = adapter.translate_value(
            json!({"type": "turn.failed", "error": {"message": "model overloaded"}}),
        );
        let done = completed(&events);
        assert!(!done.ok);
        assert_eq!(done.error.as_deref(), Some("model overloaded"));
        assert_eq!(done.resume.as_ref().unwrap().value, "t-9");
    }

    #[test]
    fn turn_failed_with_bare_string_error_still_fails_the_run() {
        let mut adapter = CodexAdapter::default();
        adapter.translate_value(json!({"type": "thread.started", "thread_id": "t-1"}));
        let events = adapter.translate_value(json!({"type": "turn.failed", "error": "boom"}));
        let done = completed(&events);
        assert!(!done.ok);
        assert_eq!(done.error.as_deref(), Some("boom"));
        assert_eq!(done.resume.as_ref().unwrap().value, "t-1");
        assert!(adapter.finish().is_empty());
    }

    #[test]
    fn error_with_numeric_message_is_still_fatal() {
        let mut adapter = CodexAdapter::default();
        let events = adapter.translate_value(json!({"type": "error", "message": 500}));
        let done = completed(&events);
        assert!(!done.ok);
        assert_eq!(done.error.as_deref(), Some("500"));
        assert!(adapter.is_completed());
    }

    #[test]
    fn numeric_session_id_is_captured_as_text() {
        let mut adapter = CodexAdapter::default();
        let events = adapter.translate_value(json!({"type": "turn.completed", "session_id": 42}));
        let done = completed(&events);
        assert!(done.ok);
        assert_eq!(done.resume.as_ref().unwrap().value, "42");

        let mut adapter = CodexAdapter::default();
        let events = adapter.translate_value(json!({"type": "thread.started", "thread_id": 7}));
        assert!(matches!(&events[0], NormalizedEvent::Started(started) if started.resume.value == "7"));
    }

    #[test]
    fn rate_limit_note_mentions_retry_after() {
        let mut adapter = CodexAdapter::default();
        let events =
            adapter.translate_value(json!({"type": "turn.rate_limited", "retry_after_ms": 1500}));
        let note = events[0].as_action().unwrap();
        assert_eq!(note.action.title, "rate limited (retry after 1500ms)");

        let events = adapter.translate_value(json!({"type": "turn.rate_limited"}));
        assert_eq!(events[0].as_action().unwrap().action.title, "rate limited");
        assert_eq!(events[0].as_action().unwrap().action.id, "codex.note.1");
    }

    #[test]
    fn agent_messages_keep_the_last_one() {
        let mut adapter = CodexAdapter::default();
        for text in ["first", "second"] {
            let events = adapter.translate_value(json!({
                "type": "item.completed",
                "item": {"id": "item_1", "type": "agent_message", "text": text}
            }));
            assert!(events.is_empty());
        }
        let events = adapter.translate_value(json!({"type": "turn.completed", "usage": {"input_tokens": 5}}));
        let done = completed(&events);
        assert!(done.ok);
        assert_eq!(done.answer, "second");
        assert_eq!(done.usage, Some(json!({"input_tokens": 5})));
    }

    #[test]
    fn turn_completed_can_carry_the_session_id() {
        let mut adapter = CodexAdapter::default();
        let events =
            adapter.translate_value(json!({"type": "turn.completed", "session_id": "s-4"}));
        assert_eq!(completed(&events).resume.as_ref().unwrap().value, "s-4");
    }

    #[test]
    fn malformed_items_are_skipped() {
        let mut adapter = CodexAdapter::default();
        let events = adapter.translate_value(json!({
            "type": "item.started",
            "item": {"id": "item_1", "type": "command_execution"}
        }));
        assert!(events.is_empty());
        let events = adapter.translate_value(json!({
            "type": "item.started",
            "item": {"type": "command_execution", "command": "ls"}
        }));
        assert!(events.is_empty());
        assert!(adapter.translate_value(json!({"no": "type"})).is_empty());
    }

    #[test]
    fn error_items_only_surface_on_completion() {
        let mut adapter = CodexAdapter::default();
        let item = json!({"id": "item_3", "type": "error", "message": "disk full"});
        assert!(adapter
            .translate_value(json!({"type": "item.started", "item": item.clone()}))
            .is_empty());
        let events = adapter.translate_value(json!({"type": "item.completed", "item": item}));
        let warning = events[0].as_action().unwrap();
        assert_eq!(warning.action.kind, ActionKind::Warning);
        assert_eq!(warning.ok, Some(false));
        assert_eq!(adapter.state().last_item_id, Some(3));
        assert_eq!(warning.action.seq, Some(3));
    }

    #[test]
    fn items_without_digits_inherit_the_last_numeric_id() {
        let mut adapter = CodexAdapter::default();
        adapter.translate_value(json!({
            "type": "item.completed",
            "item": {"id": "item_7", "type": "web_search", "query": "tokio select"}
        }));
        let events = adapter.translate_value(json!({
            "type": "item.completed",
            "item": {"id": "search", "type": "web_search", "query": "tokio sleep_until"}
        }));
        let action = &events[0].as_action().unwrap().action;
        assert_eq!(action.id, "search");
        assert_eq!(action.seq, Some(7));
        assert_eq!(adapter.state().last_item_id, Some(7));
    }

    #[test]
    fn stream_end_without_session_fails() {
        let mut adapter = CodexAdapter::default();
        let events = adapter.finish();
        let done = completed(&events);
        assert!(!done.ok);
        assert!(done.error.as_deref().unwrap().contains("no session_id"));
        assert!(adapter.finish().is_empty());
    }

    #[test]
    fn stream_end_with_session_succeeds() {
        let mut adapter = CodexAdapter::default();
        adapter.translate_value(json!({"type": "thread.started", "thread_id": "t-1"}));
        adapter.translate_value(json!({
            "type": "item.completed",
            "item": {"id": 4, "type": "agent_message", "text": "all done"}
        }));
        let events = adapter.finish();
        let done = completed(&events);
        assert!(done.ok);
        assert_eq!(done.answer, "all done");
        assert_eq!(done.resume.as_ref().unwrap().value, "t-1");
    }

    #[test]
    fn process_failure_prefers_trusted_directory_line() {
        let mut adapter = CodexAdapter::default();
        let tail = "\x1b[31mError:\x1b[0m Not inside a trusted directory\n  \nusage: codex exec\n";
        let events = adapter.process_failed(1, tail);
        assert_eq!(events.len(), 2);
        let note = events[0].as_action().unwrap();
        assert_eq!(note.level, Some(ActionLevel::Warning));
        let done = completed(&events);
        assert_eq!(
            done.error.as_deref(),
            Some("codex exec failed (rc=1).\n\nError: Not inside a trusted directory")
        );
    }

    #[test]
    fn stderr_reason_falls_back_to_last_line_or_none() {
        assert_eq!(
            extract_stderr_reason("first\n\nlast line  \n"),
            Some("last line".to_string())
        );
        assert_eq!(extract_stderr_reason(" \n\x1b[0m\n"), None);
        assert_eq!(extract_stderr_reason(""), None);

        let mut adapter = CodexAdapter::default();
        let events = adapter.process_failed(2, "");
        assert_eq!(
            completed(&events).error.as_deref(),
            Some("codex exec failed (rc=2).")
        );
    }

    #[test]
    fn records_after_completion_are_ignored() {
        let mut adapter = CodexAdapter::default();
        adapter.translate_value(json!({"type": "turn.completed"}));
        assert!(adapter
            .translate_value(json!({"type": "turn.started"}))
            .is_empty());
        assert!(adapter.finish().is_empty());
    }

    #[test]
    fn command_titles_are_relative_to_working_dir() {
        let mut adapter = CodexAdapter::default().with_working_dir("/srv/app");
        let events = adapter.translate_value(json!({
            "type": "item.started",
            "item": {"id": "item_2", "type": "command_execution", "command": "cat /srv/app/README.md"}
        }));
        assert_eq!(events[0].as_action().unwrap().action.title, "cat README.md");
    }
}

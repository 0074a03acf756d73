use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Identifies the agent engine that produced an event (e.g. `codex`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque session handle that lets a later run continue this conversation.
///
/// The value is never validated; it is threaded verbatim into the next
/// launch's resume arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeToken {
    pub engine: EngineId,
    pub value: String,
}

impl ResumeToken {
    pub fn new(engine: EngineId, value: impl Into<String>) -> Self {
        Self {
            engine,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Command,
    Tool,
    WebSearch,
    FileChange,
    Note,
    Warning,
    Turn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Started,
    Updated,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionLevel {
    Info,
    Warning,
}

/// Summary of an MCP tool result payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolResultSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_blocks: Option<usize>,
    /// `None` when the result carried neither `structured_content` nor `structured`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_structured: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolDetail {
    pub name: Option<String>,
    pub server: Option<String>,
    pub tool: Option<String>,
    pub status: Option<String>,
    pub arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<ToolResultSummary>,
}

/// Structured payload attached to an [`Action`], one shape per origin.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDetail {
    #[default]
    None,
    Command {
        exit_code: Option<i64>,
        status: Option<String>,
    },
    Tool(ToolDetail),
    WebSearch {
        query: String,
    },
    FileChange {
        changes: Vec<Value>,
        status: Option<String>,
        error: Option<Value>,
    },
    Todo {
        done: usize,
        total: usize,
    },
    Reasoning,
    Warning {
        message: String,
    },
    Reconnect {
        attempt: u32,
        max: u32,
    },
    RateLimited {
        retry_after_ms: Option<u64>,
    },
    StreamError {
        code: Option<Value>,
        fatal: Option<Value>,
    },
    ProcessFailure {
        exit_code: i32,
        stderr_tail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub id: String,
    /// Numeric correlation id; items without digits in their id inherit the last one seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub kind: ActionKind,
    pub title: String,
    pub detail: ActionDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEvent {
    pub engine: EngineId,
    pub action: Action,
    pub phase: ActionPhase,
    pub ok: Option<bool>,
    pub message: Option<String>,
    pub level: Option<ActionLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedEvent {
    pub engine: EngineId,
    pub resume: ResumeToken,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedEvent {
    pub engine: EngineId,
    pub ok: bool,
    pub answer: String,
    pub resume: Option<ResumeToken>,
    pub error: Option<String>,
    pub usage: Option<Value>,
}

/// Engine-agnostic event emitted by a protocol adapter.
///
/// A [`NormalizedEvent::Completed`] ends the run; nothing after it is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NormalizedEvent {
    Started(StartedEvent),
    Action(ActionEvent),
    Completed(CompletedEvent),
}

impl NormalizedEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NormalizedEvent::Completed(_))
    }

    pub fn as_action(&self) -> Option<&ActionEvent> {
        match self {
            NormalizedEvent::Action(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_completed(&self) -> Option<&CompletedEvent> {
        match self {
            NormalizedEvent::Completed(event) => Some(event),
            _ => None,
        }
    }
}

//! Typed view over the records `codex exec --json` writes to stdout.
//!
//! Decoding is permissive: an unknown `type` becomes [`Record::Unrecognized`]
//! and a known type whose payload does not fit becomes [`Record::Malformed`].
//! Neither is an error; the agent's vocabulary is expected to evolve.

use serde::Deserialize;
use serde_json::Value;

use crate::model::ActionPhase;

// Terminal and session-bearing records keep their text fields raw: a field of
// an unexpected JSON type must not cost the run its completion.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThreadStarted {
    pub thread_id: Option<Value>,
}

impl ThreadStarted {
    pub fn thread_id(&self) -> Option<String> {
        self.thread_id.as_ref().and_then(value_text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TurnCompleted {
    pub usage: Option<Value>,
    pub thread_id: Option<Value>,
    pub session_id: Option<Value>,
}

impl TurnCompleted {
    pub fn session_id(&self) -> Option<String> {
        session_text(self.thread_id.as_ref(), self.session_id.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TurnFailed {
    /// Usually `{"message": ...}`, occasionally a bare string.
    pub error: Option<Value>,
    pub thread_id: Option<Value>,
    pub session_id: Option<Value>,
}

impl TurnFailed {
    pub fn session_id(&self) -> Option<String> {
        session_text(self.thread_id.as_ref(), self.session_id.as_ref())
    }

    pub fn message(&self) -> String {
        let Some(error) = &self.error else {
            return String::new();
        };
        error
            .get("message")
            .and_then(value_text)
            .or_else(|| value_text(error))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TurnRateLimited {
    pub retry_after_ms: Option<Value>,
}

/// Top-level `{"type":"error"}` record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamError {
    pub message: Option<Value>,
    /// Kept raw: only an explicit `false` makes the error non-fatal.
    pub fatal: Option<Value>,
    pub code: Option<Value>,
}

impl StreamError {
    pub fn message(&self) -> String {
        self.message.as_ref().and_then(value_text).unwrap_or_default()
    }
}

/// Renders a scalar or structure as text; `null` has none.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn session_text(thread_id: Option<&Value>, session_id: Option<&Value>) -> Option<String> {
    thread_id
        .and_then(value_text)
        .filter(|id| !id.is_empty())
        .or_else(|| session_id.and_then(value_text))
}

/// One decoded line from the agent's primary output channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    ThreadStarted(ThreadStarted),
    TurnStarted,
    TurnCompleted(TurnCompleted),
    TurnFailed(TurnFailed),
    TurnRateLimited(TurnRateLimited),
    Error(StreamError),
    /// `item.started` / `item.updated` / `item.completed`; the item is decoded lazily.
    Item { phase: ActionPhase, item: Value },
    Unrecognized { record_type: String },
    Malformed {
        record_type: Option<String>,
        reason: String,
    },
}

impl Record {
    pub fn from_value(value: Value) -> Self {
        let Some(record_type) = value.get("type").and_then(Value::as_str).map(str::to_owned)
        else {
            return Record::Malformed {
                record_type: None,
                reason: "record missing `type`".to_string(),
            };
        };

        let decoded = match record_type.as_str() {
            "thread.started" => ThreadStarted::deserialize(&value).map(Record::ThreadStarted),
            "turn.started" => Ok(Record::TurnStarted),
            "turn.completed" => TurnCompleted::deserialize(&value).map(Record::TurnCompleted),
            "turn.failed" => TurnFailed::deserialize(&value).map(Record::TurnFailed),
            "turn.rate_limited" => {
                TurnRateLimited::deserialize(&value).map(Record::TurnRateLimited)
            }
            "error" => StreamError::deserialize(&value).map(Record::Error),
            "item.started" | "item.updated" | "item.completed" => {
                let phase = match record_type.as_str() {
                    "item.started" => ActionPhase::Started,
                    "item.updated" => ActionPhase::Updated,
                    _ => ActionPhase::Completed,
                };
                match value.get("item") {
                    Some(item) if item.is_object() => Ok(Record::Item {
                        phase,
                        item: item.clone(),
                    }),
                    _ => {
                        return Record::Malformed {
                            record_type: Some(record_type),
                            reason: "record missing `item` object".to_string(),
                        }
                    }
                }
            }
            _ => return Record::Unrecognized { record_type },
        };

        decoded.unwrap_or_else(|err| Record::Malformed {
            record_type: Some(record_type),
            reason: err.to_string(),
        })
    }

    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(line).map(Record::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandExecution {
    pub command: String,
    pub status: Option<String>,
    pub exit_code: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpToolCall {
    pub server: Option<String>,
    pub tool: Option<String>,
    pub status: Option<String>,
    pub arguments: Option<Value>,
    pub error: Option<Value>,
    pub result: Option<Value>,
}

/// Pre-MCP `tool_call` shape carrying a bare tool name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyToolCall {
    pub name: Option<String>,
    pub status: Option<String>,
    pub arguments: Option<Value>,
    pub error: Option<Value>,
    pub result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebSearch {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileChange {
    pub changes: Option<Vec<Value>>,
    pub status: Option<String>,
    pub error: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reasoning {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TodoList {
    pub items: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentMessage {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemError {
    pub message: String,
}

/// Agent activity nested inside an `item.*` record.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    CommandExecution(CommandExecution),
    McpToolCall(McpToolCall),
    ToolCall(LegacyToolCall),
    WebSearch(WebSearch),
    FileChange(FileChange),
    Reasoning(Reasoning),
    TodoList(TodoList),
    AgentMessage(AgentMessage),
    Error(ItemError),
    Unrecognized(String),
}

impl Item {
    /// Returns `None` when the item has no type tag or lacks a field its type requires.
    pub fn decode(value: &Value) -> Option<Self> {
        let item_type = item_type(value)?;
        let item = match item_type {
            "command_execution" => Item::CommandExecution(CommandExecution::deserialize(value).ok()?),
            "mcp_tool_call" => Item::McpToolCall(McpToolCall::deserialize(value).ok()?),
            "tool_call" => Item::ToolCall(LegacyToolCall::deserialize(value).ok()?),
            "web_search" => Item::WebSearch(WebSearch::deserialize(value).ok()?),
            "file_change" => Item::FileChange(FileChange::deserialize(value).ok()?),
            "reasoning" => Item::Reasoning(Reasoning::deserialize(value).ok()?),
            "todo_list" => Item::TodoList(TodoList::deserialize(value).ok()?),
            "agent_message" | "assistant_message" => {
                Item::AgentMessage(AgentMessage::deserialize(value).ok()?)
            }
            "error" => Item::Error(ItemError::deserialize(value).ok()?),
            other => Item::Unrecognized(other.to_string()),
        };
        Some(item)
    }
}

/// Reads the item tag from `type`, falling back to the legacy `item_type` key.
pub fn item_type(item: &Value) -> Option<&str> {
    let tag = |key: &str| item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    tag("type").or_else(|| tag("item_type"))
}

/// Renders an item id (string or integer) as text.
pub fn item_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Best-effort numeric correlation id for an item.
///
/// Numeric ids are used as-is. String ids yield their last run of ASCII
/// digits (so `item_12` gives 12). Anything else falls back to `fallback`,
/// normally the last numeric id observed in the run.
pub fn extract_numeric_id(id: Option<&Value>, fallback: Option<u64>) -> Option<u64> {
    match id {
        Some(Value::Number(n)) => n.as_u64().or(fallback),
        Some(Value::String(s)) => numeric_suffix(s).or(fallback),
        _ => fallback,
    }
}

pub fn numeric_suffix(id: &str) -> Option<u64> {
    let bytes = id.as_bytes();
    let end = bytes.iter().rposition(u8::is_ascii_digit)? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |idx| idx + 1);
    id[start..end].parse().ok()
}

//! Maps Codex item shapes onto the normalized action vocabulary.

use std::path::Path;

use serde_json::Value;

use crate::model::{
    ActionDetail, ActionKind, ActionLevel, ActionPhase, ToolDetail, ToolResultSummary,
};
use crate::record::{
    CommandExecution, FileChange, Item, ItemError, LegacyToolCall, McpToolCall, TodoList,
};
use crate::text::{
    inline_code, truncate, MAX_CMD_LEN, MAX_PATH_LEN, MAX_QUERY_LEN, MAX_WARNING_LEN,
};

/// Display shape of one item at one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub kind: ActionKind,
    pub title: String,
    pub detail: ActionDetail,
    /// Only set on the completed phase.
    pub ok: Option<bool>,
    pub message: Option<String>,
    pub level: Option<ActionLevel>,
}

impl Classified {
    fn new(kind: ActionKind, title: String, detail: ActionDetail) -> Self {
        Self {
            kind,
            title,
            detail,
            ok: None,
            message: None,
            level: None,
        }
    }

    fn completed_with(mut self, phase: ActionPhase, ok: bool) -> Self {
        if phase == ActionPhase::Completed {
            self.ok = Some(ok);
        }
        self
    }
}

/// Classifies `item` at `phase`.
///
/// Returns `None` for shapes that have no action representation: agent
/// messages (the final answer is tracked by the adapter), unknown item types,
/// and error items outside the completed phase.
pub fn classify_item(phase: ActionPhase, item: &Item, cwd: Option<&Path>) -> Option<Classified> {
    match item {
        Item::CommandExecution(cmd) => classify_command(phase, cmd, cwd),
        Item::McpToolCall(call) => Some(classify_mcp_tool(phase, call)),
        Item::ToolCall(call) => Some(classify_legacy_tool(phase, call)),
        Item::WebSearch(search) => Some(
            Classified::new(
                ActionKind::WebSearch,
                truncate(&search.query, MAX_QUERY_LEN),
                ActionDetail::WebSearch {
                    query: search.query.clone(),
                },
            )
            .completed_with(phase, true),
        ),
        Item::FileChange(change) => Some(classify_file_change(phase, change)),
        Item::Reasoning(reasoning) => Some(
            Classified::new(
                ActionKind::Note,
                reasoning.text.clone(),
                ActionDetail::Reasoning,
            )
            .completed_with(phase, true),
        ),
        Item::TodoList(todo) => Some(classify_todo(phase, todo)),
        Item::Error(error) => classify_error(phase, error),
        Item::AgentMessage(_) | Item::Unrecognized(_) => None,
    }
}

fn classify_command(
    phase: ActionPhase,
    cmd: &CommandExecution,
    cwd: Option<&Path>,
) -> Option<Classified> {
    let command = match cwd {
        Some(cwd) => relativize_command(&cmd.command, cwd),
        None => cmd.command.clone(),
    };
    let title = truncate(&command, MAX_CMD_LEN);
    let exit_code = cmd.exit_code.as_ref().and_then(Value::as_i64);

    if phase != ActionPhase::Completed {
        return Some(Classified::new(
            ActionKind::Command,
            title,
            ActionDetail::None,
        ));
    }

    // A completed command without a status is too garbled to report.
    let status = cmd.status.clone()?;
    let ok = status == "completed" && exit_code.map_or(true, |code| code == 0);
    Some(
        Classified::new(
            ActionKind::Command,
            title,
            ActionDetail::Command {
                exit_code,
                status: Some(status),
            },
        )
        .completed_with(phase, ok),
    )
}

/// Rewrites absolute paths under `cwd` to relative ones.
pub fn relativize_command(command: &str, cwd: &Path) -> String {
    let base = cwd.to_string_lossy();
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return command.to_string();
    }
    command.replace(&format!("{base}/"), "")
}

fn classify_mcp_tool(phase: ActionPhase, call: &McpToolCall) -> Classified {
    let title = short_tool_name(call.server.as_deref(), call.tool.as_deref());
    let detail = ToolDetail {
        server: call.server.clone(),
        tool: call.tool.clone(),
        status: call.status.clone(),
        arguments: call.arguments.clone(),
        ..ToolDetail::default()
    };
    finish_tool(
        phase,
        title,
        detail,
        call.status.as_deref(),
        call.error.as_ref(),
        call.result.as_ref(),
    )
}

fn classify_legacy_tool(phase: ActionPhase, call: &LegacyToolCall) -> Classified {
    let title = call
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "tool".to_string());
    let detail = ToolDetail {
        name: call.name.clone(),
        status: call.status.clone(),
        arguments: call.arguments.clone(),
        ..ToolDetail::default()
    };
    finish_tool(
        phase,
        title,
        detail,
        call.status.as_deref(),
        call.error.as_ref(),
        call.result.as_ref(),
    )
}

fn finish_tool(
    phase: ActionPhase,
    title: String,
    mut detail: ToolDetail,
    status: Option<&str>,
    error: Option<&Value>,
    result: Option<&Value>,
) -> Classified {
    if phase != ActionPhase::Completed {
        return Classified::new(ActionKind::Tool, title, ActionDetail::Tool(detail));
    }

    let error = error.filter(|err| is_truthy(err));
    let ok = status == Some("completed") && error.is_none();
    detail.error_message = error.map(|err| match err {
        Value::Object(map) => map
            .get("message")
            .filter(|msg| is_truthy(msg))
            .map(value_text)
            .unwrap_or_else(|| err.to_string()),
        other => value_text(other),
    });
    detail.result_summary = result.and_then(summarize_tool_result);
    Classified::new(ActionKind::Tool, title, ActionDetail::Tool(detail)).completed_with(phase, ok)
}

fn short_tool_name(server: Option<&str>, tool: Option<&str>) -> String {
    let name = [server, tool]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if name.is_empty() {
        "tool".to_string()
    } else {
        name
    }
}

/// Summarizes a tool `result` object; `None` when nothing worth reporting is present.
pub fn summarize_tool_result(result: &Value) -> Option<ToolResultSummary> {
    let result = result.as_object()?;
    let content_blocks = match result.get("content") {
        Some(Value::Array(blocks)) => Some(blocks.len()),
        Some(Value::Null) | None => None,
        Some(_) => Some(1),
    };
    let has_structured = result
        .get("structured_content")
        .or_else(|| result.get("structured"))
        .map(|value| !value.is_null());

    if content_blocks.is_none() && has_structured.is_none() {
        return None;
    }
    Some(ToolResultSummary {
        content_blocks,
        has_structured,
    })
}

fn classify_file_change(phase: ActionPhase, change: &FileChange) -> Classified {
    let changes = change.changes.clone().unwrap_or_default();
    let title = format_change_summary(&changes);
    let ok = change.status.as_deref() == Some("completed");
    Classified::new(
        ActionKind::FileChange,
        title,
        ActionDetail::FileChange {
            changes,
            status: change.status.clone(),
            error: change.error.clone(),
        },
    )
    .completed_with(phase, ok)
}

fn format_change_summary(changes: &[Value]) -> String {
    let paths: Vec<&str> = changes
        .iter()
        .filter_map(|change| change.get("path").and_then(Value::as_str))
        .filter(|path| !path.is_empty())
        .collect();

    if paths.is_empty() {
        return match changes.len() {
            0 => "updated files".to_string(),
            total => format!("updated {total} files"),
        };
    }
    if paths.len() <= 3 {
        let rendered = paths
            .iter()
            .map(|path| inline_code(&truncate(path, MAX_PATH_LEN)))
            .collect::<Vec<_>>()
            .join(", ");
        return format!("updated {rendered}");
    }
    format!("updated {} files", paths.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TodoSummary {
    done: usize,
    total: usize,
    next_text: Option<String>,
}

fn summarize_todo_list(items: Option<&Value>) -> TodoSummary {
    let mut summary = TodoSummary {
        done: 0,
        total: 0,
        next_text: None,
    };
    let Some(Value::Array(items)) = items else {
        return summary;
    };

    for entry in items.iter().filter_map(Value::as_object) {
        summary.total += 1;
        if entry.get("completed") == Some(&Value::Bool(true)) {
            summary.done += 1;
            continue;
        }
        if summary.next_text.is_none() {
            summary.next_text = entry
                .get("text")
                .filter(|text| !text.is_null())
                .map(value_text);
        }
    }
    summary
}

fn classify_todo(phase: ActionPhase, todo: &TodoList) -> Classified {
    let summary = summarize_todo_list(todo.items.as_ref());
    let title = match (&summary.next_text, summary.total) {
        (_, 0) => "todo".to_string(),
        (Some(next), _) if !next.is_empty() => {
            format!("todo {}/{}: {next}", summary.done, summary.total)
        }
        _ => format!("todo {}/{}: done", summary.done, summary.total),
    };
    Classified::new(
        ActionKind::Note,
        title,
        ActionDetail::Todo {
            done: summary.done,
            total: summary.total,
        },
    )
    .completed_with(phase, true)
}

fn classify_error(phase: ActionPhase, error: &ItemError) -> Option<Classified> {
    if phase != ActionPhase::Completed {
        return None;
    }
    let mut classified = Classified::new(
        ActionKind::Warning,
        truncate(&error.message, MAX_WARNING_LEN),
        ActionDetail::Warning {
            message: error.message.clone(),
        },
    )
    .completed_with(phase, false);
    classified.message = Some(error.message.clone());
    classified.level = Some(ActionLevel::Warning);
    Some(classified)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

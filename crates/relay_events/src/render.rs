//! Live status rendering for a single run.
//!
//! [`ExecProgressRenderer`] reduces [`NormalizedEvent`]s into a small view
//! model (bounded history, one in-flight action, reasoning annotations) and
//! renders it as plain text for a chat transport to send or edit in place.

use std::collections::VecDeque;
use std::time::Duration;

use crate::model::{ActionDetail, ActionEvent, ActionKind, ActionPhase, NormalizedEvent};
use crate::record::numeric_suffix;
use crate::text::{
    emphasis, format_header, inline_code, truncate, HARD_BREAK, MAX_PROGRESS_CHARS,
    MAX_REASON_LEN, STATUS_DONE, STATUS_RUNNING,
};

pub const DEFAULT_MAX_ACTIONS: usize = 5;
pub const STATUS_WORKING_LABEL: &str = "working";
pub const STATUS_DONE_LABEL: &str = "done";
pub const STATUS_ERROR_LABEL: &str = "error";

/// View model behind the progress message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRenderState {
    pub recent_actions: VecDeque<String>,
    pub current_action: Option<String>,
    pub current_action_id: Option<u64>,
    /// Reasoning seen while nothing was in flight; attaches to the next started action.
    pub pending_reasoning: Option<String>,
    pub current_reasoning: Option<String>,
    pub last_turn: Option<u64>,
}

impl ExecRenderState {
    fn push_history(&mut self, line: String, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.recent_actions.len() >= capacity {
            self.recent_actions.pop_front();
        }
        self.recent_actions.push_back(line);
    }
}

#[derive(Debug, Clone)]
pub struct ExecProgressRenderer {
    max_actions: usize,
    max_chars: usize,
    state: ExecRenderState,
}

impl Default for ExecProgressRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIONS, MAX_PROGRESS_CHARS)
    }
}

impl ExecProgressRenderer {
    pub fn new(max_actions: usize, max_chars: usize) -> Self {
        Self {
            max_actions,
            max_chars,
            state: ExecRenderState::default(),
        }
    }

    pub fn state(&self) -> &ExecRenderState {
        &self.state
    }

    /// Folds one event into the view model and reports whether a re-render is worthwhile.
    pub fn note_event(&mut self, event: &NormalizedEvent) -> bool {
        match event {
            NormalizedEvent::Started(_) => true,
            NormalizedEvent::Completed(_) => false,
            NormalizedEvent::Action(action) => self.note_action(action),
        }
    }

    fn note_action(&mut self, event: &ActionEvent) -> bool {
        let action = &event.action;
        if action.kind == ActionKind::Turn {
            return true;
        }
        if !is_item_action(event) {
            return false;
        }

        let own_id = numeric_suffix(&action.id);
        if let Some(numeric) = own_id {
            self.state.last_turn = Some(numeric);
        }
        let item_id = own_id.or(action.seq).or(self.state.last_turn);

        if action.detail == ActionDetail::Reasoning {
            return self.note_reasoning(item_id, &action.title);
        }

        match event.phase {
            ActionPhase::Started => match running_line(event) {
                Some(line) => self.set_current_action(item_id, with_id(item_id, &line)),
                None => false,
            },
            ActionPhase::Updated => false,
            ActionPhase::Completed => match completed_line(event) {
                Some(line) => self.complete_action(item_id, with_id(item_id, &line)),
                None => false,
            },
        }
    }

    fn note_reasoning(&mut self, item_id: Option<u64>, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let line = with_id(item_id, &emphasis(&truncate(text, MAX_REASON_LEN)));
        if self.state.current_action.is_some() && self.state.current_reasoning.is_none() {
            self.state.current_reasoning = Some(line);
            true
        } else {
            self.state.pending_reasoning = Some(line);
            false
        }
    }

    fn set_current_action(&mut self, item_id: Option<u64>, line: String) -> bool {
        if self.state.current_action.as_deref() == Some(line.as_str())
            && self.state.current_action_id == item_id
        {
            return false;
        }
        self.state.current_action = Some(line);
        self.state.current_action_id = item_id;
        if let Some(pending) = self.state.pending_reasoning.take() {
            self.state.current_reasoning = Some(pending);
        }
        true
    }

    fn complete_action(&mut self, item_id: Option<u64>, line: String) -> bool {
        let mut changed = false;
        if let Some(reasoning) = self.state.current_reasoning.clone() {
            if self.state.recent_actions.back() != Some(&reasoning) {
                self.state.push_history(reasoning, self.max_actions);
                changed = true;
            }
        }
        if !line.is_empty() {
            self.state.push_history(line, self.max_actions);
            changed = true;
        }
        match item_id {
            Some(_) if self.state.current_action_id == item_id => {
                self.state.current_action = None;
                self.state.current_action_id = None;
                self.state.current_reasoning = None;
                changed = true;
            }
            None if self.state.current_action_id.is_none() => {
                self.state.current_reasoning = None;
            }
            _ => {}
        }
        changed
    }

    /// In-progress message; collapses to the header alone when the body would
    /// exceed the budget, and cuts the header itself when even that does not fit.
    pub fn render_progress(&self, elapsed: Duration) -> String {
        let header = format_header(elapsed, self.state.last_turn, STATUS_WORKING_LABEL);
        let mut lines: Vec<&str> = self.state.recent_actions.iter().map(String::as_str).collect();
        if let Some(action) = self.state.current_action.as_deref() {
            if let Some(reasoning) = self.state.current_reasoning.as_deref() {
                lines.push(reasoning);
            }
            lines.push(action);
        }

        let message = assemble(&header, &lines);
        if message.chars().count() <= self.max_chars {
            message
        } else {
            truncate(&header, self.max_chars)
        }
    }

    /// Final summary under `status`. A successful run drops completed-command lines.
    pub fn render_final(&self, elapsed: Duration, answer: &str, status: &str) -> String {
        let header = format_header(elapsed, self.state.last_turn, status);
        let lines: Vec<&str> = self
            .state
            .recent_actions
            .iter()
            .map(String::as_str)
            .filter(|line| status != STATUS_DONE_LABEL || !is_command_log_line(line))
            .collect();

        let mut body = assemble(&header, &lines);
        let answer = answer.trim();
        if !answer.is_empty() {
            body.push_str("\n\n");
            body.push_str(answer);
        }
        body
    }
}

/// Actions that describe an agent item, as opposed to adapter notes.
fn is_item_action(event: &ActionEvent) -> bool {
    match event.action.kind {
        ActionKind::Turn => false,
        ActionKind::Note => matches!(
            event.action.detail,
            ActionDetail::Reasoning | ActionDetail::Todo { .. }
        ),
        _ => true,
    }
}

fn running_line(event: &ActionEvent) -> Option<String> {
    let action = &event.action;
    match action.kind {
        ActionKind::Command => Some(format!(
            "{STATUS_RUNNING} running: {}",
            format_command(&action.title)
        )),
        ActionKind::Tool => Some(format!("{STATUS_RUNNING} tool: {}", action.title)),
        _ => None,
    }
}

fn completed_line(event: &ActionEvent) -> Option<String> {
    let action = &event.action;
    match action.kind {
        ActionKind::Command => {
            let exit = match &action.detail {
                ActionDetail::Command {
                    exit_code: Some(code),
                    ..
                } => format!(" (exit {code})"),
                _ => String::new(),
            };
            Some(format!(
                "{STATUS_DONE} ran: {}{exit}",
                format_command(&action.title)
            ))
        }
        ActionKind::Tool => Some(format!("{STATUS_DONE} tool: {}", action.title)),
        ActionKind::WebSearch => Some(format!("{STATUS_DONE} searched: {}", action.title)),
        ActionKind::FileChange => Some(format!("{STATUS_DONE} {}", action.title)),
        ActionKind::Warning => Some(format!("{STATUS_DONE} warning: {}", action.title)),
        ActionKind::Note | ActionKind::Turn => None,
    }
}

fn format_command(title: &str) -> String {
    if title.is_empty() {
        inline_code("(empty)")
    } else {
        inline_code(title)
    }
}

fn with_id(item_id: Option<u64>, line: &str) -> String {
    match item_id {
        Some(id) => format!("[{id}] {line}"),
        None => format!("[?] {line}"),
    }
}

pub fn is_command_log_line(line: &str) -> bool {
    line.contains(&format!("{STATUS_DONE} ran:"))
}

fn assemble(header: &str, lines: &[&str]) -> String {
    if lines.is_empty() {
        return header.to_string();
    }
    format!("{header}\n\n{}", lines.join(HARD_BREAK))
}

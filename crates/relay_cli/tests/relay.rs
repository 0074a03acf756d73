use std::future::{ready, Future};
use std::time::Duration;

use futures_util::stream;
use relay_cli::{relay_run, MessageId, RelayError, RelayOptions, Transport, TransportError};
use relay_events::{CodexAdapter, NormalizedEvent};
use serde_json::{json, Value};

/// Records every call; can be told to fail edits or a specific send.
#[derive(Default)]
struct Recorder {
    sent: Vec<String>,
    edits: Vec<(MessageId, String)>,
    send_calls: usize,
    fail_send_call: Option<usize>,
    fail_edits: bool,
}

impl Transport for Recorder {
    fn send_text(
        &mut self,
        text: &str,
    ) -> impl Future<Output = Result<MessageId, TransportError>> + Send {
        let call = self.send_calls;
        self.send_calls += 1;
        let result = if self.fail_send_call == Some(call) {
            Err(TransportError::Rejected("flood control".to_string()))
        } else {
            self.sent.push(text.to_string());
            Ok(MessageId(call as u64 + 1))
        };
        ready(result)
    }

    fn edit_text(
        &mut self,
        id: MessageId,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if self.fail_edits {
            Err(TransportError::UnknownMessage(id))
        } else {
            self.edits.push((id, text.to_string()));
            Ok(())
        };
        ready(result)
    }
}

fn translate(records: &[Value]) -> Vec<NormalizedEvent> {
    let mut adapter = CodexAdapter::new("Codex");
    let mut events: Vec<_> = records
        .iter()
        .flat_map(|record| adapter.translate_value(record.clone()))
        .collect();
    if !adapter.is_completed() {
        events.extend(adapter.finish());
    }
    events
}

fn ls_run() -> Vec<NormalizedEvent> {
    translate(&[
        json!({"type": "thread.started", "thread_id": "thread-7"}),
        json!({"type": "item.started", "item": {"id": "item_0", "type": "command_execution", "command": "ls -la", "status": "in_progress"}}),
        json!({"type": "item.completed", "item": {"id": "item_0", "type": "command_execution", "command": "ls -la", "exit_code": 0, "status": "completed"}}),
        json!({"type": "item.completed", "item": {"id": "item_1", "type": "agent_message", "text": "listed"}}),
        json!({"type": "turn.completed"}),
    ])
}

fn unthrottled() -> RelayOptions {
    RelayOptions {
        progress_interval: Duration::ZERO,
        ..RelayOptions::default()
    }
}

#[tokio::test]
async fn edits_progress_then_sends_final_summary() {
    let mut transport = Recorder::default();
    let done = relay_run(stream::iter(ls_run()), &mut transport, &unthrottled())
        .await
        .unwrap();

    assert!(done.ok);
    assert_eq!(done.resume.map(|token| token.value).as_deref(), Some("thread-7"));

    assert_eq!(transport.sent.len(), 2);
    assert!(transport.sent[0].starts_with("working · "));
    let summary = &transport.sent[1];
    assert!(summary.starts_with("done · "), "{summary}");
    assert!(summary.ends_with("\n\nlisted"), "{summary}");
    assert!(!summary.contains("ran:"), "{summary}");

    let edits: Vec<_> = transport.edits.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(edits.len(), 2, "{edits:?}");
    assert!(transport.edits.iter().all(|(id, _)| *id == MessageId(1)));
    assert!(edits[0].ends_with("[0] ▸ running: `ls -la`"));
    assert!(edits[1].ends_with("[0] ✓ ran: `ls -la` (exit 0)"));
}

#[tokio::test]
async fn throttled_progress_skips_intermediate_edits() {
    let mut transport = Recorder::default();
    let options = RelayOptions {
        progress_interval: Duration::from_secs(3600),
        ..RelayOptions::default()
    };
    relay_run(stream::iter(ls_run()), &mut transport, &options)
        .await
        .unwrap();

    assert_eq!(transport.sent.len(), 2);
    assert!(transport.edits.is_empty());
}

#[tokio::test]
async fn failed_edits_and_initial_send_do_not_stop_the_relay() {
    let mut transport = Recorder {
        fail_edits: true,
        ..Recorder::default()
    };
    let done = relay_run(stream::iter(ls_run()), &mut transport, &unthrottled()).await;
    assert!(done.unwrap().ok);
    assert_eq!(transport.sent.len(), 2);

    let mut transport = Recorder {
        fail_send_call: Some(0),
        ..Recorder::default()
    };
    let done = relay_run(stream::iter(ls_run()), &mut transport, &unthrottled()).await;
    assert!(done.unwrap().ok);
    assert_eq!(transport.sent.len(), 1);
    assert!(transport.edits.is_empty());
}

#[tokio::test]
async fn failed_final_send_is_an_error() {
    let mut transport = Recorder {
        fail_send_call: Some(1),
        ..Recorder::default()
    };
    let result = relay_run(stream::iter(ls_run()), &mut transport, &unthrottled()).await;
    assert!(matches!(result, Err(RelayError::Transport(_))));
}

#[tokio::test]
async fn stream_without_completion_is_incomplete() {
    let mut events = ls_run();
    events.retain(|event| !event.is_terminal());

    let mut transport = Recorder::default();
    let result = relay_run(stream::iter(events), &mut transport, &unthrottled()).await;
    assert!(matches!(result, Err(RelayError::Incomplete)));
}

#[tokio::test]
async fn failed_run_summary_falls_back_to_error_text() {
    let events = translate(&[
        json!({"type": "thread.started", "thread_id": "thread-8"}),
        json!({"type": "error", "message": "stream disconnected"}),
    ]);

    let mut transport = Recorder::default();
    let done = relay_run(stream::iter(events), &mut transport, &unthrottled())
        .await
        .unwrap();

    assert!(!done.ok);
    assert_eq!(done.resume.map(|token| token.value).as_deref(), Some("thread-8"));
    let summary = transport.sent.last().unwrap();
    assert!(summary.starts_with("error · "), "{summary}");
    assert!(summary.ends_with("stream disconnected"), "{summary}");
}

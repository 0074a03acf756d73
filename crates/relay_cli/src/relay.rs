//! Drives one run's events into a transport as a live progress message.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use relay_events::{
    render::{DEFAULT_MAX_ACTIONS, STATUS_DONE_LABEL, STATUS_ERROR_LABEL},
    text::MAX_PROGRESS_CHARS,
    CompletedEvent, ExecProgressRenderer, NormalizedEvent,
};
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::transport::{MessageId, Transport, TransportError};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    pub max_actions: usize,
    pub max_chars: usize,
    /// Minimum spacing between progress edits.
    pub progress_interval: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            max_actions: DEFAULT_MAX_ACTIONS,
            max_chars: MAX_PROGRESS_CHARS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to deliver message: {0}")]
    Transport(#[from] TransportError),
    #[error("event stream ended without a completion")]
    Incomplete,
}

struct ProgressMessage {
    id: Option<MessageId>,
    last_text: String,
    last_edit: Instant,
    dirty: bool,
}

/// Relays `events` until the terminal event and returns it.
///
/// Edits of the progress message are throttled to `progress_interval` and
/// are best effort. The final summary is sent as a new message; failing to
/// deliver it is an error.
pub async fn relay_run<S, T>(
    events: S,
    transport: &mut T,
    options: &RelayOptions,
) -> Result<CompletedEvent, RelayError>
where
    S: Stream<Item = NormalizedEvent>,
    T: Transport,
{
    let mut events = std::pin::pin!(events);
    let started = Instant::now();
    let mut renderer = ExecProgressRenderer::new(options.max_actions, options.max_chars);

    let initial = renderer.render_progress(Duration::ZERO);
    let id = match transport.send_text(&initial).await {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(error = %err, "failed to send progress message; continuing without it");
            None
        }
    };
    let mut progress = ProgressMessage {
        id,
        last_text: initial,
        last_edit: started,
        dirty: false,
    };

    loop {
        let next = if progress.dirty {
            let deadline = progress.last_edit + options.progress_interval;
            tokio::select! {
                event = events.next() => Some(event),
                _ = time::sleep_until(deadline) => None,
            }
        } else {
            Some(events.next().await)
        };

        let event = match next {
            None => {
                flush_progress(&mut progress, &renderer, transport, started).await;
                continue;
            }
            Some(None) => return Err(RelayError::Incomplete),
            Some(Some(event)) => event,
        };

        if let NormalizedEvent::Completed(done) = event {
            let text = render_summary(&renderer, started.elapsed(), &done);
            transport.send_text(&text).await?;
            return Ok(done);
        }

        if renderer.note_event(&event) {
            progress.dirty = true;
            if progress.last_edit.elapsed() >= options.progress_interval {
                flush_progress(&mut progress, &renderer, transport, started).await;
            }
        }
    }
}

/// Final message for `done`; an empty answer falls back to the error text.
pub fn render_summary(
    renderer: &ExecProgressRenderer,
    elapsed: Duration,
    done: &CompletedEvent,
) -> String {
    let status = if done.ok {
        STATUS_DONE_LABEL
    } else {
        STATUS_ERROR_LABEL
    };
    let answer = match done.error.as_deref() {
        Some(error) if done.answer.trim().is_empty() => error,
        _ => done.answer.as_str(),
    };
    renderer.render_final(elapsed, answer, status)
}

async fn flush_progress<T: Transport>(
    progress: &mut ProgressMessage,
    renderer: &ExecProgressRenderer,
    transport: &mut T,
    started: Instant,
) {
    progress.dirty = false;
    let Some(id) = progress.id else {
        return;
    };
    let text = renderer.render_progress(started.elapsed());
    if text == progress.last_text {
        return;
    }
    match transport.edit_text(id, &text).await {
        Ok(()) => {
            debug!(message = %id, "progress updated");
            progress.last_text = text;
            progress.last_edit = Instant::now();
        }
        Err(err) => warn!(error = %err, "failed to edit progress message"),
    }
}

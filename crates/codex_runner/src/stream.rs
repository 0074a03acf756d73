use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use relay_events::NormalizedEvent;
use tokio::sync::mpsc;

/// Receiving half of a run's event channel, exposed as a [`Stream`].
pub(crate) struct EventChannelStream {
    rx: mpsc::Receiver<NormalizedEvent>,
    finished: bool,
}

impl EventChannelStream {
    pub(crate) fn new(rx: mpsc::Receiver<NormalizedEvent>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }
}

impl Stream for EventChannelStream {
    type Item = NormalizedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                // Nothing after the terminal event belongs to this run.
                if event.is_terminal() {
                    this.finished = true;
                    this.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

//! Text transport capability consumed by the relay loop.

use std::{fmt, future::Future, io};

use thiserror::Error;

/// Transport-assigned handle for a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("message {0} is unknown to the transport")]
    UnknownMessage(MessageId),
    #[error("transport rejected the request: {0}")]
    Rejected(String),
}

/// Sends and edits plain-text messages.
///
/// Text may contain inline `` `code` `` and `_emphasis_` markers; rendering
/// them is up to the implementation.
pub trait Transport {
    fn send_text(
        &mut self,
        text: &str,
    ) -> impl Future<Output = Result<MessageId, TransportError>> + Send;

    fn edit_text(
        &mut self,
        id: MessageId,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Writes every send and edit to an [`io::Write`] sink, stdout by default.
pub struct ConsoleTransport<W = io::Stdout> {
    out: W,
    sent: u64,
}

impl ConsoleTransport<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: io::Write + Send> ConsoleTransport<W> {
    pub fn new(out: W) -> Self {
        Self { out, sent: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_block(&mut self, banner: &str, text: &str) -> io::Result<()> {
        writeln!(self.out, "── {banner} ──")?;
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}

impl<W: io::Write + Send> Transport for ConsoleTransport<W> {
    async fn send_text(&mut self, text: &str) -> Result<MessageId, TransportError> {
        self.sent += 1;
        let id = MessageId(self.sent);
        self.write_block(&format!("message {id}"), text)?;
        Ok(id)
    }

    async fn edit_text(&mut self, id: MessageId, text: &str) -> Result<(), TransportError> {
        if id.0 == 0 || id.0 > self.sent {
            return Err(TransportError::UnknownMessage(id));
        }
        self.write_block(&format!("edit {id}"), text)?;
        Ok(())
    }
}

#![forbid(unsafe_code)]
//! Relays the live status of `codex exec --json` runs to a text transport.
//!
//! A run's [`NormalizedEvent`](relay_events::NormalizedEvent)s are folded into
//! one progress message that is edited in place, followed by a final summary
//! message once the run completes. [`replay`] drives the same pipeline over a
//! recorded stream.

pub mod config;
pub mod logging;
pub mod relay;
pub mod replay;
pub mod transport;

pub use config::{CodexConfig, ConfigError, RelayConfig, DEFAULT_CONFIG_FILE};
pub use logging::{init_logging, redact_secrets, LoggingError};
pub use relay::{relay_run, render_summary, RelayError, RelayOptions};
pub use replay::{replay_file, ReplayError, ReplayFormat, ReplaySummary};
pub use transport::{ConsoleTransport, MessageId, Transport, TransportError};

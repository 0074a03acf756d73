//! Subscriber setup. Every formatted line passes through [`redact_secrets`]
//! before reaching stderr or the optional log file.

use std::{
    borrow::Cow,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};

use regex::Regex;
use thiserror::Error;
use tracing::{subscriber::SetGlobalDefaultError, Level};
use tracing_subscriber::{fmt::MakeWriter, FmtSubscriber};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file `{path}`: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] SetGlobalDefaultError),
}

fn bot_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"bot\d+:[A-Za-z0-9_-]+").expect("valid bot token regex"))
}

fn bare_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d+:[A-Za-z0-9_-]{10,}\b").expect("valid bare token regex")
    })
}

/// Masks chat-bot API tokens, with or without their `bot` prefix.
pub fn redact_secrets(text: &str) -> Cow<'_, str> {
    let text = bot_token_re().replace_all(text, "bot[REDACTED]");
    if !bare_token_re().is_match(&text) {
        return text;
    }
    let redacted = bare_token_re().replace_all(&text, "[REDACTED_TOKEN]");
    Cow::Owned(redacted.into_owned())
}

/// Hands out [`RedactingWriter`]s that share one optional log file.
#[derive(Clone, Default)]
pub struct RedactingMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl RedactingMakeWriter {
    pub fn new(log_file: Option<&Path>) -> Result<Self, LoggingError> {
        let file = log_file
            .map(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LoggingError::OpenLogFile {
                        path: path.to_path_buf(),
                        source,
                    })
            })
            .transpose()?;
        Ok(Self {
            file: file.map(|file| Arc::new(Mutex::new(file))),
        })
    }
}

pub struct RedactingWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for RedactingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let redacted = redact_secrets(&text);
        io::stderr().write_all(redacted.as_bytes())?;
        if let Some(file) = &self.file {
            let mut file = file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?;
            file.write_all(redacted.as_bytes())?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                file.flush()?;
            }
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            file: self.file.clone(),
        }
    }
}

/// `--debug` forces DEBUG regardless of `--level`.
pub fn effective_level(level: Level, debug: bool) -> Level {
    if debug && level < Level::DEBUG {
        Level::DEBUG
    } else {
        level
    }
}

pub fn init_logging(level: Level, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let writer = RedactingMakeWriter::new(log_file)?;

    let mut subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(log_file.is_none());

    // when we run the command with `TRACE` or `DEBUG` level, we want to see
    // the file and line number...
    if [Level::DEBUG, Level::TRACE].contains(&level) {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    tracing::subscriber::set_global_default(subscriber.finish())?;
    Ok(())
}

use std::{env, ffi::OsString, path::PathBuf, time::Duration};

use relay_events::{codex_adapter::DEFAULT_SESSION_TITLE, IngestConfig, IngestLimits};

use crate::CodexRunner;

pub const CODEX_BINARY_ENV: &str = "CODEX_BINARY";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

pub fn default_binary_path() -> PathBuf {
    env::var_os(CODEX_BINARY_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("codex"))
}

/// Arguments placed before `exec` when none are configured; keeps Codex from
/// running its own notification hook for relayed runs.
pub fn default_extra_args() -> Vec<String> {
    vec!["-c".to_string(), "notify=[]".to_string()]
}

/// Builder for [`CodexRunner`].
#[derive(Clone, Debug)]
pub struct CodexRunnerBuilder {
    pub(crate) binary: PathBuf,
    pub(crate) extra_args: Vec<String>,
    pub(crate) profile: Option<String>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) timeout: Duration,
    pub(crate) max_line_bytes: usize,
    pub(crate) channel_capacity: usize,
}

impl Default for CodexRunnerBuilder {
    fn default() -> Self {
        Self {
            binary: default_binary_path(),
            extra_args: default_extra_args(),
            profile: None,
            working_dir: None,
            timeout: Duration::ZERO,
            max_line_bytes: IngestLimits::default().max_line_bytes,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl CodexRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults to `CODEX_BINARY` when present or `codex` on `PATH`.
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Replaces the arguments placed between the binary and `exec`.
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Selects a Codex profile; it also becomes the session title.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        let profile = profile.into();
        self.profile = (!profile.trim().is_empty()).then_some(profile);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Wall-clock limit for a whole run. [`Duration::ZERO`] disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> CodexRunner {
        let mut extra_args: Vec<OsString> = self.extra_args.into_iter().map(OsString::from).collect();
        let title = match self.profile {
            Some(profile) => {
                extra_args.push(OsString::from("--profile"));
                extra_args.push(OsString::from(&profile));
                profile
            }
            None => DEFAULT_SESSION_TITLE.to_string(),
        };
        CodexRunner {
            binary: self.binary,
            extra_args,
            title,
            working_dir: self.working_dir,
            timeout: self.timeout,
            ingest: IngestConfig {
                limits: IngestLimits {
                    max_line_bytes: self.max_line_bytes,
                },
                ..IngestConfig::default()
            },
            channel_capacity: self.channel_capacity,
        }
    }
}

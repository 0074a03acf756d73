//! `codex-relay.toml` loading.
//!
//! Every key is optional; a missing file yields the defaults.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use codex_runner::{default_binary_path, default_extra_args, CodexRunnerBuilder};
use relay_events::text::MIN_PROGRESS_CHARS;
use serde::Deserialize;
use thiserror::Error;

use crate::relay::RelayOptions;

pub const DEFAULT_CONFIG_FILE: &str = "codex-relay.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid `{key}` in {path}; expected {expected}")]
    Invalid {
        path: PathBuf,
        key: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexConfig {
    pub binary: PathBuf,
    pub extra_args: Vec<String>,
    pub profile: Option<String>,
    /// [`Duration::ZERO`] disables the limit.
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            binary: default_binary_path(),
            extra_args: default_extra_args(),
            profile: None,
            timeout: Duration::ZERO,
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayConfig {
    pub codex: CodexConfig,
    pub render: RelayOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    codex: RawCodex,
    render: RawRender,
}

/// `profile` and `extra_args` stay untyped so a wrong shape can be reported by key.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCodex {
    binary: Option<PathBuf>,
    extra_args: Option<toml::Value>,
    profile: Option<toml::Value>,
    timeout_secs: Option<u64>,
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRender {
    max_actions: Option<usize>,
    max_chars: Option<usize>,
    progress_interval_ms: Option<u64>,
}

impl RelayConfig {
    /// Reads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml_str(&text, path)
    }

    /// `path` is only used in error messages.
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |key, expected| ConfigError::Invalid {
            path: path.to_path_buf(),
            key,
            expected,
        };

        let extra_args = match raw.codex.extra_args {
            None => default_extra_args(),
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(arg) => Ok(arg),
                    _ => Err(invalid("codex.extra_args", "a list of strings")),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("codex.extra_args", "a list of strings")),
        };
        let profile = match raw.codex.profile {
            None => None,
            Some(toml::Value::String(profile)) if profile.trim().is_empty() => None,
            Some(toml::Value::String(profile)) => Some(profile),
            Some(_) => return Err(invalid("codex.profile", "a string")),
        };

        let defaults = RelayOptions::default();
        let render = RelayOptions {
            max_actions: raw.render.max_actions.unwrap_or(defaults.max_actions),
            max_chars: raw.render.max_chars.unwrap_or(defaults.max_chars),
            progress_interval: raw
                .render
                .progress_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_interval),
        };
        if render.max_chars < MIN_PROGRESS_CHARS {
            return Err(invalid("render.max_chars", "an integer of at least 32"));
        }

        Ok(Self {
            codex: CodexConfig {
                binary: raw.codex.binary.unwrap_or_else(default_binary_path),
                extra_args,
                profile,
                timeout: Duration::from_secs(raw.codex.timeout_secs.unwrap_or(0)),
                working_dir: raw.codex.working_dir,
            },
            render,
        })
    }

    pub fn runner_builder(&self) -> CodexRunnerBuilder {
        let codex = &self.codex;
        let mut builder = CodexRunnerBuilder::new()
            .binary(&codex.binary)
            .extra_args(codex.extra_args.iter().cloned())
            .timeout(codex.timeout);
        if let Some(profile) = &codex.profile {
            builder = builder.profile(profile);
        }
        if let Some(dir) = &codex.working_dir {
            builder = builder.working_dir(dir);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<RelayConfig, ConfigError> {
        RelayConfig::from_toml_str(text, Path::new("test.toml"))
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.codex.extra_args, vec!["-c", "notify=[]"]);
        assert_eq!(config.codex.profile, None);
        assert_eq!(config.codex.timeout, Duration::ZERO);
        assert_eq!(config.render, RelayOptions::default());
    }

    #[test]
    fn reads_all_sections() {
        let config = parse(
            r#"
            [codex]
            binary = "/opt/codex"
            extra_args = []
            profile = "work"
            timeout_secs = 600
            working_dir = "/srv/repo"

            [render]
            max_actions = 3
            max_chars = 200
            progress_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.codex.binary, PathBuf::from("/opt/codex"));
        assert!(config.codex.extra_args.is_empty());
        assert_eq!(config.codex.profile.as_deref(), Some("work"));
        assert_eq!(config.codex.timeout, Duration::from_secs(600));
        assert_eq!(config.codex.working_dir, Some(PathBuf::from("/srv/repo")));
        assert_eq!(
            config.render,
            RelayOptions {
                max_actions: 3,
                max_chars: 200,
                progress_interval: Duration::from_millis(500),
            }
        );

        let runner = config.runner_builder().build();
        assert_eq!(runner.title(), "work");
        assert_eq!(runner.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn rejects_wrongly_shaped_values_by_key() {
        let err = parse("[codex]\nextra_args = \"-c notify=[]\"\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid `codex.extra_args` in test.toml; expected a list of strings"
        );

        let err = parse("[codex]\nextra_args = [\"-c\", 1]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "codex.extra_args", .. }));

        let err = parse("[codex]\nprofile = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "codex.profile", .. }));

        assert!(matches!(parse("[codex\n"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn rejects_progress_budget_below_header_width() {
        for max_chars in [0, 10, MIN_PROGRESS_CHARS - 1] {
            let err = parse(&format!("[render]\nmax_chars = {max_chars}\n")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "render.max_chars", .. }));
        }
        let config = parse(&format!("[render]\nmax_chars = {MIN_PROGRESS_CHARS}\n")).unwrap();
        assert_eq!(config.render.max_chars, MIN_PROGRESS_CHARS);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[render]\nmax_actions = 1\n").unwrap();
        assert_eq!(RelayConfig::load(&path).unwrap().render.max_actions, 1);
    }
}

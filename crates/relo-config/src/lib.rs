//! Workspace configuration (`relo.toml`) and process-wide logging setup.

use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::prelude::*;

/// Environment variable that points at a config file, overriding discovery.
pub const RELO_CONFIG_ENV_VAR: &str = "RELO_CONFIG_PATH";

/// File names looked up in the workspace root, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["relo.toml", ".relo.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloConfig {
    #[serde(default)]
    pub r#move: MoveConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What the engine does when a move has conflicts and nobody is asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Abort,
    Proceed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveConfig {
    /// Look for code references to the moved declarations.
    #[serde(default = "default_true")]
    pub search_references: bool,

    /// Update fully qualified names mentioned in doc comments.
    #[serde(default)]
    pub search_in_comments: bool,

    /// Update fully qualified names mentioned in string literals.
    #[serde(default)]
    pub search_for_text: bool,

    /// Pass the enclosing instance explicitly when a nested class leaves its outer class.
    #[serde(default = "default_true")]
    pub synthesize_outer_instance: bool,

    /// How many candidate names to try for a synthesized outer-instance parameter.
    #[serde(default = "MoveConfig::default_name_attempts")]
    pub outer_instance_name_attempts: usize,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl MoveConfig {
    fn default_name_attempts() -> usize {
        1_000
    }
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            search_references: true,
            search_in_comments: false,
            search_for_text: false,
            synthesize_outer_instance: true,
            outer_instance_name_attempts: Self::default_name_attempts(),
            conflict_policy: ConflictPolicy::Abort,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    /// The effective filter: the configured level, with `RUST_LOG` merged in when set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let config_directives = Self::normalize_level_directives(&self.level);
        let fallback = || {
            tracing_subscriber::EnvFilter::try_new(&config_directives).unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::default()
                    .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
            })
        };
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        match env_directives {
            Some(env_directives) => {
                tracing_subscriber::EnvFilter::try_new(format!("{config_directives},{env_directives}"))
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(&env_directives))
                    .unwrap_or_else(|_| fallback())
            }
            None => fallback(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` embeds a source snippet; keep just the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl ReloConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: ReloConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.r#move.outer_instance_name_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "move.outer_instance_name_attempts",
                message: "must be at least 1".to_owned(),
            });
        }
        if let Err(err) = tracing_subscriber::EnvFilter::try_new(
            LoggingConfig::normalize_level_directives(&self.logging.level),
        ) {
            return Err(ConfigError::Invalid {
                key: "logging.level",
                message: err.to_string(),
            });
        }
        Ok(())
    }
}

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the config environment lock.
///
/// Tests that set [`RELO_CONFIG_ENV_VAR`] wrap the mutation and the discovery in this so other
/// threads never observe the temporary override.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Find the config file for a workspace root.
///
/// Search order:
/// 1) `RELO_CONFIG_PATH` (absolute or relative to `workspace_root`)
/// 2) `relo.toml` in `workspace_root`
/// 3) `.relo.toml` in `workspace_root`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(RELO_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    CONFIG_FILE_NAMES
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for a workspace root; defaults and `None` when there is no file.
pub fn load_for_workspace(workspace_root: &Path) -> Result<(ReloConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((ReloConfig::default(), None));
    };
    let config = ReloConfig::load_from_path(&path)?;
    tracing::debug!(target: "relo.config", path = %path.display(), "loaded config");
    Ok((config, Some(path)))
}

static TRACING_INIT: Once = Once::new();

/// Install the global `tracing` subscriber writing to stderr.
///
/// Safe to call more than once; only the first call installs anything. Returns whether this
/// call installed the subscriber.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        };
        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        installed = tracing::subscriber::set_global_default(subscriber).is_ok();
    });
    installed
}

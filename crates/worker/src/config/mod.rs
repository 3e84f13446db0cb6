mod telemetry;

#[cfg(test)]
mod tests;

pub use telemetry::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use authtrail_aws::{CognitoConfig, SqsSourceConfig};
use authtrail_core::{DEFAULT_MAX_HISTORY, PoolId, ResolverConfig, SubjectMode};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides `directory.pool_id`.
pub const POOL_ENV_VAR: &str = "COGNITO_POOL";

/// Errors raised while loading or validating the worker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("user pool id is not set (set directory.pool_id or {POOL_ENV_VAR})")]
    MissingPoolId,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for the worker, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct WorkerConfig {
    /// Identity directory (Cognito user pool) settings.
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Queue delivering the events. Required by `run` only.
    #[serde(default)]
    pub queue: Option<SqsSourceConfig>,
    /// Batch resolver settings.
    #[serde(default)]
    pub resolver: ResolverSettings,
    /// Consumer loop settings.
    #[serde(default)]
    pub consumer: ConsumerSettings,
    /// OpenTelemetry distributed tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Directory settings.
///
/// # Example
///
/// ```toml
/// [directory]
/// pool_id = "us-east-1_AbCdEfGhI"
/// region = "us-east-1"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct DirectoryConfig {
    /// User pool id. The `COGNITO_POOL` environment variable takes precedence.
    #[serde(default)]
    pub pool_id: Option<String>,
    #[serde(flatten)]
    pub cognito: CognitoConfig,
}

#[derive(Debug, Deserialize)]
pub struct ResolverSettings {
    /// History entries fetched per identity (1-60).
    #[serde(default = "default_max_history")]
    pub max_history: i32,
    /// `"all"` or `"last_only"`.
    #[serde(default)]
    pub subject_mode: SubjectMode,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            subject_mode: SubjectMode::default(),
        }
    }
}

fn default_max_history() -> i32 {
    DEFAULT_MAX_HISTORY
}

#[derive(Debug, Deserialize)]
pub struct ConsumerSettings {
    /// Pause after a failed batch or receive, in milliseconds.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

fn default_error_backoff_ms() -> u64 {
    1000
}

impl ConsumerSettings {
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl WorkerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load the configuration file at `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Self::from_toml("");
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Resolve the pool id, preferring `env_override` over the file value.
    ///
    /// Blank values count as unset.
    pub fn pool_id(&self, env_override: Option<String>) -> Result<PoolId, ConfigError> {
        env_override
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                self.directory
                    .pool_id
                    .clone()
                    .filter(|v| !v.trim().is_empty())
            })
            .map(PoolId::new)
            .ok_or(ConfigError::MissingPoolId)
    }

    /// Build a validated resolver configuration.
    pub fn resolver_config(&self, env_override: Option<String>) -> Result<ResolverConfig, ConfigError> {
        let config = ResolverConfig::new(self.pool_id(env_override)?)
            .with_max_history(self.resolver.max_history)
            .with_subject_mode(self.resolver.subject_mode);
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    /// The queue section, validated. Only the `run` command needs it.
    pub fn queue_config(&self) -> Result<&SqsSourceConfig, ConfigError> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("[queue] section is required".to_owned()))?;
        queue
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(queue)
    }
}

/// Read the pool id override from the process environment.
pub fn pool_id_from_env() -> Option<String> {
    std::env::var(POOL_ENV_VAR).ok()
}

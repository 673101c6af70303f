//! Configuration system for permgate.
//!
//! Load engine configuration from TOML or YAML files to control validation
//! limits, registry policy and fact fetching without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use permgate_config::{DuplicatePolicy, EngineConfig};
//! use std::time::Duration;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     [limits]
//!     max_depth = 16
//!
//!     [registry]
//!     duplicate_policy = "replace"
//!
//!     [provider]
//!     fetch_timeout_ms = 250
//! "#).unwrap();
//!
//! assert_eq!(config.limits.max_depth, 16);
//! assert_eq!(config.limits.max_nodes, 256);
//! assert_eq!(config.registry.duplicate_policy, DuplicatePolicy::Replace);
//! assert_eq!(config.provider.fetch_timeout(), Duration::from_millis(250));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use permgate_config::EngineConfig;
//!
//! let config = EngineConfig::load("permgate.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Duration;

use permgate_core::ids::DEFAULT_MAX_IDENTIFIER_LEN;
use permgate_core::ValidationLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Validation limits applied to every submitted constraint.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Registry policy.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Fact provider access.
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl EngineConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file, choosing the format by extension.
    ///
    /// `.yaml` and `.yml` are read as YAML, anything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, fails to parse, or holds
    /// out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_depth == 0 || self.limits.max_nodes == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_depth and limits.max_nodes must be positive".to_string(),
            ));
        }
        if self.limits.max_identifier_len == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_identifier_len must be positive".to_string(),
            ));
        }
        if self.provider.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "provider.max_concurrent_fetches must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the duplicate permission policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.registry.duplicate_policy = policy;
        self
    }

    /// Sets the per-fact fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.provider.fetch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the validation limits.
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Controls whether a removed constraint's history stays queryable.
    pub fn with_retained_history(mut self, retain: bool) -> Self {
        self.registry.retain_history_on_remove = retain;
        self
    }
}

/// Validation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LimitsConfig {
    /// Maximum expression tree height.
    pub max_depth: usize,

    /// Maximum node count per constraint.
    pub max_nodes: usize,

    /// Maximum identifier length.
    pub max_identifier_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = ValidationLimits::default();
        Self {
            max_depth: limits.max_depth,
            max_nodes: limits.max_nodes,
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
        }
    }
}

impl From<LimitsConfig> for ValidationLimits {
    fn from(config: LimitsConfig) -> Self {
        ValidationLimits {
            max_depth: config.max_depth,
            max_nodes: config.max_nodes,
            max_identifier_len: config.max_identifier_len,
        }
    }
}

/// What happens when a constraint is added for a permission that already has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the add with a duplicate error.
    #[default]
    Reject,

    /// Atomically remove the existing constraint and register the new one.
    Replace,
}

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RegistryConfig {
    pub duplicate_policy: DuplicatePolicy,

    /// Keep activation history queryable after a constraint is removed.
    pub retain_history_on_remove: bool,

    /// Pull facts and evaluate immediately when a constraint is added.
    pub evaluate_on_register: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            retain_history_on_remove: true,
            evaluate_on_register: true,
        }
    }
}

/// Fact provider access configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ProviderConfig {
    /// Timeout for a single fact fetch, in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Maximum provider calls in flight at once.
    pub max_concurrent_fetches: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 5_000,
            max_concurrent_fetches: 16,
        }
    }
}

impl ProviderConfig {
    /// Returns the fetch timeout as a Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

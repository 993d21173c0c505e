//! Service configuration types
//!
//! Defines the structure of the service configuration file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::evaluator::{EvalError, UpstreamEvaluator};
use crate::utils::busy::BusyGate;

/// Default listen port
pub const DEFAULT_PORT: u16 = 6363;

/// Default busy threshold
pub const DEFAULT_BUSY_THRESHOLD: Duration = Duration::from_secs(2);

/// Errors that can occur during configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create evaluator: {0}")]
    Evaluator(#[from] EvalError),
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Service name used in logs
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a state read waits for evaluation before answering 202
    #[serde(default = "default_busy_threshold", with = "humantime_serde")]
    pub busy_threshold: Duration,
}

fn default_service_name() -> String {
    "stategate".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_busy_threshold() -> Duration {
    DEFAULT_BUSY_THRESHOLD
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            port: DEFAULT_PORT,
            busy_threshold: DEFAULT_BUSY_THRESHOLD,
        }
    }
}

impl ServerConfig {
    /// Busy gate for the configured threshold
    pub fn busy_gate(&self) -> BusyGate {
        BusyGate::new(self.busy_threshold)
    }
}

/// Upstream evaluator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Base URL of the node that evaluates processes
    pub upstream_url: String,

    /// Timeout for a single upstream evaluation
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

impl EvaluatorConfig {
    /// Create the upstream evaluator
    pub fn to_evaluator(&self) -> Result<UpstreamEvaluator, ConfigError> {
        let evaluator = match self.timeout {
            Some(timeout) => UpstreamEvaluator::with_timeout(&self.upstream_url, timeout)?,
            None => UpstreamEvaluator::new(&self.upstream_url)?,
        };
        Ok(evaluator)
    }
}

/// Which processes may be read
///
/// An empty `allow` list admits every process not in `restrict`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessListConfig {
    /// Only these processes may be read (when non-empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,

    /// These processes may never be read
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrict: Vec<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Evaluator settings
    pub evaluator: EvaluatorConfig,

    /// Process allow/restrict lists
    #[serde(default)]
    pub processes: ProcessListConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evaluator.upstream_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "evaluator.upstream_url must not be empty".to_string(),
            ));
        }

        let allowed: HashSet<&str> = self.processes.allow.iter().map(String::as_str).collect();
        if let Some(both) = self
            .processes
            .restrict
            .iter()
            .find(|id| allowed.contains(id.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "process '{both}' is both allowed and restricted"
            )));
        }

        Ok(())
    }

    /// Generate a default configuration
    pub fn default_config() -> Self {
        Config {
            server: ServerConfig::default(),
            evaluator: EvaluatorConfig {
                upstream_url: "http://evaluator:6363".to_string(),
                timeout: Some(Duration::from_secs(600)),
            },
            processes: ProcessListConfig::default(),
        }
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

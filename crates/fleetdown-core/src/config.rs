//! Scale-down run configuration (`fleetdown.toml`).
//!
//! Every field can also be supplied on the command line; the CLI loads the
//! file first (if any) and applies flags on top. `validate()` is called
//! before the first control-plane request.

use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required argument: {0}")]
    Missing(&'static str),

    #[error("desired-count must be a positive integer")]
    DesiredCountNotPositive,

    #[error("batch-size must be a positive integer")]
    BatchSizeNotPositive,

    #[error("invalid agent version threshold {value:?}: {reason}")]
    AgentVersion { value: String, reason: String },

    #[error("wait.max_attempts must be at least 1")]
    NoWaitAttempts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownscaleConfig {
    /// Cluster hosting the service.
    pub cluster: String,
    /// Service whose desired task count tracks the fleet size.
    pub service: String,
    /// Autoscaled instance group backing the cluster.
    #[serde(alias = "asg")]
    pub group: String,
    /// Number of container instances the cluster should keep.
    pub desired_count: u32,
    /// Instances drained and terminated per batch.
    pub batch_size: u32,
    /// Machine type preferred for termination.
    pub instance_type: Option<String>,
    pub region: String,
    /// Prefer instances whose agent is older than this version (exclusive).
    pub agent_version_before: Option<String>,
    /// Sort each selection tier by machine launch time, oldest first.
    pub sort_by_age: bool,
    /// Prefer lightly loaded instances (running-task count tier).
    pub task_count_detect: bool,
    /// Proceed when scheduler and instance-group desired counts disagree.
    pub allow_mismatch: bool,
    /// Cycle instances by lowering only the scheduler count, then restore it.
    pub instance_flip: bool,
    pub wait: WaitConfig,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            service: String::new(),
            group: String::new(),
            desired_count: 0,
            batch_size: 1,
            instance_type: None,
            region: "us-west-2".to_string(),
            agent_version_before: None,
            sort_by_age: false,
            task_count_detect: true,
            allow_mismatch: false,
            instance_flip: false,
            wait: WaitConfig::default(),
        }
    }
}

/// Polling policy for convergence waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub interval_secs: u64,
    pub max_interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_interval_secs: 60,
            max_attempts: 120,
        }
    }
}

impl DownscaleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DownscaleConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check required parameters. Fails fast, before any control-plane call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::Missing("service"));
        }
        if self.cluster.trim().is_empty() {
            return Err(ConfigError::Missing("cluster"));
        }
        if self.group.trim().is_empty() {
            return Err(ConfigError::Missing("asg"));
        }
        if self.desired_count == 0 {
            return Err(ConfigError::DesiredCountNotPositive);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::BatchSizeNotPositive);
        }
        if self.wait.max_attempts == 0 {
            return Err(ConfigError::NoWaitAttempts);
        }
        self.agent_threshold()?;
        Ok(())
    }

    /// The preferred machine type, ignoring an empty string.
    pub fn preferred_machine_type(&self) -> Option<&str> {
        self.instance_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// The parsed stale-agent threshold, if one is configured.
    pub fn agent_threshold(&self) -> Result<Option<Version>, ConfigError> {
        let Some(raw) = self
            .agent_version_before
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };
        Version::parse(raw)
            .map(Some)
            .map_err(|e| ConfigError::AgentVersion {
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }
}

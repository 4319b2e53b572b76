//! Runtime configuration for dasklink
//!
//! Configuration comes from three layers: built-in defaults, an optional
//! YAML file, and `DASKLINK_*` environment variables (strongest).

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Settings consulted by the cluster lifecycle components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Namespace all orchestrator objects live in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// External host substituted for the scheduler address when clients sit
    /// outside the orchestrator network; requires NodePort exposure
    #[serde(rename = "remoteHost")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_host: Option<String>,

    /// Base image used when the function has no built image
    #[serde(rename = "defaultImage")]
    #[serde(default = "default_image")]
    pub default_image: String,

    /// Idle scheduler lifetime passed to the orchestrator
    #[serde(rename = "schedulerTimeoutSeconds")]
    #[serde(default = "default_scheduler_timeout")]
    pub scheduler_timeout_secs: u64,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_image() -> String {
    "daskdev/dask:latest".to_string()
}

fn default_scheduler_timeout() -> u64 {
    3600
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            remote_host: None,
            default_image: default_image(),
            scheduler_timeout_secs: default_scheduler_timeout(),
        }
    }
}

impl RuntimeConfig {
    /// Apply `DASKLINK_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(namespace) = env::var("DASKLINK_NAMESPACE") {
            if !namespace.is_empty() {
                self.namespace = namespace;
            }
        }
        if let Ok(host) = env::var("DASKLINK_REMOTE_HOST") {
            if !host.is_empty() {
                self.remote_host = Some(host);
            }
        }
        if let Ok(image) = env::var("DASKLINK_DEFAULT_IMAGE") {
            if !image.is_empty() {
                self.default_image = image;
            }
        }
        self
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }
}

/// Load configuration from a YAML file.
/// This is the I/O boundary - it reads the file and delegates to serde.
pub fn load_config_file(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RuntimeConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

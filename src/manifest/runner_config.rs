//! Runner configuration
//!
//! Loaded from runner.yaml. Tells the built-in handlers which external
//! commands to run and how to wait for deployments:
//!
//! ```yaml
//! default_timeout: 1h
//!
//! env:
//!   MOJO_SERIES: trusty
//!
//! commands:
//!   collect: ["charm-collect", "{config}"]
//!   deploy: ["juju-deployer", "-c", "{bundle}", "{target}"]
//!   status: ["juju", "status", "--format=json"]
//!   leader: ["juju", "run", "--unit", "{unit}", "is-leader --format=json"]
//!
//! steady_state:
//!   poll_interval: 4s
//!   idle_confirmation: 15s
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::loader::LoadError;
use crate::engine::duration::deserialize_opt_duration;
use crate::engine::steady_state::SteadyStateSettings;

/// External command templates used by the built-in handlers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandsConfig {
    /// `{config}` is replaced with the collect file path
    #[serde(default)]
    pub collect: Option<Vec<String>>,

    /// `{bundle}`, `{target}` and `{config}` are replaced
    #[serde(default)]
    pub deploy: Option<Vec<String>>,

    #[serde(default = "default_status_command")]
    pub status: Vec<String>,

    /// `{unit}` is replaced with the unit name
    #[serde(default = "default_leader_command")]
    pub leader: Vec<String>,
}

fn default_status_command() -> Vec<String> {
    ["juju", "status", "--format=json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_leader_command() -> Vec<String> {
    ["juju", "run", "--unit", "{unit}", "is-leader --format=json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            collect: None,
            deploy: None,
            status: default_status_command(),
            leader: default_leader_command(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Applied to steps without a `timeout=` argument
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub default_timeout: Option<Duration>,

    /// Merged over the process environment
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub steady_state: SteadyStateSettings,
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: RunnerConfig = serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
            file: path.display().to_string(),
            error: e,
        })?;
        Ok(config)
    }
}

//! Bridge modules for external process communication
//!
//! This module provides the seams to the systems a run drives:
//! - `command`: run external programs and capture their output
//! - `juju`: cluster status and leadership queries for steady-state waits

use async_trait::async_trait;
use serde_json::Value;

pub mod command;
pub mod juju;

pub use command::{run_command, substitute, CommandOutput};
pub use juju::CommandStatusProbe;

/// Common error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to execute {program}: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },

    #[error("{program} exited with code {code}: {message}")]
    CommandFailed {
        program: String,
        code: i32,
        message: String,
    },

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Source of cluster status for steady-state waits
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Current cluster status document
    async fn status(&self) -> Result<Value, BridgeError>;

    /// Whether `unit` currently holds leadership of its service
    async fn is_leader(&self, unit: &str) -> Result<bool, BridgeError>;
}

//! Engine error types

use std::time::Duration;

use crate::bridge::BridgeError;
use crate::bundle::BundleError;
use crate::engine::result::FailureKind;
use crate::engine::steady_state::SteadyStateError;
use crate::manifest::StepKind;

/// Errors raised while building the step registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("A handler is already registered for step kind '{0}'")]
    Duplicate(StepKind),
}

/// A manifest step whose kind has no registered handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: no handler registered for step kind '{kind}'")]
pub struct ValidationError {
    pub line: usize,
    pub kind: StepKind,
}

/// Errors recorded against a single step during a run
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("No handler registered for step kind '{0}'")]
    UnknownStepKind(StepKind),

    #[error("Step timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    HandlerFailure(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StepError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::UnknownStepKind(_) => FailureKind::UnknownStepKind,
            StepError::Timeout(_) => FailureKind::Timeout,
            StepError::HandlerFailure(_) => FailureKind::HandlerFailure,
            StepError::InvalidArgument(_) => FailureKind::InvalidArgument,
        }
    }

    /// Halts the run even when the step is marked `fatal=false`
    pub fn always_fatal(&self) -> bool {
        matches!(self, StepError::UnknownStepKind(_))
    }

    /// Whether another attempt could change the outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepError::Timeout(_) | StepError::HandlerFailure(_))
    }
}

/// Errors reported by step handlers
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Deployment did not settle: {0}")]
    SteadyState(#[from] SteadyStateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HandlerError> for StepError {
    fn from(e: HandlerError) -> Self {
        StepError::HandlerFailure(e.to_string())
    }
}

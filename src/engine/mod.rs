//! Manifest execution engine module
//!
//! This module contains:
//! - `executor` - The sequential manifest executor
//! - `registry` - Step kind to handler mapping and the `StepHandler` trait
//! - `context` - Run-wide context shared with every handler
//! - `error` - Engine error types
//! - `result` - Step results and the run report
//! - `handlers` - Built-in collect, deploy and script handlers
//! - `steady_state` - Waiting for deployments to settle
//! - `duration` - Duration parsing for step arguments and config

pub mod context;
pub mod duration;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod registry;
pub mod result;
pub mod steady_state;

pub use context::RunContext;
pub use duration::{parse_duration, DurationError};
pub use error::{HandlerError, RegistrationError, StepError, ValidationError};
pub use executor::Executor;
pub use handlers::{CollectHandler, DeployHandler, ScriptHandler};
pub use registry::{StepHandler, StepOutcome, StepRegistry};
pub use result::{FailureKind, Outcome, RunReport, StepResult, StepStatus};
pub use steady_state::{
    assess, wait_for_steady_state, Assessment, SteadyStateError, SteadyStateSettings,
};

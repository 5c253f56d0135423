//! Manifest definitions and parsing
//!
//! A manifest is a line-oriented list of steps:
//!
//! ```text
//! # comments and blank lines are ignored
//! collect config=collect-${MOJO_SERIES}
//! deploy config=keystone.yaml target=${MOJO_SERIES}-kilo wait=true timeout=1h
//! verify config=check_keystone.py retries=2 retry_delay=30s
//! ```

pub mod loader;
pub mod parser;
pub mod runner_config;
pub mod step;
pub mod variables;

pub use loader::{LoadError, ManifestLoader};
pub use parser::{parse, parse_line, ParseError};
pub use runner_config::{CommandsConfig, RunnerConfig};
pub use step::{Manifest, Step, StepArgs, StepKind};
pub use variables::{resolve as resolve_variables, VariableError};

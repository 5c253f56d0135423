//! # Manifest Runner
//!
//! A manifest-driven orchestration engine for deploying and verifying service
//! bundles. A manifest is a short, line-oriented list of steps that run one
//! after another.
//!
//! ## Features
//!
//! - **Line-oriented manifests** - `<kind> config=<name> [key=value ...]`
//! - **Variable expansion** - `${NAME}` and `${NAME:-default}` against the run environment
//! - **Pluggable step handlers** - `collect`, `deploy`, `verify` and `script` dispatch through a registry
//! - **Per-step policy** - `timeout`, `delay`, `retries`, `retry_delay` and `fatal`
//! - **Bundle templates** - inheritance with deep merge and option overrides
//! - **Steady-state waits** - `deploy ... wait=true` polls the cluster until every unit is idle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manifest_runner::prelude::*;
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let env: HashMap<String, String> = std::env::vars().collect();
//!     let manifest = parse(
//!         "smoke",
//!         "script config=setup.sh\nverify config=check.sh timeout=5m fatal=false\n",
//!         &env,
//!     )?;
//!
//!     let config = RunnerConfig::default();
//!     let registry = StepRegistry::with_builtin_handlers(&config);
//!     registry.validate(&manifest)?;
//!
//!     let context = RunContext::new(env, registry).with_workspace("./specs");
//!     let report = Executor::new(context).run(&manifest).await;
//!
//!     println!("Run {} finished: success={}", report.run_id, report.success());
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod bundle;
pub mod engine;
pub mod manifest;

// Re-export main types
pub use bridge::{BridgeError, CommandOutput, CommandStatusProbe, StatusProbe};
pub use bundle::{resolve as resolve_bundle, BundleError, BundleSet, BundleTemplate, ResolvedBundle};
pub use engine::{
    Executor, FailureKind, HandlerError, Outcome, RegistrationError, RunContext, RunReport,
    StepError, StepHandler, StepOutcome, StepRegistry, StepResult, StepStatus, ValidationError,
};
pub use manifest::{
    parse, LoadError, Manifest, ManifestLoader, ParseError, RunnerConfig, Step, StepArgs, StepKind,
    VariableError,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bundle::{resolve as resolve_bundle, BundleLoader, ResolvedBundle};
    pub use crate::engine::{
        Executor, Outcome, RunContext, RunReport, StepHandler, StepOutcome, StepRegistry,
        StepResult, StepStatus,
    };
    pub use crate::manifest::{
        parse, LoadError, Manifest, ManifestLoader, RunnerConfig, Step, StepArgs, StepKind,
    };
}

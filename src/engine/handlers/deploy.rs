//! Deploy steps
//!
//! ```text
//! deploy config=keystone.yaml target=trusty-kilo wait=true timeout=1h
//! ```
//!
//! The target is resolved from the bundle file, written to a temporary file and
//! handed to `commands.deploy`. With `wait=true` the step only succeeds once
//! the deployment reaches a steady state.

use async_trait::async_trait;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::bridge::{run_command, substitute, CommandStatusProbe, StatusProbe};
use crate::engine::context::RunContext;
use crate::engine::error::HandlerError;
use crate::engine::handlers::required_arg;
use crate::engine::handlers::script::script_env;
use crate::engine::registry::{StepHandler, StepOutcome};
use crate::engine::steady_state::{wait_for_steady_state, SteadyStateSettings};
use crate::manifest::step::is_truthy;
use crate::manifest::{CommandsConfig, RunnerConfig, StepArgs};

#[derive(Clone, Default)]
pub struct DeployHandler {
    commands: CommandsConfig,
    settings: SteadyStateSettings,
    probe: Option<Arc<dyn StatusProbe>>,
}

impl DeployHandler {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            commands: config.commands.clone(),
            settings: config.steady_state.clone(),
            probe: None,
        }
    }

    /// Use `probe` for steady-state waits instead of the status commands
    pub fn with_probe(mut self, probe: Arc<dyn StatusProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    fn probe(&self, ctx: &RunContext) -> Arc<dyn StatusProbe> {
        match &self.probe {
            Some(probe) => Arc::clone(probe),
            None => Arc::new(CommandStatusProbe::new(
                self.commands.status.clone(),
                self.commands.leader.clone(),
                ctx.env().clone(),
            )),
        }
    }
}

impl fmt::Debug for DeployHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployHandler")
            .field("commands", &self.commands)
            .field("settings", &self.settings)
            .field("custom_probe", &self.probe.is_some())
            .finish()
    }
}

#[async_trait]
impl StepHandler for DeployHandler {
    #[instrument(skip(self, args, ctx), fields(run_id = %ctx.run_id))]
    async fn execute(
        &self,
        config: &str,
        args: &StepArgs,
        ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        let template = self
            .commands
            .deploy
            .as_ref()
            .ok_or_else(|| HandlerError::Config("commands.deploy is not configured".to_string()))?;
        let target = required_arg(args, "target")?;

        let bundle = ctx.resolve_bundle(config, target)?;
        let yaml = bundle
            .to_yaml()
            .map_err(|e| HandlerError::Failed(format!("cannot render bundle {}: {}", target, e)))?;

        let mut file = tempfile::Builder::new()
            .prefix("bundle-")
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;

        let bundle_path = file.path().to_string_lossy().into_owned();
        let resource = ctx.resource_path(config).to_string_lossy().into_owned();
        let argv = substitute(
            template,
            &[
                ("bundle", bundle_path.as_str()),
                ("target", target),
                ("config", resource.as_str()),
            ],
        );

        info!("Deploying {} from {}", target, config);
        let output = run_command(&argv, &script_env(args, ctx), Some(ctx.workspace())).await?;
        if !output.success() {
            return Err(HandlerError::Failed(output.failure_message()));
        }

        let waited = args.get("wait").is_some_and(|w| is_truthy(w));
        if waited {
            info!("Waiting for {} to reach a steady state", target);
            let probe = self.probe(ctx);
            wait_for_steady_state(probe.as_ref(), &self.settings).await?;
        }

        let message = if waited {
            format!("deployed {} (steady)", target)
        } else {
            format!("deployed {}", target)
        };
        Ok(StepOutcome {
            message: Some(message),
            outputs: output.to_outputs(),
        })
    }
}

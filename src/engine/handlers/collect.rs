//! Collect steps
//!
//! Runs `commands.collect` from runner.yaml with `{config}` replaced by the
//! path of the collect file inside the workspace.

use async_trait::async_trait;
use tracing::info;

use crate::bridge::{run_command, substitute};
use crate::engine::context::RunContext;
use crate::engine::error::HandlerError;
use crate::engine::handlers::script::script_env;
use crate::engine::registry::{StepHandler, StepOutcome};
use crate::manifest::StepArgs;

#[derive(Debug, Clone, Default)]
pub struct CollectHandler {
    command: Option<Vec<String>>,
}

impl CollectHandler {
    pub fn new(command: Option<Vec<String>>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl StepHandler for CollectHandler {
    async fn execute(
        &self,
        config: &str,
        args: &StepArgs,
        ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        let template = self
            .command
            .as_ref()
            .ok_or_else(|| HandlerError::Config("commands.collect is not configured".to_string()))?;

        let resource = ctx.resource_path(config);
        let resource = resource.to_string_lossy();
        let argv = substitute(template, &[("config", resource.as_ref())]);

        info!("Collecting charms from {}", config);
        let output = run_command(&argv, &script_env(args, ctx), Some(ctx.workspace())).await?;

        if output.success() {
            Ok(StepOutcome {
                message: Some(format!("collected {}", config)),
                outputs: output.to_outputs(),
            })
        } else {
            Err(HandlerError::Failed(output.failure_message()))
        }
    }
}

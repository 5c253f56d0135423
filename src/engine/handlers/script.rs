//! Script and verify steps
//!
//! ```text
//! script config=setup.sh
//! verify config=check_keystone.py KEYSTONE_PORT=5000
//! ```
//!
//! The executable is `<workspace>/<config>`. Upper-case step arguments are
//! exported to it alongside the run environment.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

use crate::bridge::run_command;
use crate::engine::context::RunContext;
use crate::engine::error::HandlerError;
use crate::engine::registry::{StepHandler, StepOutcome};
use crate::manifest::StepArgs;

#[derive(Debug, Clone, Default)]
pub struct ScriptHandler;

impl ScriptHandler {
    pub fn new() -> Self {
        Self
    }
}

/// Run environment plus every upper-case step argument
pub fn script_env(args: &StepArgs, ctx: &RunContext) -> HashMap<String, String> {
    let mut env = ctx.env().clone();
    for (key, value) in args {
        if is_env_key(key) {
            env.insert(key.clone(), value.clone());
        }
    }
    env
}

fn is_env_key(key: &str) -> bool {
    key.chars().any(|c| c.is_ascii_uppercase())
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[async_trait]
impl StepHandler for ScriptHandler {
    async fn execute(
        &self,
        config: &str,
        args: &StepArgs,
        ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        let path = ctx.resource_path(config);
        if !path.is_file() {
            return Err(HandlerError::Config(format!(
                "script not found: {}",
                path.display()
            )));
        }
        let path = path.canonicalize()?;

        info!("Running script {}", path.display());
        let argv = vec![path.to_string_lossy().into_owned()];
        let output = run_command(&argv, &script_env(args, ctx), Some(ctx.workspace())).await?;

        if output.success() {
            Ok(StepOutcome {
                message: Some(format!("{} passed", config)),
                outputs: output.to_outputs(),
            })
        } else {
            Err(HandlerError::Failed(output.failure_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::StepRegistry;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_script(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn context(dir: &Path) -> RunContext {
        let mut env = HashMap::new();
        env.insert("MOJO_SERIES".to_string(), "trusty".to_string());
        RunContext::new(env, StepRegistry::new()).with_workspace(dir)
    }

    #[tokio::test]
    async fn test_script_success() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "hello.sh", "echo hello $MOJO_SERIES");

        let outcome = ScriptHandler::new()
            .execute("hello.sh", &StepArgs::new(), &context(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.outputs.get("stdout"), Some(&"hello trusty".to_string()));
    }

    #[tokio::test]
    async fn test_uppercase_args_exported() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "check.sh", "echo $KEYSTONE_PORT-${timeout:-unset}");

        let mut args = StepArgs::new();
        args.insert("KEYSTONE_PORT".to_string(), "5000".to_string());
        args.insert("timeout".to_string(), "60".to_string());

        let outcome = ScriptHandler::new()
            .execute("check.sh", &args, &context(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.outputs.get("stdout"), Some(&"5000-unset".to_string()));
    }

    #[tokio::test]
    async fn test_runs_in_workspace() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "where.sh", "test -f where.sh && echo found");

        let outcome = ScriptHandler::new()
            .execute("where.sh", &StepArgs::new(), &context(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.outputs.get("stdout"), Some(&"found".to_string()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "broken.sh", "echo 'keystone unreachable' >&2; exit 1");

        let err = ScriptHandler::new()
            .execute("broken.sh", &StepArgs::new(), &context(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(ref msg) if msg == "keystone unreachable"));
    }

    #[tokio::test]
    async fn test_missing_script() {
        let dir = tempdir().unwrap();
        let err = ScriptHandler::new()
            .execute("nope.sh", &StepArgs::new(), &context(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Config(_)));
    }

    #[test]
    fn test_env_keys() {
        assert!(is_env_key("KEYSTONE_PORT"));
        assert!(is_env_key("OS_V3"));
        assert!(!is_env_key("timeout"));
        assert!(!is_env_key("Mixed"));
        assert!(!is_env_key("_"));
    }
}

//! External command execution
//!
//! Commands run with an explicit environment (`env_clear` first) so a run only
//! sees what its RunContext provides. Dropping the future stops waiting on the
//! child but does not kill it.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::BridgeError;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Outputs in the shape handlers report them
    pub fn to_outputs(&self) -> HashMap<String, String> {
        let mut outputs = HashMap::new();
        outputs.insert("stdout".to_string(), self.stdout.clone());
        outputs.insert("stderr".to_string(), self.stderr.clone());
        outputs.insert("exit_code".to_string(), self.code.to_string());
        outputs
    }

    /// stderr when present, otherwise the exit code
    pub fn failure_message(&self) -> String {
        if self.stderr.is_empty() {
            format!("exited with code {}", self.code)
        } else {
            self.stderr.clone()
        }
    }
}

/// Run `argv` to completion and capture stdout/stderr
pub async fn run_command(
    argv: &[String],
    env: &HashMap<String, String>,
    working_dir: Option<&Path>,
) -> Result<CommandOutput, BridgeError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| BridgeError::ConfigError("empty command".to_string()))?;

    info!("Executing command: {}", argv.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.env_clear();
    cmd.envs(env);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd.output().await.map_err(|error| BridgeError::Spawn {
        program: program.clone(),
        error,
    })?;

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        code: output.status.code().unwrap_or(-1),
    };
    debug!("{} exited with code {}", program, result.code);

    Ok(result)
}

/// Run `argv` and fail unless it exits 0
pub async fn run_checked(
    argv: &[String],
    env: &HashMap<String, String>,
    working_dir: Option<&Path>,
) -> Result<CommandOutput, BridgeError> {
    let output = run_command(argv, env, working_dir).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(BridgeError::CommandFailed {
            program: argv.first().cloned().unwrap_or_default(),
            code: output.code,
            message: output.failure_message(),
        })
    }
}

/// Replace `{name}` placeholders in every element of a command template
pub fn substitute(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|part| {
            vars.iter().fold(part.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_run_command_captures_output() {
        let output = run_command(&sh("echo hello; echo oops >&2"), &HashMap::new(), None)
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr, "oops");
    }

    #[tokio::test]
    async fn test_environment_is_explicit() {
        let mut env = HashMap::new();
        env.insert("MOJO_SERIES".to_string(), "trusty".to_string());
        let output = run_command(&sh("echo ${MOJO_SERIES}-${HOME:-none}"), &env, None)
            .await
            .unwrap();
        assert_eq!(output.stdout, "trusty-none");
    }

    #[tokio::test]
    async fn test_run_checked_failure() {
        let err = run_checked(&sh("exit 3"), &HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::CommandFailed { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let output = run_command(&sh("pwd"), &HashMap::new(), Some(Path::new("/tmp")))
            .await
            .unwrap();
        // On macOS /tmp is a symlink to /private/tmp
        assert!(output.stdout == "/tmp" || output.stdout == "/private/tmp");
    }

    #[tokio::test]
    async fn test_empty_command() {
        let err = run_command(&[], &HashMap::new(), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_substitute() {
        let template = vec![
            "juju-deployer".to_string(),
            "-c".to_string(),
            "{bundle}".to_string(),
            "{target}".to_string(),
        ];
        let argv = substitute(&template, &[("bundle", "/tmp/b.yaml"), ("target", "trusty-kilo")]);
        assert_eq!(argv, vec!["juju-deployer", "-c", "/tmp/b.yaml", "trusty-kilo"]);
    }
}

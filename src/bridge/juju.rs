//! Cluster status via the juju command line
//!
//! ```yaml
//! commands:
//!   status: ["juju", "status", "--format=json"]
//!   leader: ["juju", "run", "--unit", "{unit}", "is-leader --format=json"]
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use super::command::{run_checked, substitute};
use super::{BridgeError, StatusProbe};

/// StatusProbe backed by external commands
#[derive(Debug, Clone)]
pub struct CommandStatusProbe {
    status_command: Vec<String>,
    leader_command: Vec<String>,
    env: HashMap<String, String>,
}

impl CommandStatusProbe {
    pub fn new(
        status_command: Vec<String>,
        leader_command: Vec<String>,
        mut env: HashMap<String, String>,
    ) -> Self {
        // Status timestamps must be UTC regardless of the caller's locale
        env.insert("TZ".to_string(), "UTC".to_string());
        env.insert("JUJU_CLI_VERSION".to_string(), "1".to_string());
        Self {
            status_command,
            leader_command,
            env,
        }
    }
}

#[async_trait]
impl StatusProbe for CommandStatusProbe {
    async fn status(&self) -> Result<Value, BridgeError> {
        let output = run_checked(&self.status_command, &self.env, None).await?;
        Ok(serde_json::from_str(&output.stdout)?)
    }

    async fn is_leader(&self, unit: &str) -> Result<bool, BridgeError> {
        let argv = substitute(&self.leader_command, &[("unit", unit)]);
        let output = run_checked(&argv, &self.env, None).await?;
        match serde_json::from_str::<Value>(&output.stdout)? {
            Value::Bool(leader) => Ok(leader),
            other => Err(BridgeError::InvalidOutput(format!(
                "is-leader for {} returned {}",
                unit, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_status_parses_json() {
        let probe = CommandStatusProbe::new(
            sh(r#"echo '{"services": {}}'"#),
            sh("echo true"),
            HashMap::new(),
        );
        let status = probe.status().await.unwrap();
        assert!(status.get("services").is_some());
    }

    #[tokio::test]
    async fn test_status_runs_in_utc() {
        let probe = CommandStatusProbe::new(
            sh(r#"echo "{\"tz\": \"$TZ\"}""#),
            sh("echo true"),
            HashMap::new(),
        );
        let status = probe.status().await.unwrap();
        assert_eq!(status["tz"], "UTC");
    }

    #[tokio::test]
    async fn test_is_leader_substitutes_unit() {
        let probe = CommandStatusProbe::new(
            sh("echo '{}'"),
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                r#"[ "$0" = "keystone/0" ] && echo true || echo false"#.to_string(),
                "{unit}".to_string(),
            ],
            HashMap::new(),
        );
        assert!(probe.is_leader("keystone/0").await.unwrap());
        assert!(!probe.is_leader("keystone/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_leader_rejects_non_bool() {
        let probe = CommandStatusProbe::new(sh("echo '{}'"), sh("echo 42"), HashMap::new());
        let err = probe.is_leader("ceph/0").await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidOutput(_)));
    }
}

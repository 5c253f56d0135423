//! Manifest Executor - Runs manifests step by step
//!
//! This is the main engine that:
//! 1. Executes steps strictly in manifest order
//! 2. Dispatches each step to its handler through the registry
//! 3. Applies per-step delay, timeout and retry policy
//! 4. Halts at the first fatal failure
//! 5. Produces a RunReport covering every step

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::engine::context::RunContext;
use crate::engine::duration::parse_duration;
use crate::engine::error::StepError;
use crate::engine::registry::{StepHandler, StepOutcome};
use crate::engine::result::{Outcome, RunReport, StepResult, StepStatus};
use crate::manifest::{Manifest, Step};

/// Delay, timeout and retry settings for one step
#[derive(Debug, Clone, PartialEq, Eq)]
struct StepPolicy {
    timeout: Option<Duration>,
    delay: Duration,
    retries: u32,
    retry_delay: Duration,
}

/// Sequential manifest executor
pub struct Executor {
    context: RunContext,
    default_timeout: Option<Duration>,
}

impl Executor {
    pub fn new(context: RunContext) -> Self {
        Self {
            context,
            default_timeout: None,
        }
    }

    /// Timeout applied to steps that do not declare their own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run a manifest to completion or to its first fatal failure
    #[instrument(skip(self, manifest), fields(manifest = %manifest.name, run_id = %self.context.run_id))]
    pub async fn run(&self, manifest: &Manifest) -> RunReport {
        info!(
            "Starting manifest: {} ({} steps)",
            manifest.name,
            manifest.len()
        );

        let started_at = Utc::now();
        let mut results = Vec::with_capacity(manifest.len());
        let mut outcome = Outcome::Success;
        let mut halted_at: Option<usize> = None;

        for (index, step) in manifest.steps.iter().enumerate() {
            if let Some(failed) = halted_at {
                results.push(skipped(index, step, failed));
                continue;
            }

            let result = self.execute_step(index, step).await;

            if result.is_failure() {
                if result.fatal {
                    error!(
                        "Step {} '{}' failed, halting run: {}",
                        index + 1,
                        step.label(),
                        result.message.as_deref().unwrap_or("")
                    );
                    outcome = Outcome::Failure;
                    halted_at = Some(index);
                } else {
                    warn!(
                        "Non-fatal step {} '{}' failed, continuing: {}",
                        index + 1,
                        step.label(),
                        result.message.as_deref().unwrap_or("")
                    );
                }
            }

            results.push(result);
        }

        info!("Manifest {} finished: {:?}", manifest.name, outcome);

        RunReport {
            run_id: self.context.run_id.clone(),
            manifest: manifest.name.clone(),
            started_at,
            finished_at: Utc::now(),
            results,
            outcome,
        }
    }

    /// Execute a single step, capturing any failure into the result
    #[instrument(skip(self, step), fields(kind = %step.kind, config = %step.config))]
    async fn execute_step(&self, index: usize, step: &Step) -> StepResult {
        info!("Executing step {}: {}", index + 1, step.to_line());
        let start = Instant::now();

        let (attempts, result) = match self.step_policy(step) {
            Ok(policy) => self.invoke_with_retries(step, &policy).await,
            Err(e) => (0, Err(e)),
        };

        let (status, failure, message, fatal) = match result {
            Ok(outcome) => (StepStatus::Success, None, outcome.message, step.is_fatal()),
            Err(e) => (
                StepStatus::Failure,
                Some(e.kind()),
                Some(e.to_string()),
                step.is_fatal() || e.always_fatal(),
            ),
        };

        StepResult {
            index,
            kind: step.kind,
            config: step.config.clone(),
            status,
            failure,
            duration: start.elapsed(),
            attempts,
            fatal,
            message,
        }
    }

    /// Read `timeout`, `delay`, `retries` and `retry_delay` from the step args
    fn step_policy(&self, step: &Step) -> Result<StepPolicy, StepError> {
        let duration_arg = |key: &str| -> Result<Option<Duration>, StepError> {
            step.arg(key)
                .map(|value| {
                    parse_duration(value)
                        .map_err(|e| StepError::InvalidArgument(format!("{}: {}", key, e)))
                })
                .transpose()
        };

        let timeout = match duration_arg("timeout")? {
            Some(limit) if limit.is_zero() => None,
            Some(limit) => Some(limit),
            None => self.default_timeout,
        };

        let retries = step
            .arg("retries")
            .map(|value| {
                value.trim().parse::<u32>().map_err(|_| {
                    StepError::InvalidArgument(format!(
                        "retries: expected a non-negative integer, got '{}'",
                        value
                    ))
                })
            })
            .transpose()?
            .unwrap_or(0);

        Ok(StepPolicy {
            timeout,
            delay: duration_arg("delay")?.unwrap_or(Duration::ZERO),
            retries,
            retry_delay: duration_arg("retry_delay")?.unwrap_or(Duration::ZERO),
        })
    }

    async fn invoke_with_retries(
        &self,
        step: &Step,
        policy: &StepPolicy,
    ) -> (u32, Result<StepOutcome, StepError>) {
        let handler = match self.context.registry().get(step.kind) {
            Ok(handler) => handler,
            Err(e) => return (0, Err(e)),
        };

        if !policy.delay.is_zero() {
            info!("Waiting {:?} before {}", policy.delay, step.label());
            tokio::time::sleep(policy.delay).await;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.invoke_once(&handler, step, policy.timeout).await {
                Err(e) if e.is_retryable() && attempt <= policy.retries => {
                    warn!(
                        "Attempt {}/{} of {} failed: {}",
                        attempt,
                        policy.retries.saturating_add(1),
                        step.label(),
                        e
                    );
                    if !policy.retry_delay.is_zero() {
                        tokio::time::sleep(policy.retry_delay).await;
                    }
                }
                result => return (attempt, result),
            }
        }
    }

    /// Invoke the handler once, bounded by `timeout`.
    ///
    /// On timeout the engine stops waiting; the external action is not interrupted.
    async fn invoke_once(
        &self,
        handler: &Arc<dyn StepHandler>,
        step: &Step,
        timeout: Option<Duration>,
    ) -> Result<StepOutcome, StepError> {
        let call = handler.execute(&step.config, &step.args, &self.context);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(StepError::from),
                Err(_) => Err(StepError::Timeout(limit)),
            },
            None => call.await.map_err(StepError::from),
        }
    }
}

fn skipped(index: usize, step: &Step, failed: usize) -> StepResult {
    StepResult {
        index,
        kind: step.kind,
        config: step.config.clone(),
        status: StepStatus::Skipped,
        failure: None,
        duration: Duration::ZERO,
        attempts: 0,
        fatal: step.is_fatal(),
        message: Some(format!("skipped after fatal failure of step {}", failed + 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::StepRegistry;
    use crate::manifest::StepKind;
    use std::collections::HashMap;

    fn executor() -> Executor {
        Executor::new(RunContext::new(HashMap::new(), StepRegistry::new()))
    }

    #[test]
    fn test_policy_defaults() {
        let step = Step::new(StepKind::Verify, "check_juju.py");
        let policy = executor().step_policy(&step).unwrap();
        assert_eq!(
            policy,
            StepPolicy {
                timeout: None,
                delay: Duration::ZERO,
                retries: 0,
                retry_delay: Duration::ZERO,
            }
        );
    }

    #[test]
    fn test_policy_from_args() {
        let step = Step::new(StepKind::Script, "x.py")
            .with_arg("timeout", "5400")
            .with_arg("delay", "30s")
            .with_arg("retries", "2")
            .with_arg("retry_delay", "500ms");
        let policy = executor().step_policy(&step).unwrap();
        assert_eq!(policy.timeout, Some(Duration::from_secs(5400)));
        assert_eq!(policy.delay, Duration::from_secs(30));
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_default_timeout_and_zero_timeout() {
        let exec = executor().with_default_timeout(Some(Duration::from_secs(60)));

        let plain = Step::new(StepKind::Verify, "a");
        assert_eq!(
            exec.step_policy(&plain).unwrap().timeout,
            Some(Duration::from_secs(60))
        );

        let unbounded = Step::new(StepKind::Verify, "a").with_arg("timeout", "0");
        assert_eq!(exec.step_policy(&unbounded).unwrap().timeout, None);
    }

    #[test]
    fn test_invalid_policy_args() {
        let bad_timeout = Step::new(StepKind::Verify, "a").with_arg("timeout", "soon");
        assert!(matches!(
            executor().step_policy(&bad_timeout),
            Err(StepError::InvalidArgument(_))
        ));

        let bad_retries = Step::new(StepKind::Verify, "a").with_arg("retries", "-1");
        assert!(matches!(
            executor().step_policy(&bad_retries),
            Err(StepError::InvalidArgument(_))
        ));
    }
}

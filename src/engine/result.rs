//! Execution result types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::manifest::StepKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
    Skipped,
}

/// Why a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownStepKind,
    Timeout,
    HandlerFailure,
    InvalidArgument,
}

/// Result of a step execution
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Position in the manifest (0-based)
    pub index: usize,
    pub kind: StepKind,
    pub config: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub attempts: u32,
    /// Whether a failure of this step halts the run
    pub fatal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == StepStatus::Failure
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// Result of a manifest run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub manifest: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<StepResult>,
    pub outcome: Outcome,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Results of steps that actually ran (excludes steps skipped after a halt)
    pub fn executed(&self) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(|r| r.status != StepStatus::Skipped)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

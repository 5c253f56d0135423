//! Manifest and Step definitions
//!
//! A manifest is an ordered list of steps. Each step names a kind, the external
//! config resource it acts on, and a set of resolved `key=value` arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::variables::escape;

/// The closed set of step kinds a manifest may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Fetch charms or other deployable units
    Collect,
    /// Deploy a bundle target
    Deploy,
    /// Check cluster health
    Verify,
    /// Run an arbitrary script
    Script,
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Collect,
        StepKind::Deploy,
        StepKind::Verify,
        StepKind::Script,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Collect => "collect",
            StepKind::Deploy => "deploy",
            StepKind::Verify => "verify",
            StepKind::Script => "script",
        }
    }

    /// Collect and deploy failures always halt the run
    pub fn always_fatal(&self) -> bool {
        matches!(self, StepKind::Collect | StepKind::Deploy)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collect" => Ok(StepKind::Collect),
            "deploy" => Ok(StepKind::Deploy),
            "verify" => Ok(StepKind::Verify),
            "script" => Ok(StepKind::Script),
            other => Err(other.to_string()),
        }
    }
}

/// Resolved step arguments, kept sorted so serialization is deterministic
pub type StepArgs = BTreeMap<String, String>;

/// A single manifest directive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,

    /// External config/script resource; opaque to the engine
    pub config: String,

    #[serde(default)]
    pub args: StepArgs,

    /// 1-based source line (diagnostics only)
    #[serde(default)]
    pub line: usize,
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.config == other.config && self.args == other.args
    }
}

impl Eq for Step {}

impl Step {
    pub fn new(kind: StepKind, config: impl Into<String>) -> Self {
        Self {
            kind,
            config: config.into(),
            args: StepArgs::new(),
            line: 0,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// Whether a failure of this step halts the run.
    ///
    /// Verify and script steps may opt out with `fatal=false`.
    pub fn is_fatal(&self) -> bool {
        if self.kind.always_fatal() {
            return true;
        }
        match self.arg("fatal") {
            Some(value) => !is_falsy(value),
            None => true,
        }
    }

    /// Canonical single-line form: `kind config=X key=value ...`
    pub fn to_line(&self) -> String {
        let mut line = format!("{} config={}", self.kind, quote(&self.config));
        for (key, value) in &self.args {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&quote(value));
        }
        line
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.config)
    }
}

/// Quote and escape a resolved value so that parsing it again yields `value`
fn quote(value: &str) -> String {
    let value = escape(value);
    if value.is_empty() {
        return "''".to_string();
    }
    if !value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        return value;
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    // Both quote characters: single-quoted runs joined by "'"
    let runs: Vec<String> = value.split('\'').map(|run| format!("'{}'", run)).collect();
    runs.join("\"'\"")
}

pub(crate) fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

pub(crate) fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "no" | "0" | "off"
    )
}

/// An ordered, non-empty list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{}", step.to_line())?;
        }
        Ok(())
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use manifest_runner::prelude::*;
use manifest_runner::HandlerError;
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_manifest(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write manifest file");
}

pub fn write_runner_config(dir: &Path, content: &str) {
    fs::write(dir.join("runner.yaml"), content).expect("Failed to write runner.yaml");
}

/// Write an executable `/bin/sh` script into `dir`
pub fn write_script(dir: &Path, filename: &str, body: &str) {
    let path = dir.join(filename);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
}

pub fn keystone_bundle() -> &'static str {
    r#"
openstack-base:
  series: trusty
  services:
    keystone:
      charm: cs:trusty/keystone
      num_units: 1
    mysql:
      charm: cs:trusty/mysql
      options:
        max-connections: 500
trusty-kilo:
  inherits: openstack-base
  overrides:
    openstack-origin: cloud:trusty-kilo
"#
}

pub fn parse_manifest(source: &str) -> Manifest {
    parse("test", source, &HashMap::new()).expect("manifest should parse")
}

/// Run `manifest` against `registry` with an empty environment
pub async fn run_with(registry: StepRegistry, manifest: &Manifest) -> RunReport {
    Executor::new(RunContext::new(HashMap::new(), registry))
        .run(manifest)
        .await
}

/// Records every invocation and succeeds
#[derive(Default, Clone)]
pub struct RecordingHandler {
    pub calls: Arc<Mutex<Vec<(String, StepArgs)>>>,
}

impl RecordingHandler {
    pub fn configs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(config, _)| config.clone())
            .collect()
    }
}

#[async_trait]
impl StepHandler for RecordingHandler {
    async fn execute(
        &self,
        config: &str,
        args: &StepArgs,
        _ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        self.calls
            .lock()
            .unwrap()
            .push((config.to_string(), args.clone()));
        Ok(StepOutcome::with_message(format!("ran {}", config)))
    }
}

/// Always fails with the given message
pub struct FailingHandler(pub &'static str);

#[async_trait]
impl StepHandler for FailingHandler {
    async fn execute(
        &self,
        _config: &str,
        _args: &StepArgs,
        _ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        Err(HandlerError::Failed(self.0.to_string()))
    }
}

/// Sleeps before succeeding
pub struct SlowHandler(pub Duration);

#[async_trait]
impl StepHandler for SlowHandler {
    async fn execute(
        &self,
        _config: &str,
        _args: &StepArgs,
        _ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        tokio::time::sleep(self.0).await;
        Ok(StepOutcome::default())
    }
}

/// Fails the first `failures` calls, then succeeds
#[derive(Clone)]
pub struct FlakyHandler {
    pub failures: usize,
    pub calls: Arc<AtomicUsize>,
}

impl FlakyHandler {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepHandler for FlakyHandler {
    async fn execute(
        &self,
        _config: &str,
        _args: &StepArgs,
        _ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(HandlerError::Failed(format!("attempt {} failed", call + 1)))
        } else {
            Ok(StepOutcome::default())
        }
    }
}

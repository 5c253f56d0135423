//! Steady-state wait for deployments
//!
//! A deployment is steady once every unit (and subordinate) is idle, no
//! service is dying, and every service has a leader, continuously for the
//! idle-confirmation window. A unit in an error state aborts the wait.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::bridge::{BridgeError, StatusProbe};
use crate::engine::duration::deserialize_duration;

/// Agents at or above this version always have a leader elected
const LEADER_ELECTION_VERSION: [u64; 2] = [1, 23];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SteadyStateSettings {
    #[serde(default = "default_poll_interval", deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,

    #[serde(
        default = "default_idle_confirmation",
        deserialize_with = "deserialize_duration"
    )]
    pub idle_confirmation: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(4)
}

fn default_idle_confirmation() -> Duration {
    Duration::from_secs(15)
}

impl Default for SteadyStateSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            idle_confirmation: default_idle_confirmation(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SteadyStateError {
    #[error("Unit in error state: {0}")]
    UnitError(String),

    #[error("Status query failed: {0}")]
    Bridge(#[from] BridgeError),
}

/// Classification of one status snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    Ready,
    Waiting(Vec<String>),
    Failed(String),
}

/// Poll `probe` until the cluster has been ready for `idle_confirmation`
pub async fn wait_for_steady_state(
    probe: &dyn StatusProbe,
    settings: &SteadyStateSettings,
) -> Result<(), SteadyStateError> {
    let mut ready_since: Option<Instant> = None;

    loop {
        let status = probe.status().await?;
        match assess(&status, probe).await? {
            Assessment::Failed(reason) => return Err(SteadyStateError::UnitError(reason)),
            Assessment::Waiting(reasons) => {
                debug!("Not steady: {}", reasons.join("; "));
                ready_since = None;
            }
            Assessment::Ready => {
                let since = *ready_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= settings.idle_confirmation {
                    info!(
                        "All units idle for {:?} ({})",
                        since.elapsed(),
                        unit_names(&status).join(", ")
                    );
                    return Ok(());
                }
            }
        }
        tokio::time::sleep(settings.poll_interval).await;
    }
}

/// Assess a status document, asking `probe` about leadership where needed
pub async fn assess(status: &Value, probe: &dyn StatusProbe) -> Result<Assessment, BridgeError> {
    match assess_units(status) {
        Assessment::Ready => {}
        other => return Ok(other),
    }

    let mut led = BTreeSet::new();
    let mut services = BTreeSet::new();
    for (unit, version) in agent_versions(status) {
        let service = unit.split('/').next().unwrap_or(unit.as_str()).to_string();
        services.insert(service.clone());
        if led.contains(&service) {
            continue;
        }
        let Some(version) = version else { continue };
        if version_at_least(&version, &LEADER_ELECTION_VERSION) || probe.is_leader(&unit).await? {
            debug!("{} is led by {}", service, unit);
            led.insert(service);
        }
    }

    let leaderless: Vec<String> = services
        .difference(&led)
        .map(|s| format!("{} does not have a leader", s))
        .collect();

    if leaderless.is_empty() {
        Ok(Assessment::Ready)
    } else {
        Ok(Assessment::Waiting(leaderless))
    }
}

/// Assess dying services and unit agent states (no leadership check)
pub fn assess_units(status: &Value) -> Assessment {
    let mut waiting = Vec::new();

    for (name, service) in services(status) {
        if is_dying(service) {
            waiting.push(format!("{} is dying", name));
        }
    }

    for (name, unit) in all_units(status) {
        if let Some(agent) = agent_status(unit) {
            let current = agent.get("current").and_then(Value::as_str).unwrap_or("");
            if current != "idle" {
                waiting.push(format!("{} is {}", name, current));
            }
            continue;
        }

        let state = unit.get("agent-state").and_then(Value::as_str).unwrap_or("");
        if is_dying(unit) {
            waiting.push(format!("{} is dying", name));
        } else if state == "error" {
            let info = unit
                .get("agent-state-info")
                .and_then(Value::as_str)
                .unwrap_or("no detail");
            return Assessment::Failed(format!("{} failed: {}", name, info));
        } else if state != "started" {
            waiting.push(format!("{} is {}", name, state));
        }
    }

    if waiting.is_empty() {
        Assessment::Ready
    } else {
        Assessment::Waiting(waiting)
    }
}

/// `services` (juju 1.x) or `applications` (juju 2.x)
fn services(status: &Value) -> BTreeMap<&str, &Value> {
    status
        .get("services")
        .or_else(|| status.get("applications"))
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.as_str(), v)).collect())
        .unwrap_or_default()
}

/// Every unit and subordinate, keyed by unit name
fn all_units(status: &Value) -> BTreeMap<&str, &Value> {
    let mut units = BTreeMap::new();
    for service in services(status).into_values() {
        for (name, unit) in object(service, "units") {
            units.insert(name.as_str(), unit);
            for (sub_name, sub) in object(unit, "subordinates") {
                units.insert(sub_name.as_str(), sub);
            }
        }
    }
    units
}

fn unit_names(status: &Value) -> Vec<&str> {
    all_units(status).keys().copied().collect()
}

fn agent_versions(status: &Value) -> Vec<(String, Option<String>)> {
    all_units(status)
        .into_iter()
        .map(|(name, unit)| {
            let version = unit
                .get("agent-version")
                .and_then(Value::as_str)
                .map(str::to_string);
            (name.to_string(), version)
        })
        .collect()
}

fn object<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = (&'a String, &'a Value)> {
    value
        .get(key)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::iter)
}

fn agent_status(unit: &Value) -> Option<&Value> {
    unit.get("agent-status").or_else(|| unit.get("juju-status"))
}

fn is_dying(value: &Value) -> bool {
    matches!(
        value.get("life").and_then(Value::as_str),
        Some("dying") | Some("dead")
    )
}

/// Compare dotted versions numerically ("1.25.3" >= [1, 23])
fn version_at_least(version: &str, minimum: &[u64]) -> bool {
    let parts: Vec<u64> = version
        .split(['.', '-'])
        .map_while(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect();
    parts.as_slice() >= minimum
}

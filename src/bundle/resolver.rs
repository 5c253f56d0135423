//! Inheritance resolution for bundle templates
//!
//! The `inherits` chain is walked explicitly from the requested template to its
//! root. Bodies are then merged root to leaf (child wins), and the collected
//! `overrides` are written into every service's `options`.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::template::{BundleSet, BundleTemplate};
use super::BundleError;

/// A fully merged bundle with no `inherits`/`overrides` markers left
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBundle {
    #[serde(skip)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    pub services: Mapping,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResolvedBundle {
    /// Render as a single-template bundle document keyed by the template name
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut doc = BTreeMap::new();
        doc.insert(self.name.as_str(), self);
        serde_yaml::to_string(&doc)
    }
}

/// Resolve `name` against `templates`
pub fn resolve(name: &str, templates: &BundleSet) -> Result<ResolvedBundle, BundleError> {
    let chain = inheritance_chain(name, templates)?;
    debug!(
        "Resolving bundle '{}' through {}",
        name,
        chain
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
            .join(" <- ")
    );

    let mut series = None;
    let mut services = Value::Mapping(Mapping::new());
    let mut extra: BTreeMap<String, Value> = BTreeMap::new();
    let mut overrides = Mapping::new();

    for (_, template) in chain.iter().rev() {
        if let Some(s) = &template.series {
            series = Some(s.clone());
        }
        merge_value(&mut services, &Value::Mapping(template.services.clone()));
        for (key, value) in &template.extra {
            match extra.get_mut(key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }
        for (key, value) in &template.overrides {
            overrides.insert(key.clone(), value.clone());
        }
    }

    let mut services = match services {
        Value::Mapping(map) => map,
        _ => Mapping::new(),
    };
    apply_overrides(name, &mut services, &overrides)?;

    Ok(ResolvedBundle {
        name: name.to_string(),
        series,
        services,
        extra,
    })
}

/// Collect `(name, template)` pairs from leaf to root, rejecting cycles
fn inheritance_chain<'a>(
    name: &str,
    templates: &'a BundleSet,
) -> Result<Vec<(String, &'a BundleTemplate)>, BundleError> {
    let mut chain: Vec<(String, &BundleTemplate)> = Vec::new();
    let mut visited = HashSet::new();
    let mut current = name.to_string();

    loop {
        if !visited.insert(current.clone()) {
            let mut path: Vec<String> = chain.iter().map(|(n, _)| n.clone()).collect();
            path.push(current);
            return Err(BundleError::Cycle(path));
        }

        let template = templates
            .get(&current)
            .ok_or_else(|| BundleError::UnknownTemplate {
                name: current.clone(),
                referenced_by: chain.last().map(|(n, _)| n.clone()),
            })?;

        let parent = template.inherits.clone();
        chain.push((current, template));

        match parent {
            Some(parent) => current = parent,
            None => return Ok(chain),
        }
    }
}

/// Merge `source` into `target`; mappings merge key by key, everything else is replaced
fn merge_value(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Mapping(target), Value::Mapping(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

fn apply_overrides(
    template: &str,
    services: &mut Mapping,
    overrides: &Mapping,
) -> Result<(), BundleError> {
    if overrides.is_empty() {
        return Ok(());
    }

    for (service_name, service) in services.iter_mut() {
        let service_key = service_name.as_str().unwrap_or("?").to_string();
        if service.is_null() {
            *service = Value::Mapping(Mapping::new());
        }
        let service = service.as_mapping_mut().ok_or_else(|| BundleError::NotAMapping {
            template: template.to_string(),
            key: format!("services.{}", service_key),
        })?;

        let has_options = service.get("options").is_some_and(|v| !v.is_null());
        if !has_options {
            service.insert(
                Value::String("options".to_string()),
                Value::Mapping(Mapping::new()),
            );
        }
        let options = service
            .get_mut("options")
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| BundleError::NotAMapping {
                template: template.to_string(),
                key: format!("services.{}.options", service_key),
            })?;

        for (key, value) in overrides {
            options.insert(key.clone(), value.clone());
        }
    }

    Ok(())
}

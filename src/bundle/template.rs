//! Bundle template documents
//!
//! A bundle file maps template names to topology documents:
//!
//! ```yaml
//! base:
//!   series: trusty
//!   services:
//!     ceph:
//!       charm: ceph
//!       num_units: 3
//! trusty-kilo:
//!   inherits: base
//!   overrides:
//!     source: cloud:trusty-kilo
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use super::BundleError;

/// One named template in a bundle file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleTemplate {
    /// Single parent template name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub services: Mapping,

    /// Service options applied to every service of the resolved bundle
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub overrides: Mapping,

    /// Any other top-level keys (relations, machines, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// All templates declared by one bundle document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleSet {
    templates: BTreeMap<String, BundleTemplate>,
}

impl BundleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(content: &str) -> Result<Self, BundleError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, file: &str) -> Result<Self, BundleError> {
        serde_yaml::from_str(content).map_err(|error| BundleError::Yaml {
            file: file.to_string(),
            error,
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, template: BundleTemplate) {
        self.templates.insert(name.into(), template);
    }

    pub fn get(&self, name: &str) -> Option<&BundleTemplate> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

pub struct BundleLoader;

impl BundleLoader {
    pub fn load_file(path: &Path) -> Result<BundleSet, BundleError> {
        let file = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|error| BundleError::Io {
            file: file.clone(),
            error,
        })?;
        BundleSet::parse(&content, &file)
    }
}

//! Bundle templates and inheritance resolution
//!
//! This module contains:
//! - `template` - BundleTemplate, BundleSet and file loading
//! - `resolver` - `inherits`/`overrides` resolution into a ResolvedBundle

pub mod resolver;
pub mod template;

pub use resolver::{resolve, ResolvedBundle};
pub use template::{BundleLoader, BundleSet, BundleTemplate};

/// Errors that can occur while loading or resolving bundle templates
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Unknown bundle template '{name}'{}", referenced_by_suffix(.referenced_by))]
    UnknownTemplate {
        name: String,
        referenced_by: Option<String>,
    },

    #[error("Inheritance cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("'{key}' in template '{template}' must be a mapping")]
    NotAMapping { template: String, key: String },

    #[error("IO error reading {file}: {error}")]
    Io {
        file: String,
        error: std::io::Error,
    },

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(child) => format!(" (inherited by '{}')", child),
        None => String::new(),
    }
}

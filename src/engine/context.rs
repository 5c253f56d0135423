//! Run context shared with every handler
//!
//! Created once per run and read-only during execution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundle::{resolve, BundleError, BundleLoader, ResolvedBundle};
use crate::engine::registry::StepRegistry;

#[derive(Debug, Clone)]
pub struct RunContext {
    /// Run ID
    pub run_id: String,

    /// Environment used for variable expansion and exported to scripts
    env: Arc<HashMap<String, String>>,

    registry: Arc<StepRegistry>,

    /// Directory that `config=` resource names resolve against
    workspace: PathBuf,
}

impl RunContext {
    /// Create a new context with a generated run ID
    pub fn new(env: HashMap<String, String>, registry: StepRegistry) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            env: Arc::new(env),
            registry: Arc::new(registry),
            workspace: PathBuf::from("."),
        }
    }

    pub fn with_workspace(mut self, workspace: impl AsRef<Path>) -> Self {
        self.workspace = workspace.as_ref().to_path_buf();
        self
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Path of a `config=` resource inside the workspace
    pub fn resource_path(&self, config: &str) -> PathBuf {
        self.workspace.join(config)
    }

    /// Load bundle file `config` from the workspace and resolve `target`
    pub fn resolve_bundle(&self, config: &str, target: &str) -> Result<ResolvedBundle, BundleError> {
        let templates = BundleLoader::load_file(&self.resource_path(config))?;
        resolve(target, &templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_new_context() {
        let ctx = RunContext::new(HashMap::new(), StepRegistry::new());
        assert!(!ctx.run_id.is_empty());
        assert_eq!(ctx.workspace(), Path::new("."));
    }

    #[test]
    fn test_env_lookup() {
        let mut env = HashMap::new();
        env.insert("MOJO_SERIES".to_string(), "trusty".to_string());
        let ctx = RunContext::new(env, StepRegistry::new());

        assert_eq!(ctx.get_env("MOJO_SERIES"), Some(&"trusty".to_string()));
        assert_eq!(ctx.get_env("MISSING"), None);
    }

    #[test]
    fn test_resolve_bundle_from_workspace() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("keystone.yaml"),
            "base:\n  services:\n    keystone: {}\nkilo:\n  inherits: base\n  overrides:\n    source: cloud:trusty-kilo\n",
        )
        .unwrap();

        let ctx = RunContext::new(HashMap::new(), StepRegistry::new()).with_workspace(dir.path());
        let bundle = ctx.resolve_bundle("keystone.yaml", "kilo").unwrap();
        assert!(bundle.services.contains_key("keystone"));

        let err = ctx.resolve_bundle("keystone.yaml", "liberty").unwrap_err();
        assert!(matches!(err, BundleError::UnknownTemplate { .. }));
    }
}

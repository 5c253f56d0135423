//! Step registry - maps step kinds to handlers
//!
//! Handlers are the seam across which provisioning, verification and
//! scripting live. The engine only knows the `StepHandler` interface.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::context::RunContext;
use crate::engine::error::{HandlerError, RegistrationError, StepError, ValidationError};
use crate::engine::handlers::{CollectHandler, DeployHandler, ScriptHandler};
use crate::manifest::{Manifest, RunnerConfig, StepArgs, StepKind};

/// What a handler reports on success
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub message: Option<String>,
    pub outputs: HashMap<String, String>,
}

impl StepOutcome {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            outputs: HashMap::new(),
        }
    }
}

/// Capability implementing one step kind
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(
        &self,
        config: &str,
        args: &StepArgs,
        ctx: &RunContext,
    ) -> Result<StepOutcome, HandlerError>;
}

#[derive(Default)]
pub struct StepRegistry {
    handlers: HashMap<StepKind, Arc<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the command-backed handlers for every step kind
    pub fn with_builtin_handlers(config: &RunnerConfig) -> Self {
        let mut registry = Self::new();
        let handlers: [(StepKind, Arc<dyn StepHandler>); 4] = [
            (
                StepKind::Collect,
                Arc::new(CollectHandler::new(config.commands.collect.clone())),
            ),
            (StepKind::Deploy, Arc::new(DeployHandler::from_config(config))),
            (StepKind::Verify, Arc::new(ScriptHandler::new())),
            (StepKind::Script, Arc::new(ScriptHandler::new())),
        ];
        for (kind, handler) in handlers {
            registry.handlers.insert(kind, handler);
        }
        registry
    }

    pub fn register(
        &mut self,
        kind: StepKind,
        handler: impl StepHandler + 'static,
    ) -> Result<(), RegistrationError> {
        self.register_arc(kind, Arc::new(handler))
    }

    pub fn register_arc(
        &mut self,
        kind: StepKind,
        handler: Arc<dyn StepHandler>,
    ) -> Result<(), RegistrationError> {
        if self.handlers.contains_key(&kind) {
            return Err(RegistrationError::Duplicate(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn get(&self, kind: StepKind) -> Result<Arc<dyn StepHandler>, StepError> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or(StepError::UnknownStepKind(kind))
    }

    pub fn contains(&self, kind: StepKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Check that every step of `manifest` has a handler
    pub fn validate(&self, manifest: &Manifest) -> Result<(), ValidationError> {
        match manifest.iter().find(|step| !self.contains(step.kind)) {
            Some(step) => Err(ValidationError {
                line: step.line,
                kind: step.kind,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Step, StepKind};

    struct Noop;

    #[async_trait]
    impl StepHandler for Noop {
        async fn execute(
            &self,
            _config: &str,
            _args: &StepArgs,
            _ctx: &RunContext,
        ) -> Result<StepOutcome, HandlerError> {
            Ok(StepOutcome::default())
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = StepRegistry::new();
        registry.register(StepKind::Verify, Noop).unwrap();
        let err = registry.register(StepKind::Verify, Noop).unwrap_err();
        assert_eq!(err, RegistrationError::Duplicate(StepKind::Verify));
    }

    #[test]
    fn test_unknown_kind_lookup() {
        let registry = StepRegistry::new();
        let err = registry.get(StepKind::Deploy).err().unwrap();
        assert!(matches!(err, StepError::UnknownStepKind(StepKind::Deploy)));
    }

    #[test]
    fn test_builtin_handlers_cover_every_kind() {
        let registry = StepRegistry::with_builtin_handlers(&RunnerConfig::default());
        assert_eq!(registry.kinds(), StepKind::ALL.to_vec());
    }

    #[test]
    fn test_validate_manifest() {
        let mut registry = StepRegistry::new();
        registry.register(StepKind::Verify, Noop).unwrap();

        let mut deploy = Step::new(StepKind::Deploy, "bundle.yaml");
        deploy.line = 3;
        let manifest = Manifest {
            name: "m".to_string(),
            steps: vec![Step::new(StepKind::Verify, "check_juju.py"), deploy],
        };

        let err = registry.validate(&manifest).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, StepKind::Deploy);
    }
}

//! Feature registry
//!
//! Table of known feature classes keyed by short name. Owned by the host and
//! passed around explicitly; additive-only for the lifetime of a session.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::feature::{FeatureClass, FeatureInstance};
use crate::param::SchemaError;

/// Registry-related errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("Feature already registered: {0}")]
    DuplicateFeature(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Invalid feature schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// What a host exposes to plugin setup code
pub trait HostSurface {
    /// Make a feature class available to histories
    fn register_feature(&mut self, class: Arc<dyn FeatureClass>) -> RegistryResult<()>;
}

/// Table of registered feature classes
#[derive(Default)]
pub struct FeatureRegistry {
    classes: HashMap<String, Arc<dyn FeatureClass>>,
    order: Vec<String>,
}

impl FeatureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in primitives
    pub fn with_builtins() -> RegistryResult<Self> {
        let mut registry = Self::new();
        crate::plugins::install(&mut registry)?;
        Ok(registry)
    }

    /// Register a class; a taken short name fails and the first class is kept
    pub fn register(&mut self, class: Arc<dyn FeatureClass>) -> RegistryResult<()> {
        let short_name = class.short_name().to_owned();
        if self.classes.contains_key(&short_name) {
            tracing::warn!(feature = %short_name, "Rejected duplicate feature registration");
            return Err(RegistryError::DuplicateFeature(short_name));
        }

        tracing::info!(feature = %short_name, name = %class.name(), "Registered feature");
        self.order.push(short_name.clone());
        self.classes.insert(short_name, class);
        Ok(())
    }

    /// Look up a class by short name
    pub fn lookup(&self, short_name: &str) -> Option<Arc<dyn FeatureClass>> {
        self.classes.get(short_name).cloned()
    }

    /// Create an unbound instance of a registered class
    pub fn instantiate(&self, short_name: &str) -> RegistryResult<FeatureInstance> {
        self.lookup(short_name)
            .map(FeatureInstance::new)
            .ok_or_else(|| RegistryError::UnknownFeature(short_name.to_owned()))
    }

    /// Registered classes in registration order
    pub fn classes(&self) -> impl Iterator<Item = &Arc<dyn FeatureClass>> {
        self.order.iter().filter_map(|name| self.classes.get(name))
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl HostSurface for FeatureRegistry {
    fn register_feature(&mut self, class: Arc<dyn FeatureClass>) -> RegistryResult<()> {
        self.register(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeaturePlugin, FeatureResult, LifecycleState, RunContext};
    use crate::merge::SolidSet;
    use crate::param::ParameterSchema;
    use async_trait::async_trait;

    struct Named {
        short_name: &'static str,
        name: &'static str,
        schema: ParameterSchema,
    }

    struct Noop;

    #[async_trait]
    impl FeaturePlugin for Noop {
        async fn run(&mut self, _ctx: &RunContext<'_>, solids: SolidSet) -> FeatureResult<SolidSet> {
            Ok(solids)
        }
    }

    impl FeatureClass for Named {
        fn short_name(&self) -> &str {
            self.short_name
        }

        fn name(&self) -> &str {
            self.name
        }

        fn schema(&self) -> &ParameterSchema {
            &self.schema
        }

        fn instantiate(&self) -> Box<dyn FeaturePlugin> {
            Box::new(Noop)
        }
    }

    fn named(short_name: &'static str, name: &'static str) -> Arc<dyn FeatureClass> {
        Arc::new(Named {
            short_name,
            name,
            schema: ParameterSchema::default(),
        })
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut registry = FeatureRegistry::new();
        registry.register(named("X", "First")).unwrap();

        let err = registry.register(named("X", "Second")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateFeature("X".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("X").unwrap().name(), "First");
    }

    #[test]
    fn test_lookup_missing() {
        let registry = FeatureRegistry::new();
        assert!(registry.lookup("nope").is_none());
        assert!(matches!(
            registry.instantiate("nope"),
            Err(RegistryError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_builtins_in_order() {
        let registry = FeatureRegistry::with_builtins().unwrap();
        let names: Vec<_> = registry.classes().map(|c| c.short_name().to_owned()).collect();
        assert_eq!(names, vec!["P.S", "P.CU", "P.CY"]);

        let instance = registry.instantiate("P.S").unwrap();
        assert_eq!(instance.state(), LifecycleState::Created);
    }

    #[test]
    fn test_installing_builtins_twice_fails() {
        let mut registry = FeatureRegistry::with_builtins().unwrap();
        assert!(crate::plugins::install(&mut registry).is_err());
        assert_eq!(registry.len(), 3);
    }
}

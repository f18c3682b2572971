//! Feature Plugins
//!
//! A feature plugin is split in two:
//! - [`FeatureClass`]: class-level identity (short name, display name,
//!   schema) and a factory for instances
//! - [`FeaturePlugin`]: one instance per history node, executed once per
//!   evaluation pass
//!
//! [`FeatureInstance`] is the host-side wrapper that drives an instance
//! through its lifecycle.

mod context;
mod instance;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::kernel::KernelError;
use crate::merge::{MergeError, SolidSet};
use crate::param::{ParameterSchema, SchemaBindingError};

pub use context::RunContext;
pub use instance::{FeatureInstance, LifecycleState};

/// Feature-related errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Parameter binding failed: {0}")]
    Binding(#[from] SchemaBindingError),

    #[error("Geometry kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Boolean merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// What was wrong with it
        reason: String,
    },

    #[error("Invalid lifecycle transition: {0}")]
    Lifecycle(String),

    #[error("Feature panicked: {0}")]
    Panicked(String),

    #[error("Evaluation cancelled")]
    Cancelled,
}

impl FeatureError {
    /// Check if this error is a boolean target that could not be resolved
    pub fn is_unresolved_target(&self) -> bool {
        matches!(self, FeatureError::Merge(MergeError::UnresolvedTarget(_)))
    }
}

/// Result type for feature operations
pub type FeatureResult<T> = Result<T, FeatureError>;

/// Opaque per-instance cache a plugin may keep across re-evaluations
///
/// Owned by the plugin instance; the host never reads or writes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistentData {
    entries: HashMap<String, Value>,
}

impl PersistentData {
    /// Get a cached value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Store a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Remove a cached value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Class-level identity of a feature plugin
///
/// Registered once with the [`FeatureRegistry`](crate::registry::FeatureRegistry);
/// the schema must not change after registration.
pub trait FeatureClass: Send + Sync {
    /// Unique abbreviation, used as the registry key and id prefix
    fn short_name(&self) -> &str;

    /// Display label
    fn name(&self) -> &str;

    /// Declared inputs
    fn schema(&self) -> &ParameterSchema;

    /// Create a fresh instance for one history node
    fn instantiate(&self) -> Box<dyn FeaturePlugin>;
}

/// A feature instance bound to one history node
#[async_trait]
pub trait FeaturePlugin: Send {
    /// Execute the feature against the accumulated solids
    ///
    /// Receives a working copy of the history's solids and returns the
    /// updated set. The copy must not be retained after the call returns.
    async fn run(&mut self, ctx: &RunContext<'_>, solids: SolidSet) -> FeatureResult<SolidSet>;
}

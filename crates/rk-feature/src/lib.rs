//! Feature Plugins and Parametric History
//!
//! This crate provides:
//! - Schema-driven parameters with typed defaults and override binding
//! - The feature plugin contract (class identity, schema, async entry point)
//! - An injected geometry kernel interface plus an in-memory kernel
//! - Boolean merging of new solids into the accumulated solid set
//! - A sequential, replayable part history with rollback and suppression

pub mod cancel;
pub mod config;
pub mod feature;
pub mod history;
pub mod kernel;
pub mod merge;
pub mod param;
pub mod plugins;
pub mod registry;

// Re-exports for convenience
pub use cancel::CancellationToken;
pub use config::{ConfigError, EvaluationConfig, UnresolvedTargetPolicy};
pub use feature::{
    FeatureClass, FeatureError, FeatureInstance, FeaturePlugin, FeatureResult, LifecycleState,
    PersistentData, RunContext,
};
pub use history::{
    EvaluationReport, HistoryEntry, HistoryError, HistoryResult, NodeStatus, PartHistory,
    StepRecord,
};
pub use kernel::{
    BooleanType, GeometryKernel, KernelError, KernelResult, MemoryKernel, NullKernel,
    PrimitiveKind, PrimitiveSpec, Solid,
};
pub use merge::{MergeError, MergeResult, SolidSet, apply_boolean_operation};
pub use param::{
    BooleanOperation, BooleanOperationSpec, BoundParameters, Overrides, ParameterDefinition,
    ParameterSchema, ParameterType, ParameterValue, SchemaBindingError, SchemaError, Transform,
    bind, bind_defaults,
};
pub use plugins::PrimitiveFeatureClass;
pub use registry::{FeatureRegistry, HostSurface, RegistryError, RegistryResult};

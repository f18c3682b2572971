//! Schema-driven parameter system
//!
//! - [`ParameterSchema`]: declared inputs of a feature class
//! - [`bind`]: schema + overrides -> [`BoundParameters`]
//! - [`ParameterValue`]: closed tagged union of parameter values

mod binder;
mod schema;
mod value;

pub use binder::{BoundParameters, Overrides, SchemaBindingError, bind, bind_defaults};
pub use schema::{ParameterDefinition, ParameterSchema, SchemaError, SchemaResult};
pub use value::{BooleanOperation, BooleanOperationSpec, ParameterType, ParameterValue, Transform};

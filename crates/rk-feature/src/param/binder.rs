//! Parameter binding
//!
//! Resolves a schema plus a partial set of user overrides into a complete,
//! typed [`BoundParameters`].

use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::ParameterSchema;
use super::value::{BooleanOperationSpec, ParameterType, ParameterValue, Transform, json_kind};

/// User-supplied parameter values, keyed by parameter name
pub type Overrides = Map<String, Value>;

/// An override did not fit its declared parameter type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaBindingError {
    #[error("Parameter '{parameter}' expects {expected}, found {found}")]
    TypeMismatch {
        /// Parameter name
        parameter: String,
        /// Declared type
        expected: ParameterType,
        /// Shape of the supplied value
        found: &'static str,
    },

    #[error("Parameter '{parameter}' has invalid field '{field}': {reason}")]
    InvalidField {
        /// Parameter name
        parameter: String,
        /// Sub-field of a structured value
        field: String,
        /// What was wrong with it
        reason: String,
    },
}

impl SchemaBindingError {
    pub(crate) fn type_mismatch(parameter: &str, expected: ParameterType, value: &Value) -> Self {
        Self::TypeMismatch {
            parameter: parameter.to_owned(),
            expected,
            found: json_kind(value),
        }
    }

    pub(crate) fn invalid_field(parameter: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            parameter: parameter.to_owned(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// Name of the parameter that failed to bind
    pub fn parameter(&self) -> &str {
        match self {
            Self::TypeMismatch { parameter, .. } | Self::InvalidField { parameter, .. } => parameter,
        }
    }
}

/// Concrete parameter values for one feature instance
///
/// Holds exactly one value per schema entry, in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundParameters {
    values: Vec<(String, ParameterValue)>,
}

impl BoundParameters {
    /// Number of bound parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no parameters
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by parameter name
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a mutable value by parameter name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParameterValue> {
        self.values.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Check if a parameter is bound
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a numeric parameter
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParameterValue::as_number)
    }

    /// Get a text parameter
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParameterValue::as_str)
    }

    /// Get a flag parameter
    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParameterValue::as_bool)
    }

    /// Get a transform parameter
    pub fn transform(&self, name: &str) -> Option<&Transform> {
        self.get(name).and_then(ParameterValue::as_transform)
    }

    /// Get a boolean merge parameter
    pub fn boolean_operation(&self, name: &str) -> Option<&BooleanOperationSpec> {
        self.get(name).and_then(ParameterValue::as_boolean_operation)
    }

    /// Iterate over `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Convert back into the override shape, e.g. for saving a node
    pub fn to_overrides(&self) -> Overrides {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// Bind overrides on top of a schema's defaults
///
/// Unknown override keys are ignored so older project files stay loadable.
/// A `null` override counts as not supplied.
pub fn bind(schema: &ParameterSchema, overrides: &Overrides) -> Result<BoundParameters, SchemaBindingError> {
    let mut values = Vec::with_capacity(schema.len());

    for definition in schema.iter() {
        let value = match overrides.get(&definition.name).filter(|v| !v.is_null()) {
            Some(raw) => ParameterValue::from_json(&definition.name, definition.ty, raw)?,
            None => definition.default_value.clone(),
        };
        values.push((definition.name.clone(), value));
    }

    for key in overrides.keys().filter(|k| !schema.contains(k)) {
        tracing::debug!(parameter = %key, "Ignoring override with no schema entry");
    }

    Ok(BoundParameters { values })
}

/// Bind a schema's defaults with no overrides
pub fn bind_defaults(schema: &ParameterSchema) -> BoundParameters {
    BoundParameters {
        values: schema
            .iter()
            .map(|d| (d.name.clone(), d.default_value.clone()))
            .collect(),
    }
}

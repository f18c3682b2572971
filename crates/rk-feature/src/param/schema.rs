//! Parameter schemas
//!
//! A schema is the declarative description of a feature's inputs. It is
//! validated once, when the feature class is defined, and is immutable
//! afterwards.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use super::binder::SchemaBindingError;
use super::value::{BooleanOperationSpec, ParameterType, ParameterValue, Transform};

/// Schema definition errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("Default for '{parameter}' does not satisfy type {expected}")]
    InvalidDefault {
        /// Parameter name
        parameter: String,
        /// Declared type
        expected: ParameterType,
    },

    #[error("Malformed default value: {0}")]
    MalformedDefault(#[from] SchemaBindingError),
}

/// Result type for schema construction
pub type SchemaResult<T> = Result<T, SchemaError>;

/// One entry of a parameter schema
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    /// Unique key within the schema
    pub name: String,
    /// Declared semantic type
    pub ty: ParameterType,
    /// Value used when no override is supplied
    pub default_value: ParameterValue,
    /// Human-readable description, no semantic effect
    pub hint: String,
}

impl ParameterDefinition {
    /// Create a definition with an explicit type
    pub fn new(
        name: impl Into<String>,
        ty: ParameterType,
        default_value: ParameterValue,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value,
            hint: hint.into(),
        }
    }

    /// Create a text parameter
    pub fn string(name: impl Into<String>, default: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String, ParameterValue::String(default.into()), hint)
    }

    /// Create a numeric parameter
    pub fn number(name: impl Into<String>, default: f64, hint: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Number, ParameterValue::Number(default), hint)
    }

    /// Create a flag parameter
    pub fn boolean(name: impl Into<String>, default: bool, hint: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Boolean, ParameterValue::Boolean(default), hint)
    }

    /// Create a transform parameter
    pub fn transform(name: impl Into<String>, default: Transform, hint: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Transform, ParameterValue::Transform(default), hint)
    }

    /// Create a boolean merge parameter
    pub fn boolean_operation(
        name: impl Into<String>,
        default: BooleanOperationSpec,
        hint: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ParameterType::BooleanOperation,
            ParameterValue::BooleanOperation(default),
            hint,
        )
    }
}

/// Ordered mapping from parameter name to definition
///
/// Order is display order only; all lookups go by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSchema {
    definitions: Vec<ParameterDefinition>,
}

impl ParameterSchema {
    /// Build a schema, validating names and defaults
    pub fn new(definitions: Vec<ParameterDefinition>) -> SchemaResult<Self> {
        for (i, definition) in definitions.iter().enumerate() {
            if definitions[..i].iter().any(|d| d.name == definition.name) {
                return Err(SchemaError::DuplicateParameter(definition.name.clone()));
            }
            if !definition.default_value.satisfies(definition.ty) {
                return Err(SchemaError::InvalidDefault {
                    parameter: definition.name.clone(),
                    expected: definition.ty,
                });
            }
        }
        Ok(Self { definitions })
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the schema declares no parameters
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Get a definition by name
    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Check if a parameter is declared
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over definitions in display order
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.iter()
    }

    /// Parameter names in display order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    /// Serialize to the external `name -> {type, default_value, hint}` mapping
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .definitions
            .iter()
            .map(|d| {
                let entry = serde_json::json!({
                    "type": d.ty,
                    "default_value": d.default_value.to_json(),
                    "hint": d.hint,
                });
                (d.name.clone(), entry)
            })
            .collect();
        Value::Object(map)
    }

    /// Parse the external mapping format
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

/// Serialized form of a single definition
#[derive(Serialize, Deserialize)]
struct DefinitionData {
    #[serde(rename = "type")]
    ty: ParameterType,
    default_value: Value,
    #[serde(default)]
    hint: String,
}

impl Serialize for ParameterSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.definitions.iter().map(|d| {
            (
                &d.name,
                DefinitionData {
                    ty: d.ty,
                    default_value: d.default_value.to_json(),
                    hint: d.hint.clone(),
                },
            )
        }))
    }
}

impl<'de> Deserialize<'de> for ParameterSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = Map::<String, Value>::deserialize(deserializer)?;
        let mut definitions = Vec::with_capacity(data.len());
        for (name, raw) in data {
            let entry = DefinitionData::deserialize(raw).map_err(D::Error::custom)?;
            let default_value = ParameterValue::from_json(&name, entry.ty, &entry.default_value)
                .map_err(|e| D::Error::custom(SchemaError::from(e)))?;
            definitions.push(ParameterDefinition::new(name, entry.ty, default_value, entry.hint));
        }
        ParameterSchema::new(definitions).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ParameterSchema::new(vec![
            ParameterDefinition::number("radius", 1.0, ""),
            ParameterDefinition::number("radius", 2.0, ""),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateParameter("radius".into()));
    }

    #[test]
    fn test_mistyped_default_rejected() {
        let err = ParameterSchema::new(vec![ParameterDefinition::new(
            "radius",
            ParameterType::Number,
            ParameterValue::String("five".into()),
            "",
        )])
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));

        let err = ParameterSchema::new(vec![ParameterDefinition::number("radius", f64::NAN, "")]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn test_serialized_format_preserves_order() {
        let schema = ParameterSchema::new(vec![
            ParameterDefinition::number("radius", 5.0, "Radius of the sphere"),
            ParameterDefinition::boolean("hollow", false, ""),
            ParameterDefinition::transform("transform", Transform::IDENTITY, ""),
        ])
        .unwrap();

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value, schema.to_json());
        assert_eq!(value["radius"]["type"], json!("number"));
        assert_eq!(value["transform"]["default_value"]["scale"], json!([1.0, 1.0, 1.0]));

        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["radius", "hollow", "transform"]);

        let parsed = ParameterSchema::from_json(&value).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_parse_partial_structured_default() {
        let value = json!({
            "boolean": { "type": "boolean_operation", "default_value": { "operation": "NONE" } },
        });
        let schema = ParameterSchema::from_json(&value).unwrap();
        let def = schema.get("boolean").unwrap();
        assert_eq!(def.default_value, ParameterValue::BooleanOperation(BooleanOperationSpec::default()));
        assert_eq!(def.hint, "");
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let value = json!({ "color": { "type": "color", "default_value": "#fff" } });
        assert!(ParameterSchema::from_json(&value).is_err());
    }
}

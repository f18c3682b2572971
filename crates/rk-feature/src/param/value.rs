//! Typed parameter values
//!
//! Every parameter carries one of a closed set of semantic types. Raw values
//! coming from project files or UI widgets are JSON-shaped; they are checked
//! against the declared type here and never travel further untyped.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::binder::SchemaBindingError;
use crate::kernel::BooleanType;

/// Semantic type of a parameter
///
/// The serialized names are part of the saved-project format and may only
/// ever be added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ParameterType {
    /// Free text
    String,
    /// A finite floating point number
    Number,
    /// True / false
    Boolean,
    /// Position, rotation and scale
    Transform,
    /// Boolean merge request against existing solids
    BooleanOperation,
}

impl ParameterType {
    /// Serialized name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Transform => "transform",
            ParameterType::BooleanOperation => "boolean_operation",
        }
    }

    /// Canonical default of the type itself, used to fill missing sub-fields
    pub fn canonical_default(&self) -> ParameterValue {
        match self {
            ParameterType::String => ParameterValue::String(String::new()),
            ParameterType::Number => ParameterValue::Number(0.0),
            ParameterType::Boolean => ParameterValue::Boolean(false),
            ParameterType::Transform => ParameterValue::Transform(Transform::IDENTITY),
            ParameterType::BooleanOperation => {
                ParameterValue::BooleanOperation(BooleanOperationSpec::default())
            }
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position, Euler rotation and scale applied to a freshly built solid
///
/// Components are stored as `f32`, so a value read back through
/// [`ParameterValue::to_json`] carries `f32` precision (`0.1` comes back as
/// `0.10000000149011612`). Binding that output again is stable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    /// Translation
    pub position: Vec3,
    /// Euler rotation (XYZ order, radians)
    pub rotation_euler: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation_euler: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    fn to_json(self) -> Value {
        json!({
            "position": vec3_to_json(self.position),
            "rotationEuler": vec3_to_json(self.rotation_euler),
            "scale": vec3_to_json(self.scale),
        })
    }

    /// Replace the fields present in a possibly partial transform object
    fn overlay(self, parameter: &str, value: &Value) -> Result<Self, SchemaBindingError> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaBindingError::type_mismatch(parameter, ParameterType::Transform, value))?;

        let mut transform = self;
        if let Some(v) = present(object, "position") {
            transform.position = vec3_from_json(parameter, "position", v)?;
        }
        if let Some(v) = present(object, "rotationEuler") {
            transform.rotation_euler = vec3_from_json(parameter, "rotationEuler", v)?;
        }
        if let Some(v) = present(object, "scale") {
            transform.scale = vec3_from_json(parameter, "scale", v)?;
        }
        Ok(transform)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Boolean operation requested by a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOperation {
    /// The produced solid stands alone
    #[default]
    None,
    /// Add to the targets
    Union,
    /// Cut the targets away
    Subtract,
    /// Keep only the common volume
    Intersect,
}

impl BooleanOperation {
    /// Serialized name of this operation
    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanOperation::None => "NONE",
            BooleanOperation::Union => "UNION",
            BooleanOperation::Subtract => "SUBTRACT",
            BooleanOperation::Intersect => "INTERSECT",
        }
    }

    /// Parse an operation name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Some(BooleanOperation::None),
            "UNION" => Some(BooleanOperation::Union),
            "SUBTRACT" => Some(BooleanOperation::Subtract),
            "INTERSECT" => Some(BooleanOperation::Intersect),
            _ => None,
        }
    }
}

impl From<BooleanOperation> for Option<BooleanType> {
    fn from(op: BooleanOperation) -> Self {
        match op {
            BooleanOperation::None => None,
            BooleanOperation::Union => Some(BooleanType::Union),
            BooleanOperation::Subtract => Some(BooleanType::Subtract),
            BooleanOperation::Intersect => Some(BooleanType::Intersect),
        }
    }
}

impl fmt::Display for BooleanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which solids a feature merges into, and how
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BooleanOperationSpec {
    /// Identifiers of the solids to merge with, in application order
    pub targets: Vec<String>,
    /// Operation to apply
    pub operation: BooleanOperation,
}

impl BooleanOperationSpec {
    /// Create a merge request
    pub fn new(operation: BooleanOperation, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            operation,
        }
    }

    /// Whether this spec asks for a geometric merge at all
    pub fn is_merge(&self) -> bool {
        self.operation != BooleanOperation::None && !self.targets.is_empty()
    }

    fn to_json(&self) -> Value {
        json!({
            "targets": self.targets,
            "operation": self.operation.as_str(),
        })
    }

    /// Replace the fields present in a possibly partial boolean operation object
    fn overlay(self, parameter: &str, value: &Value) -> Result<Self, SchemaBindingError> {
        let object = value.as_object().ok_or_else(|| {
            SchemaBindingError::type_mismatch(parameter, ParameterType::BooleanOperation, value)
        })?;

        let mut spec = self;
        if let Some(v) = present(object, "targets") {
            let items = v.as_array().ok_or_else(|| {
                SchemaBindingError::invalid_field(parameter, "targets", "expected an array of solid identifiers")
            })?;
            spec.targets = items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        SchemaBindingError::invalid_field(
                            parameter,
                            "targets",
                            format!("expected a solid identifier, found {}", json_kind(item)),
                        )
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = present(object, "operation") {
            let name = v.as_str().ok_or_else(|| {
                SchemaBindingError::invalid_field(parameter, "operation", "expected an operation name")
            })?;
            spec.operation = BooleanOperation::parse(name).ok_or_else(|| {
                SchemaBindingError::invalid_field(
                    parameter,
                    "operation",
                    format!("unknown operation '{name}'"),
                )
            })?;
        }
        Ok(spec)
    }
}

/// A concrete, type-checked parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Text value
    String(String),
    /// Numeric value
    Number(f64),
    /// Flag value
    Boolean(bool),
    /// Transform value
    Transform(Transform),
    /// Boolean merge value
    BooleanOperation(BooleanOperationSpec),
}

impl ParameterValue {
    /// The semantic type this value satisfies
    pub fn value_type(&self) -> ParameterType {
        match self {
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::Number(_) => ParameterType::Number,
            ParameterValue::Boolean(_) => ParameterType::Boolean,
            ParameterValue::Transform(_) => ParameterType::Transform,
            ParameterValue::BooleanOperation(_) => ParameterType::BooleanOperation,
        }
    }

    /// Whether this value is well formed for the declared type
    pub fn satisfies(&self, ty: ParameterType) -> bool {
        match self {
            ParameterValue::Number(n) => ty == ParameterType::Number && n.is_finite(),
            ParameterValue::Transform(t) => {
                ty == ParameterType::Transform
                    && t.position.is_finite()
                    && t.rotation_euler.is_finite()
                    && t.scale.is_finite()
            }
            other => other.value_type() == ty,
        }
    }

    /// Get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the value as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a flag
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as a transform
    pub fn as_transform(&self) -> Option<&Transform> {
        match self {
            ParameterValue::Transform(t) => Some(t),
            _ => None,
        }
    }

    /// Get the value as a boolean merge request
    pub fn as_boolean_operation(&self) -> Option<&BooleanOperationSpec> {
        match self {
            ParameterValue::BooleanOperation(spec) => Some(spec),
            _ => None,
        }
    }

    /// Convert to the JSON shape used in overrides and saved schemas
    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::String(s) => Value::String(s.clone()),
            ParameterValue::Number(n) => Value::from(*n),
            ParameterValue::Boolean(b) => Value::Bool(*b),
            ParameterValue::Transform(t) => t.to_json(),
            ParameterValue::BooleanOperation(spec) => spec.to_json(),
        }
    }

    /// Check a raw JSON value against a declared type
    ///
    /// Structured values start from the type's canonical default and take
    /// only the sub-fields that are present.
    pub fn from_json(
        parameter: &str,
        ty: ParameterType,
        value: &Value,
    ) -> Result<Self, SchemaBindingError> {
        let mismatch = || SchemaBindingError::type_mismatch(parameter, ty, value);
        match ty.canonical_default() {
            ParameterValue::String(_) => value
                .as_str()
                .map(|s| ParameterValue::String(s.to_owned()))
                .ok_or_else(mismatch),
            ParameterValue::Number(_) => value
                .as_f64()
                .filter(|n| n.is_finite())
                .map(ParameterValue::Number)
                .ok_or_else(mismatch),
            ParameterValue::Boolean(_) => value
                .as_bool()
                .map(ParameterValue::Boolean)
                .ok_or_else(mismatch),
            ParameterValue::Transform(base) => {
                base.overlay(parameter, value).map(ParameterValue::Transform)
            }
            ParameterValue::BooleanOperation(base) => {
                base.overlay(parameter, value).map(ParameterValue::BooleanOperation)
            }
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(n: f64) -> Self {
        ParameterValue::Number(n)
    }
}

impl From<bool> for ParameterValue {
    fn from(b: bool) -> Self {
        ParameterValue::Boolean(b)
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::String(s.to_owned())
    }
}

impl From<Transform> for ParameterValue {
    fn from(t: Transform) -> Self {
        ParameterValue::Transform(t)
    }
}

impl From<BooleanOperationSpec> for ParameterValue {
    fn from(spec: BooleanOperationSpec) -> Self {
        ParameterValue::BooleanOperation(spec)
    }
}

/// Name of a JSON value's shape, for error messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Sub-field lookup treating `null` as absent
fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn vec3_to_json(v: Vec3) -> Value {
    json!([v.x, v.y, v.z])
}

fn vec3_from_json(parameter: &str, field: &str, value: &Value) -> Result<Vec3, SchemaBindingError> {
    let invalid = || SchemaBindingError::invalid_field(parameter, field, "expected an array of 3 numbers");
    let items = value.as_array().filter(|a| a.len() == 3).ok_or_else(invalid)?;
    let mut out = [0.0f32; 3];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(invalid)? as f32;
    }
    let v = Vec3::from_array(out);
    if !v.is_finite() {
        return Err(invalid());
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partial_transform_fills_identity() {
        let value = json!({ "position": [1.0, 2.0, 3.0] });
        let parsed = ParameterValue::from_json("transform", ParameterType::Transform, &value).unwrap();
        let t = parsed.as_transform().unwrap();

        assert_relative_eq!(t.position.y, 2.0);
        assert_eq!(t.rotation_euler, Vec3::ZERO);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn test_partial_boolean_operation_fills_canonical_default() {
        let value = json!({ "targets": ["P.CU1"] });
        let parsed =
            ParameterValue::from_json("boolean", ParameterType::BooleanOperation, &value).unwrap();
        let spec = parsed.as_boolean_operation().unwrap();
        assert_eq!(spec.targets, vec!["P.CU1".to_string()]);
        assert_eq!(spec.operation, BooleanOperation::None);
    }

    #[test]
    fn test_empty_transform_is_canonical_default() {
        let parsed = ParameterValue::from_json("transform", ParameterType::Transform, &json!({})).unwrap();
        assert_eq!(parsed, ParameterType::Transform.canonical_default());
    }

    #[test]
    fn test_transform_components_read_back_at_f32_precision() {
        let value = json!({ "position": [0.1, 0.0, 0.0] });
        let parsed = ParameterValue::from_json("transform", ParameterType::Transform, &value).unwrap();
        let saved = parsed.to_json();

        let x = saved["position"][0].as_f64().unwrap();
        assert_eq!(x, f64::from(0.1f32));
        assert_ne!(x, 0.1);

        let reparsed = ParameterValue::from_json("transform", ParameterType::Transform, &saved).unwrap();
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn test_transform_rejects_short_vector() {
        let value = json!({ "scale": [1.0, 2.0] });
        let err = ParameterValue::from_json("transform", ParameterType::Transform, &value).unwrap_err();
        assert!(matches!(err, SchemaBindingError::InvalidField { ref field, .. } if field == "scale"));
    }

    #[test]
    fn test_boolean_operation_case_insensitive() {
        let value = json!({ "operation": "union", "targets": ["P.S1"] });
        let parsed =
            ParameterValue::from_json("boolean", ParameterType::BooleanOperation, &value).unwrap();
        let spec = parsed.as_boolean_operation().unwrap();
        assert_eq!(spec.operation, BooleanOperation::Union);
        assert_eq!(spec.targets, vec!["P.S1".to_string()]);
    }

    #[test]
    fn test_boolean_operation_unknown_name() {
        let value = json!({ "operation": "XOR" });
        assert!(ParameterValue::from_json("boolean", ParameterType::BooleanOperation, &value).is_err());
    }

    #[test]
    fn test_number_rejects_string() {
        let err = ParameterValue::from_json("radius", ParameterType::Number, &json!("10")).unwrap_err();
        assert!(matches!(
            err,
            SchemaBindingError::TypeMismatch { expected: ParameterType::Number, found: "string", .. }
        ));
    }

    #[test]
    fn test_operation_maps_to_kernel_type() {
        assert_eq!(Option::<BooleanType>::from(BooleanOperation::None), None);
        assert_eq!(
            Option::<BooleanType>::from(BooleanOperation::Subtract),
            Some(BooleanType::Subtract)
        );
    }

    #[test]
    fn test_type_names_are_stable() {
        let names: Vec<_> = [
            ParameterType::String,
            ParameterType::Number,
            ParameterType::Boolean,
            ParameterType::Transform,
            ParameterType::BooleanOperation,
        ]
        .iter()
        .map(|t| serde_json::to_value(t).unwrap())
        .collect();
        assert_eq!(
            names,
            vec![
                json!("string"),
                json!("number"),
                json!("boolean"),
                json!("transform"),
                json!("boolean_operation")
            ]
        );
    }
}

//! Primitive sphere feature

use crate::feature::{FeatureResult, RunContext};
use crate::kernel::PrimitiveSpec;
use crate::param::{BooleanOperationSpec, ParameterDefinition, ParameterSchema, SchemaResult, Transform};

/// Registry key
pub const SHORT_NAME: &str = "P.S";

/// Display label
pub const NAME: &str = "Primitive Sphere";

/// Declared inputs
pub fn schema() -> SchemaResult<ParameterSchema> {
    ParameterSchema::new(vec![
        ParameterDefinition::number("radius", 5.0, "Radius of the sphere"),
        ParameterDefinition::number(
            "resolution",
            32.0,
            "Base segment count (longitude). Latitude segments are derived from this.",
        ),
        ParameterDefinition::transform("transform", Transform::IDENTITY, "Position, rotation, and scale"),
        ParameterDefinition::boolean_operation(
            "boolean",
            BooleanOperationSpec::default(),
            "Optional boolean operation with selected solids",
        ),
    ])
}

pub(super) fn spec(ctx: &RunContext<'_>) -> FeatureResult<PrimitiveSpec> {
    Ok(PrimitiveSpec::Sphere {
        radius: ctx.real("radius")?,
        resolution: ctx.count("resolution")?,
    })
}

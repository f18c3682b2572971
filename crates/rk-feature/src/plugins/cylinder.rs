//! Primitive cylinder feature

use crate::feature::{FeatureResult, RunContext};
use crate::kernel::PrimitiveSpec;
use crate::param::{BooleanOperationSpec, ParameterDefinition, ParameterSchema, SchemaResult, Transform};

/// Registry key
pub const SHORT_NAME: &str = "P.CY";

/// Display label
pub const NAME: &str = "Primitive Cylinder";

/// Declared inputs
pub fn schema() -> SchemaResult<ParameterSchema> {
    ParameterSchema::new(vec![
        ParameterDefinition::number("radius", 5.0, "Radius of the cylinder"),
        ParameterDefinition::number("height", 10.0, "Height along the Z axis"),
        ParameterDefinition::number("resolution", 32.0, "Segment count around the axis"),
        ParameterDefinition::transform("transform", Transform::IDENTITY, "Position, rotation, and scale"),
        ParameterDefinition::boolean_operation(
            "boolean",
            BooleanOperationSpec::default(),
            "Optional boolean operation with selected solids",
        ),
    ])
}

pub(super) fn spec(ctx: &RunContext<'_>) -> FeatureResult<PrimitiveSpec> {
    Ok(PrimitiveSpec::Cylinder {
        radius: ctx.real("radius")?,
        height: ctx.real("height")?,
        resolution: ctx.count("resolution")?,
    })
}

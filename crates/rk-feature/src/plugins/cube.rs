//! Primitive cube feature

use glam::Vec3;

use crate::feature::{FeatureResult, RunContext};
use crate::kernel::PrimitiveSpec;
use crate::param::{BooleanOperationSpec, ParameterDefinition, ParameterSchema, SchemaResult, Transform};

/// Registry key
pub const SHORT_NAME: &str = "P.CU";

/// Display label
pub const NAME: &str = "Primitive Cube";

/// Declared inputs
pub fn schema() -> SchemaResult<ParameterSchema> {
    ParameterSchema::new(vec![
        ParameterDefinition::number("sizeX", 10.0, "Length along X"),
        ParameterDefinition::number("sizeY", 10.0, "Length along Y"),
        ParameterDefinition::number("sizeZ", 10.0, "Length along Z"),
        ParameterDefinition::transform("transform", Transform::IDENTITY, "Position, rotation, and scale"),
        ParameterDefinition::boolean_operation(
            "boolean",
            BooleanOperationSpec::default(),
            "Optional boolean operation with selected solids",
        ),
    ])
}

pub(super) fn spec(ctx: &RunContext<'_>) -> FeatureResult<PrimitiveSpec> {
    Ok(PrimitiveSpec::Cuboid {
        size: Vec3::new(
            ctx.real("sizeX")?,
            ctx.real("sizeY")?,
            ctx.real("sizeZ")?,
        ),
    })
}

//! Built-in primitive features
//!
//! Sphere, cube and cylinder share one execution path: build the primitive,
//! bake the transform, hint visualization, then merge.

pub mod cube;
pub mod cylinder;
pub mod sphere;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::feature::{FeatureClass, FeaturePlugin, FeatureResult, PersistentData, RunContext};
use crate::kernel::{PrimitiveKind, PrimitiveSpec, Solid};
use crate::merge::SolidSet;
use crate::param::{ParameterSchema, SchemaResult};
use crate::registry::{HostSurface, RegistryResult};

const LAST_SOLID: &str = "lastSolid";

/// Class for one of the built-in primitives
#[derive(Debug)]
pub struct PrimitiveFeatureClass {
    kind: PrimitiveKind,
    short_name: &'static str,
    name: &'static str,
    schema: ParameterSchema,
}

impl PrimitiveFeatureClass {
    /// The sphere class
    pub fn sphere() -> SchemaResult<Self> {
        Ok(Self {
            kind: PrimitiveKind::Sphere,
            short_name: sphere::SHORT_NAME,
            name: sphere::NAME,
            schema: sphere::schema()?,
        })
    }

    /// The cube class
    pub fn cube() -> SchemaResult<Self> {
        Ok(Self {
            kind: PrimitiveKind::Cuboid,
            short_name: cube::SHORT_NAME,
            name: cube::NAME,
            schema: cube::schema()?,
        })
    }

    /// The cylinder class
    pub fn cylinder() -> SchemaResult<Self> {
        Ok(Self {
            kind: PrimitiveKind::Cylinder,
            short_name: cylinder::SHORT_NAME,
            name: cylinder::NAME,
            schema: cylinder::schema()?,
        })
    }

    /// Kind of primitive this class builds
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }
}

impl FeatureClass for PrimitiveFeatureClass {
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
        Box::new(PrimitiveFeature {
            kind: self.kind,
            persistent: PersistentData::default(),
        })
    }
}

/// Instance of a built-in primitive
#[derive(Debug)]
pub struct PrimitiveFeature {
    kind: PrimitiveKind,
    persistent: PersistentData,
}

impl PrimitiveFeature {
    fn spec(&self, ctx: &RunContext<'_>) -> FeatureResult<PrimitiveSpec> {
        match self.kind {
            PrimitiveKind::Sphere => sphere::spec(ctx),
            PrimitiveKind::Cuboid => cube::spec(ctx),
            PrimitiveKind::Cylinder => cylinder::spec(ctx),
        }
    }

    /// Solid built by the last successful run of this instance
    pub fn previous_solid(&self) -> Option<Solid> {
        self.persistent
            .get(LAST_SOLID)
            .and_then(|v| v.as_str())
            .and_then(|id| Uuid::parse_str(id).ok())
            .map(Solid::new)
    }
}

#[async_trait]
impl FeaturePlugin for PrimitiveFeature {
    async fn run(&mut self, ctx: &RunContext<'_>, solids: SolidSet) -> FeatureResult<SolidSet> {
        let spec = self.spec(ctx)?;
        let solid = ctx.construct(&spec).await?;

        if let Some(transform) = ctx.transform("transform") {
            ctx.apply_transform(&solid, transform).await?;
        }
        ctx.visualize(&solid);

        let next = ctx.merge(&solids, solid, &ctx.boolean_operation("boolean")).await?;

        match self.previous_solid() {
            Some(previous) => tracing::debug!(
                feature = %ctx.feature_id(),
                solid = %solid,
                replaced = %previous,
                "Rebuilt primitive"
            ),
            None => tracing::debug!(feature = %ctx.feature_id(), solid = %solid, "Built primitive"),
        }
        self.persistent
            .insert(LAST_SOLID, json!(solid.id().to_string()));
        Ok(next)
    }
}

/// All built-in classes, in registration order
pub fn builtin_classes() -> SchemaResult<Vec<Arc<dyn FeatureClass>>> {
    Ok(vec![
        Arc::new(PrimitiveFeatureClass::sphere()?) as Arc<dyn FeatureClass>,
        Arc::new(PrimitiveFeatureClass::cube()?) as Arc<dyn FeatureClass>,
        Arc::new(PrimitiveFeatureClass::cylinder()?) as Arc<dyn FeatureClass>,
    ])
}

/// Register the built-in features with a host
pub fn install(host: &mut dyn HostSurface) -> RegistryResult<()> {
    for class in builtin_classes()? {
        host.register_feature(class)?;
    }
    Ok(())
}

//! Geometry capability interface
//!
//! The fixed set of operations features may invoke on the geometry kernel.
//! Kernels are always passed in explicitly; nothing in this crate holds one
//! as global state.

use std::fmt;

use async_trait::async_trait;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::param::Transform;

/// Error type for geometry kernel operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("Geometry construction failed: {0}")]
    GeometryConstruction(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Boolean operation failed: {0}")]
    BooleanOperation(String),

    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Opaque handle to a solid owned by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solid {
    id: Uuid,
}

impl Solid {
    /// Wrap a kernel-assigned identifier
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    /// Kernel-assigned identifier
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for Solid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "solid:{}", self.id)
    }
}

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (add)
    Union,
    /// Subtraction (cut)
    Subtract,
    /// Intersection (common)
    Intersect,
}

/// Kind of primitive a kernel can construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// UV sphere
    Sphere,
    /// Axis-aligned box
    Cuboid,
    /// Cylinder along the Z axis
    Cylinder,
}

/// Primitive kind together with its construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveSpec {
    /// Sphere centered at the origin
    Sphere {
        /// Sphere radius
        radius: f32,
        /// Longitude segment count; latitude is derived from it
        resolution: u32,
    },
    /// Box centered at the origin
    Cuboid {
        /// Edge lengths
        size: Vec3,
    },
    /// Cylinder centered at the origin
    Cylinder {
        /// Cylinder radius
        radius: f32,
        /// Height along Z
        height: f32,
        /// Segment count around the axis
        resolution: u32,
    },
}

impl PrimitiveSpec {
    /// Kind of primitive described
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveSpec::Sphere { .. } => PrimitiveKind::Sphere,
            PrimitiveSpec::Cuboid { .. } => PrimitiveKind::Cuboid,
            PrimitiveSpec::Cylinder { .. } => PrimitiveKind::Cylinder,
        }
    }

    /// Check the construction parameters a kernel must reject
    pub fn validate(&self) -> KernelResult<()> {
        let fail = |msg: String| Err(KernelError::GeometryConstruction(msg));
        match *self {
            PrimitiveSpec::Sphere { radius, resolution } => {
                if !(radius.is_finite() && radius > 0.0) {
                    return fail(format!("sphere radius must be positive, got {radius}"));
                }
                if resolution < 3 {
                    return fail(format!("sphere resolution must be at least 3, got {resolution}"));
                }
            }
            PrimitiveSpec::Cuboid { size } => {
                if !(size.is_finite() && size.min_element() > 0.0) {
                    return fail(format!("box size must be positive, got {size}"));
                }
            }
            PrimitiveSpec::Cylinder {
                radius,
                height,
                resolution,
            } => {
                if !(radius.is_finite() && radius > 0.0) {
                    return fail(format!("cylinder radius must be positive, got {radius}"));
                }
                if !(height.is_finite() && height > 0.0) {
                    return fail(format!("cylinder height must be positive, got {height}"));
                }
                if resolution < 3 {
                    return fail(format!("cylinder resolution must be at least 3, got {resolution}"));
                }
            }
        }
        Ok(())
    }
}

/// The capability interface every geometry kernel implements
///
/// Construction, transform and boolean calls may suspend while the kernel
/// computes; callers await each call before issuing the next.
#[async_trait]
pub trait GeometryKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Construct a primitive solid
    ///
    /// # Arguments
    /// * `spec` - Primitive kind and parameters
    /// * `name` - Stable name used to correlate solids across re-evaluations
    async fn construct_primitive(&self, spec: &PrimitiveSpec, name: &str) -> KernelResult<Solid>;

    /// Bake a transform into a solid
    ///
    /// Fails with [`KernelError::Transform`] once the solid has been consumed
    /// by a boolean operation.
    async fn apply_transform(&self, solid: &Solid, transform: &Transform) -> KernelResult<()>;

    /// Mark a solid for display; a hint only, never fails
    fn visualize(&self, solid: &Solid);

    /// Combine two solids into a new one
    ///
    /// Both operands are finalized by the call.
    async fn apply_boolean(&self, op: BooleanType, a: &Solid, b: &Solid) -> KernelResult<Solid>;
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

#[async_trait]
impl GeometryKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    async fn construct_primitive(&self, _spec: &PrimitiveSpec, _name: &str) -> KernelResult<Solid> {
        Err(KernelError::KernelNotAvailable(
            "No geometry kernel available".into(),
        ))
    }

    async fn apply_transform(&self, _solid: &Solid, _transform: &Transform) -> KernelResult<()> {
        Err(KernelError::KernelNotAvailable(
            "No geometry kernel available".into(),
        ))
    }

    fn visualize(&self, _solid: &Solid) {}

    async fn apply_boolean(&self, _op: BooleanType, _a: &Solid, _b: &Solid) -> KernelResult<Solid> {
        Err(KernelError::KernelNotAvailable(
            "No geometry kernel available".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_validation() {
        assert!(PrimitiveSpec::Sphere { radius: 1.0, resolution: 3 }.validate().is_ok());
        assert!(PrimitiveSpec::Sphere { radius: 0.0, resolution: 32 }.validate().is_err());
        assert!(PrimitiveSpec::Sphere { radius: -2.0, resolution: 32 }.validate().is_err());
        assert!(PrimitiveSpec::Sphere { radius: 1.0, resolution: 2 }.validate().is_err());
    }

    #[test]
    fn test_cuboid_validation() {
        assert!(PrimitiveSpec::Cuboid { size: Vec3::ONE }.validate().is_ok());
        assert!(
            PrimitiveSpec::Cuboid { size: Vec3::new(1.0, 0.0, 1.0) }
                .validate()
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_null_kernel_unavailable() {
        let kernel = NullKernel;
        let result = kernel
            .construct_primitive(&PrimitiveSpec::Sphere { radius: 1.0, resolution: 8 }, "s")
            .await;
        assert!(matches!(result, Err(KernelError::KernelNotAvailable(_))));
    }
}

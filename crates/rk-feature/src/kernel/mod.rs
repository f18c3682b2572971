//! Geometry kernel capability interface
//!
//! Features reach the geometry kernel only through [`GeometryKernel`].

mod memory;
mod traits;

pub use memory::{KernelCall, MemoryKernel, SolidOrigin, SolidRecord};
pub use traits::{
    BooleanType, GeometryKernel, KernelError, KernelResult, NullKernel, PrimitiveKind,
    PrimitiveSpec, Solid,
};

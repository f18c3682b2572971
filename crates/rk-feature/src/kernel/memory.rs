//! In-memory reference kernel
//!
//! Keeps a record of every solid and every call it receives without
//! computing any geometry. Used by the headless host and as a test double.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{BooleanType, GeometryKernel, KernelError, KernelResult, PrimitiveSpec, Solid};
use crate::param::Transform;

/// How a stored solid came to exist
#[derive(Debug, Clone, PartialEq)]
pub enum SolidOrigin {
    /// Built from a primitive
    Primitive(PrimitiveSpec),
    /// Result of a boolean between two earlier solids
    Boolean {
        /// Operation applied
        op: BooleanType,
        /// Left operand
        a: Solid,
        /// Right operand
        b: Solid,
    },
}

/// Bookkeeping for one stored solid
#[derive(Debug, Clone, PartialEq)]
pub struct SolidRecord {
    /// Name passed at construction (inherited from the left operand for booleans)
    pub name: String,
    /// Where the solid came from
    pub origin: SolidOrigin,
    /// Transforms baked in, in application order
    pub transforms: Vec<Transform>,
    /// Set once the solid has been consumed by a boolean
    pub finalized: bool,
}

/// A call received by the kernel
#[derive(Debug, Clone, PartialEq)]
pub enum KernelCall {
    /// `construct_primitive`
    Construct {
        /// Requested name
        name: String,
        /// Resulting solid
        solid: Solid,
    },
    /// `apply_transform`
    Transform {
        /// Target solid
        solid: Solid,
    },
    /// `visualize`
    Visualize {
        /// Target solid
        solid: Solid,
    },
    /// `apply_boolean`
    Boolean {
        /// Operation applied
        op: BooleanType,
        /// Left operand
        a: Solid,
        /// Right operand
        b: Solid,
    },
}

#[derive(Debug, Default)]
struct KernelState {
    solids: HashMap<Uuid, SolidRecord>,
    calls: Vec<KernelCall>,
    next_id: u128,
}

impl KernelState {
    /// Store a solid and return a handle; ids are sequential so runs replay identically
    fn store(&mut self, record: SolidRecord) -> Solid {
        self.next_id += 1;
        let id = Uuid::from_u128(self.next_id);
        self.solids.insert(id, record);
        Solid::new(id)
    }

    fn live(&self, solid: &Solid) -> Result<&SolidRecord, String> {
        match self.solids.get(&solid.id()) {
            None => Err(format!("unknown {solid}")),
            Some(record) if record.finalized => Err(format!("{solid} has already been merged")),
            Some(record) => Ok(record),
        }
    }
}

/// Bookkeeping kernel backed by an in-memory table
#[derive(Debug, Default)]
pub struct MemoryKernel {
    state: Mutex<KernelState>,
}

impl MemoryKernel {
    /// Create an empty kernel
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of solids ever stored
    pub fn solid_count(&self) -> usize {
        self.state.lock().solids.len()
    }

    /// Get a copy of a solid's record
    pub fn record(&self, solid: &Solid) -> Option<SolidRecord> {
        self.state.lock().solids.get(&solid.id()).cloned()
    }

    /// Check if a solid has been consumed by a boolean
    pub fn is_finalized(&self, solid: &Solid) -> bool {
        self.record(solid).is_some_and(|r| r.finalized)
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<KernelCall> {
        self.state.lock().calls.clone()
    }

    /// Number of boolean operations performed
    pub fn boolean_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, KernelCall::Boolean { .. }))
            .count()
    }

    /// Solids that were marked for display
    pub fn visualized(&self) -> Vec<Solid> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                KernelCall::Visualize { solid } => Some(*solid),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl GeometryKernel for MemoryKernel {
    fn name(&self) -> &str {
        "memory"
    }

    async fn construct_primitive(&self, spec: &PrimitiveSpec, name: &str) -> KernelResult<Solid> {
        spec.validate()?;

        let mut state = self.state.lock();
        let solid = state.store(SolidRecord {
            name: name.to_owned(),
            origin: SolidOrigin::Primitive(*spec),
            transforms: Vec::new(),
            finalized: false,
        });
        state.calls.push(KernelCall::Construct {
            name: name.to_owned(),
            solid,
        });
        Ok(solid)
    }

    async fn apply_transform(&self, solid: &Solid, transform: &Transform) -> KernelResult<()> {
        let mut state = self.state.lock();
        state.live(solid).map_err(KernelError::Transform)?;
        state.calls.push(KernelCall::Transform { solid: *solid });
        if let Some(record) = state.solids.get_mut(&solid.id()) {
            record.transforms.push(*transform);
        }
        Ok(())
    }

    fn visualize(&self, solid: &Solid) {
        self.state.lock().calls.push(KernelCall::Visualize { solid: *solid });
    }

    async fn apply_boolean(&self, op: BooleanType, a: &Solid, b: &Solid) -> KernelResult<Solid> {
        if a == b {
            return Err(KernelError::BooleanOperation(format!(
                "degenerate operands: {a} used on both sides"
            )));
        }

        let mut state = self.state.lock();
        let name = state.live(a).map_err(KernelError::BooleanOperation)?.name.clone();
        state.live(b).map_err(KernelError::BooleanOperation)?;

        for operand in [a, b] {
            if let Some(record) = state.solids.get_mut(&operand.id()) {
                record.finalized = true;
            }
        }
        state.calls.push(KernelCall::Boolean { op, a: *a, b: *b });
        Ok(state.store(SolidRecord {
            name,
            origin: SolidOrigin::Boolean { op, a: *a, b: *b },
            transforms: Vec::new(),
            finalized: false,
        }))
    }
}

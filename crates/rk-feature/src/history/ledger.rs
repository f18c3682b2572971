//! Per-node bookkeeping of kernel handles

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::kernel::{BooleanType, GeometryKernel, KernelResult, PrimitiveSpec, Solid};
use crate::param::Transform;

/// Handles created and consumed while one node executed
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Ledger {
    pub created: Vec<Solid>,
    pub consumed: Vec<Solid>,
}

impl Ledger {
    /// Solids created by the node that no boolean consumed
    pub fn outstanding(&self) -> Vec<Solid> {
        self.created
            .iter()
            .filter(|s| !self.consumed.contains(s))
            .copied()
            .collect()
    }
}

/// Kernel wrapper that records every handle passing through it
pub(crate) struct TrackingKernel<'a> {
    inner: &'a dyn GeometryKernel,
    ledger: Mutex<Ledger>,
}

impl<'a> TrackingKernel<'a> {
    pub fn new(inner: &'a dyn GeometryKernel) -> Self {
        Self {
            inner,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger.into_inner()
    }
}

#[async_trait]
impl GeometryKernel for TrackingKernel<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn construct_primitive(&self, spec: &PrimitiveSpec, name: &str) -> KernelResult<Solid> {
        let solid = self.inner.construct_primitive(spec, name).await?;
        self.ledger.lock().created.push(solid);
        Ok(solid)
    }

    async fn apply_transform(&self, solid: &Solid, transform: &Transform) -> KernelResult<()> {
        self.inner.apply_transform(solid, transform).await
    }

    fn visualize(&self, solid: &Solid) {
        self.inner.visualize(solid);
    }

    async fn apply_boolean(&self, op: BooleanType, a: &Solid, b: &Solid) -> KernelResult<Solid> {
        let result = self.inner.apply_boolean(op, a, b).await?;
        let mut ledger = self.ledger.lock();
        ledger.consumed.extend([*a, *b]);
        ledger.created.push(result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryKernel;

    #[tokio::test]
    async fn test_outstanding_excludes_consumed() {
        let kernel = MemoryKernel::new();
        let existing = kernel
            .construct_primitive(&PrimitiveSpec::Sphere { radius: 1.0, resolution: 8 }, "old")
            .await
            .unwrap();

        let tracker = TrackingKernel::new(&kernel);
        let fresh = tracker
            .construct_primitive(&PrimitiveSpec::Sphere { radius: 2.0, resolution: 8 }, "new")
            .await
            .unwrap();
        let merged = tracker
            .apply_boolean(BooleanType::Union, &fresh, &existing)
            .await
            .unwrap();

        let ledger = tracker.into_ledger();
        assert_eq!(ledger.created, vec![fresh, merged]);
        assert_eq!(ledger.outstanding(), vec![merged]);
    }
}

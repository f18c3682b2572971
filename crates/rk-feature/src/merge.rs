//! Boolean merge protocol
//!
//! Folds a freshly built solid into the solids accumulated by earlier
//! features.

use std::collections::HashSet;

use thiserror::Error;

use crate::kernel::{BooleanType, GeometryKernel, KernelError, Solid};
use crate::param::BooleanOperationSpec;

/// Merge-related errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("Boolean target not found: {0}")]
    UnresolvedTarget(String),

    #[error("Boolean target listed more than once: {0}")]
    DuplicateTarget(String),

    #[error("A solid is already recorded under '{0}'")]
    SolidKeyConflict(String),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Result type for merge operations
pub type MergeResult<T> = Result<T, MergeError>;

/// Solids accumulated by a history, keyed by the id of the feature that produced them
///
/// Iteration follows insertion order, so replaying the same history always
/// yields the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolidSet {
    entries: Vec<(String, Solid)>,
}

impl SolidSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of solids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a solid by key
    pub fn get(&self, key: &str) -> Option<Solid> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, s)| *s)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a solid, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, solid: Solid) -> Option<Solid> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, solid)),
            None => {
                self.entries.push((key, solid));
                None
            }
        }
    }

    /// Remove a solid by key
    pub fn remove(&mut self, key: &str) -> Option<Solid> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `(key, solid)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Solid)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), *s))
    }

    /// Check if a solid handle is held under any key
    pub fn holds(&self, solid: &Solid) -> bool {
        self.entries.iter().any(|(_, s)| s == solid)
    }
}

/// Fold `new_solid` into `solids` as requested by `spec`
///
/// Without a merge the new solid is stored under `feature_id`. Otherwise
/// every target is resolved before any kernel call, the operation is folded
/// left to right with the new solid as the first left operand, and the
/// consumed targets are replaced by the single result. `solids` itself is
/// never modified; on error the caller still holds the previous state.
pub async fn apply_boolean_operation(
    kernel: &dyn GeometryKernel,
    solids: &SolidSet,
    new_solid: Solid,
    spec: &BooleanOperationSpec,
    feature_id: &str,
) -> MergeResult<SolidSet> {
    let op = Option::<BooleanType>::from(spec.operation).filter(|_| !spec.targets.is_empty());

    let Some(op) = op else {
        if solids.contains(feature_id) {
            return Err(MergeError::SolidKeyConflict(feature_id.to_owned()));
        }
        let mut next = solids.clone();
        next.insert(feature_id, new_solid);
        return Ok(next);
    };

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(spec.targets.len());
    for target in &spec.targets {
        if !seen.insert(target.as_str()) {
            return Err(MergeError::DuplicateTarget(target.clone()));
        }
        let solid = solids
            .get(target)
            .ok_or_else(|| MergeError::UnresolvedTarget(target.clone()))?;
        resolved.push((target.as_str(), solid));
    }
    if solids.contains(feature_id) && !seen.contains(feature_id) {
        return Err(MergeError::SolidKeyConflict(feature_id.to_owned()));
    }

    let mut result = new_solid;
    for (_, target) in &resolved {
        result = kernel.apply_boolean(op, &result, target).await?;
    }

    let mut next = solids.clone();
    for (key, _) in &resolved {
        next.remove(key);
    }
    next.insert(feature_id, result);

    tracing::debug!(
        feature = %feature_id,
        operation = ?op,
        consumed = resolved.len(),
        "Merged solid into history"
    );
    Ok(next)
}

//! Part History
//!
//! Ordered, replayable sequence of feature nodes. Each node's output is the
//! next node's input, so `History_n = run(Feature_n, History_{n-1})`.
//! Evaluation is strictly sequential; a failed node leaves the accumulated
//! solid set exactly as it was before the node ran.

mod ledger;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::config::{EvaluationConfig, UnresolvedTargetPolicy};
use crate::feature::{FeatureClass, FeatureError, FeatureInstance};
use crate::kernel::{GeometryKernel, Solid};
use crate::merge::SolidSet;
use crate::param::{Overrides, SchemaBindingError};
use crate::registry::{FeatureRegistry, RegistryError};

use ledger::TrackingKernel;

/// History editing errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("Feature node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid history index: {0}")]
    InvalidIndex(usize),

    #[error("Parameter binding failed: {0}")]
    Binding(#[from] SchemaBindingError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Outcome of a node in the most recent pass
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeStatus {
    /// Not evaluated since the last edit
    #[default]
    Pending,
    /// Ran and committed its output
    Completed,
    /// Ran and failed; the accumulated set was left untouched
    Failed(FeatureError),
    /// Not applied, per the unresolved-target policy
    Skipped(FeatureError),
    /// Suppressed by the user
    Suppressed,
    /// Interrupted by cancellation
    Cancelled,
}

impl NodeStatus {
    /// Check if the node ran and committed
    pub fn is_completed(&self) -> bool {
        matches!(self, NodeStatus::Completed)
    }

    /// Check if the node should have contributed geometry but did not
    pub fn is_missing_geometry(&self) -> bool {
        matches!(
            self,
            NodeStatus::Failed(_) | NodeStatus::Skipped(_) | NodeStatus::Cancelled
        )
    }

    /// Error recorded for the node, if any
    pub fn error(&self) -> Option<&FeatureError> {
        match self {
            NodeStatus::Failed(e) | NodeStatus::Skipped(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Pending => f.write_str("pending"),
            NodeStatus::Completed => f.write_str("completed"),
            NodeStatus::Failed(e) => write!(f, "failed: {e}"),
            NodeStatus::Skipped(e) => write!(f, "skipped: {e}"),
            NodeStatus::Suppressed => f.write_str("suppressed"),
            NodeStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What one node did in the most recent pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepRecord {
    /// Accumulated set handed to the node
    pub before: SolidSet,
    /// Accumulated set after the node (equal to `before` unless completed)
    pub after: SolidSet,
    /// Handles the kernel produced for this node
    pub created: Vec<Solid>,
    /// Handles this node combined away in booleans
    pub consumed: Vec<Solid>,
    /// Handles produced by this node that ended up in no accumulated set
    pub orphaned: Vec<Solid>,
}

impl StepRecord {
    /// Consumed handles that are still part of `after`
    ///
    /// Non-empty when a node combined solids in the kernel and then failed,
    /// leaving finalized handles in the set passed downstream.
    pub fn stale(&self) -> Vec<Solid> {
        self.consumed
            .iter()
            .filter(|s| self.after.holds(s))
            .cloned()
            .collect()
    }
}

/// A node in the feature history
#[derive(Debug)]
pub struct HistoryEntry {
    feature_id: String,
    instance: FeatureInstance,
    overrides: Overrides,
    suppressed: bool,
    status: NodeStatus,
    step: StepRecord,
}

impl HistoryEntry {
    /// Stable identifier of this node
    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    /// Short name of the node's feature class
    pub fn short_name(&self) -> &str {
        self.instance.class().short_name()
    }

    /// The plugin instance
    pub fn instance(&self) -> &FeatureInstance {
        &self.instance
    }

    /// Overrides as supplied by the user
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Check if the node is suppressed
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Outcome of the most recent pass
    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    /// Step record of the most recent pass
    pub fn step(&self) -> &StepRecord {
        &self.step
    }

    fn invalidate(&mut self) {
        self.status = NodeStatus::Pending;
        self.step = StepRecord::default();
    }
}

/// Summary of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    /// Nodes whose entry point was started
    pub evaluated: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub suppressed: usize,
    /// The pass was interrupted
    pub cancelled: bool,
    /// Solids in the final accumulated set
    pub solid_count: usize,
}

impl EvaluationReport {
    /// Check if every evaluated node completed
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && !self.cancelled
    }
}

/// Ordered feature history of one part
#[derive(Debug, Default)]
pub struct PartHistory {
    entries: Vec<HistoryEntry>,
    /// Current rollback position (None = at end)
    rollback_position: Option<usize>,
    solids: SolidSet,
    counters: HashMap<String, u32>,
    config: EvaluationConfig,
}

impl PartHistory {
    /// Create an empty history with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history with a specific configuration
    pub fn with_config(config: EvaluationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Evaluation settings
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Replace the evaluation settings; all nodes become pending
    pub fn set_config(&mut self, config: EvaluationConfig) {
        self.config = config;
        self.invalidate_from(0);
    }

    /// Get the number of nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get all nodes
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Get a node by feature id
    pub fn get(&self, feature_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.feature_id == feature_id)
    }

    /// Get the position of a node by feature id
    pub fn index_of(&self, feature_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.feature_id == feature_id)
    }

    /// Accumulated solid set produced by the most recent pass
    pub fn solids(&self) -> &SolidSet {
        &self.solids
    }

    /// Append a node, binding its overrides immediately
    ///
    /// When rolled back, the node is inserted at the rollback point and the
    /// rollback point moves past it. Returns the new node's feature id.
    pub fn add_feature(
        &mut self,
        class: Arc<dyn FeatureClass>,
        overrides: Overrides,
    ) -> HistoryResult<String> {
        let mut instance = FeatureInstance::new(class);
        instance.bind(&overrides)?;

        let feature_id = self.next_feature_id(instance.class().short_name());
        let entry = HistoryEntry {
            feature_id: feature_id.clone(),
            instance,
            overrides,
            suppressed: false,
            status: NodeStatus::Pending,
            step: StepRecord::default(),
        };

        match self.rollback_position {
            Some(pos) => {
                self.entries.insert(pos, entry);
                self.rollback_position = Some(pos + 1);
                self.invalidate_from(pos);
            }
            None => self.entries.push(entry),
        }

        tracing::debug!(feature = %feature_id, "Added feature node");
        Ok(feature_id)
    }

    /// Append a node of a registered class
    pub fn add_from_registry(
        &mut self,
        registry: &FeatureRegistry,
        short_name: &str,
        overrides: Overrides,
    ) -> HistoryResult<String> {
        let class = registry
            .lookup(short_name)
            .ok_or_else(|| RegistryError::UnknownFeature(short_name.to_owned()))?;
        self.add_feature(class, overrides)
    }

    /// Rebind a node's overrides; on error the node keeps its old parameters
    pub fn set_overrides(&mut self, feature_id: &str, overrides: Overrides) -> HistoryResult<()> {
        let index = self.require(feature_id)?;
        let entry = &mut self.entries[index];
        entry.instance.bind(&overrides)?;
        entry.overrides = overrides;
        self.invalidate_from(index);
        Ok(())
    }

    /// Suppress or unsuppress a node
    pub fn set_suppressed(&mut self, feature_id: &str, suppressed: bool) -> HistoryResult<()> {
        let index = self.require(feature_id)?;
        if self.entries[index].suppressed != suppressed {
            self.entries[index].suppressed = suppressed;
            self.invalidate_from(index);
        }
        Ok(())
    }

    /// Remove a node from the history
    pub fn remove_feature(&mut self, feature_id: &str) -> Option<HistoryEntry> {
        let index = self.index_of(feature_id)?;
        let entry = self.entries.remove(index);

        if let Some(pos) = self.rollback_position
            && index < pos
        {
            self.rollback_position = Some(pos - 1);
        }
        self.invalidate_from(index);
        Some(entry)
    }

    /// Move a node to a new position
    pub fn move_feature(&mut self, feature_id: &str, new_index: usize) -> HistoryResult<()> {
        let old_index = self.require(feature_id)?;

        if new_index >= self.entries.len() {
            return Err(HistoryError::InvalidIndex(new_index));
        }

        let entry = self.entries.remove(old_index);
        self.entries.insert(new_index, entry);
        self.invalidate_from(old_index.min(new_index));
        Ok(())
    }

    // ============== Rollback ==============

    /// Roll back to a node (nodes after it are not evaluated)
    pub fn rollback_to(&mut self, feature_id: &str) -> HistoryResult<()> {
        let index = self.require(feature_id)?;
        self.rollback_position = Some(index + 1);
        self.invalidate_from(index + 1);
        Ok(())
    }

    /// Roll back to the end (evaluate all nodes)
    pub fn rollback_to_end(&mut self) {
        if let Some(pos) = self.rollback_position.take() {
            self.invalidate_from(pos);
        }
    }

    /// Get the current rollback position
    pub fn rollback_position(&self) -> Option<usize> {
        self.rollback_position
    }

    /// Get the effective number of nodes (accounting for rollback)
    pub fn effective_len(&self) -> usize {
        self.rollback_position
            .unwrap_or(self.entries.len())
            .min(self.entries.len())
    }

    // ============== Evaluation ==============

    /// Evaluate every effective node from an empty solid set
    pub async fn evaluate(&mut self, kernel: &dyn GeometryKernel) -> EvaluationReport {
        self.evaluate_with_cancel(kernel, &CancellationToken::new())
            .await
    }

    /// Evaluate every effective node, stopping early if `cancel` fires
    pub async fn evaluate_with_cancel(
        &mut self,
        kernel: &dyn GeometryKernel,
        cancel: &CancellationToken,
    ) -> EvaluationReport {
        tracing::info!(
            nodes = self.effective_len(),
            kernel = %kernel.name(),
            "Evaluating part history"
        );
        self.run_from(0, SolidSet::new(), kernel, cancel).await
    }

    /// Re-evaluate from a node onwards, reusing the recorded input of that node
    ///
    /// Falls back to a full pass when the node before it has no valid record,
    /// or when a node from `feature_id` on already consumed one of the reused
    /// solids in a boolean.
    pub async fn evaluate_from(
        &mut self,
        feature_id: &str,
        kernel: &dyn GeometryKernel,
        cancel: &CancellationToken,
    ) -> HistoryResult<EvaluationReport> {
        let start = self.require(feature_id)?;

        let initial = start
            .checked_sub(1)
            .map(|i| &self.entries[i])
            .filter(|e| e.status != NodeStatus::Pending)
            .map(|e| e.step.after.clone())
            .filter(|reused| {
                !self.entries[start..]
                    .iter()
                    .flat_map(|e| e.step.consumed.iter())
                    .any(|s| reused.holds(s))
            });

        let Some(initial) = initial else {
            return Ok(self.evaluate_with_cancel(kernel, cancel).await);
        };

        tracing::info!(
            feature = %feature_id,
            reused = initial.len(),
            "Re-evaluating part history from node"
        );
        Ok(self.run_from(start, initial, kernel, cancel).await)
    }

    async fn run_from(
        &mut self,
        start: usize,
        mut solids: SolidSet,
        kernel: &dyn GeometryKernel,
        cancel: &CancellationToken,
    ) -> EvaluationReport {
        let config = self.config.clone();
        let end = self.effective_len();
        let mut report = EvaluationReport::default();

        self.invalidate_from(start);

        for entry in &mut self.entries[start..end] {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            entry.step.before = solids.clone();

            if entry.suppressed {
                tracing::debug!(feature = %entry.feature_id, "Skipping suppressed node");
                entry.status = NodeStatus::Suppressed;
                entry.step.after = solids.clone();
                report.suppressed += 1;
                continue;
            }

            entry.instance.reset_for_pass();
            report.evaluated += 1;

            let tracker = TrackingKernel::new(kernel);
            let outcome = {
                let run = entry
                    .instance
                    .execute(&tracker, &entry.feature_id, &config, solids.clone());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = run => Some(result),
                }
            };
            let ledger = tracker.into_ledger();
            let outstanding = ledger.outstanding();
            entry.step.created = ledger.created;
            entry.step.consumed = ledger.consumed;

            let mut halt = false;
            match outcome {
                Some(Ok(next)) => {
                    entry.step.orphaned = outstanding.into_iter().filter(|s| !next.holds(s)).collect();
                    if !entry.step.orphaned.is_empty() {
                        tracing::warn!(
                            feature = %entry.feature_id,
                            orphaned = entry.step.orphaned.len(),
                            "Feature left solids outside the accumulated set"
                        );
                    }
                    tracing::debug!(
                        feature = %entry.feature_id,
                        solids = next.len(),
                        "Feature completed"
                    );
                    solids = next;
                    entry.status = NodeStatus::Completed;
                    report.completed += 1;
                }
                Some(Err(error))
                    if error.is_unresolved_target()
                        && config.unresolved_targets == UnresolvedTargetPolicy::SkipNode =>
                {
                    tracing::warn!(feature = %entry.feature_id, %error, "Skipping feature");
                    entry.step.orphaned = outstanding;
                    entry.status = NodeStatus::Skipped(error);
                    report.skipped += 1;
                }
                Some(Err(error)) => {
                    tracing::warn!(feature = %entry.feature_id, %error, "Feature failed");
                    entry.step.orphaned = outstanding;
                    entry.status = NodeStatus::Failed(error);
                    report.failed += 1;
                    halt = config.stop_on_failure;
                }
                None => {
                    tracing::warn!(feature = %entry.feature_id, "Feature cancelled");
                    entry.instance.mark_interrupted();
                    entry.step.orphaned = outstanding;
                    entry.status = NodeStatus::Cancelled;
                    report.cancelled = true;
                    halt = true;
                }
            }

            entry.step.after = solids.clone();
            let stale = entry.step.stale();
            if !stale.is_empty() {
                tracing::warn!(
                    feature = %entry.feature_id,
                    stale = stale.len(),
                    "Kernel consumed solids that remain in the accumulated set"
                );
            }
            if halt {
                break;
            }
        }

        self.solids = solids;
        report.solid_count = self.solids.len();
        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            solids = report.solid_count,
            "Part history evaluated"
        );
        report
    }

    /// Nodes whose most recent pass recorded an error
    pub fn failures(&self) -> impl Iterator<Item = (&str, &FeatureError)> {
        self.entries
            .iter()
            .filter_map(|e| e.status.error().map(|err| (e.feature_id.as_str(), err)))
    }

    fn require(&self, feature_id: &str) -> HistoryResult<usize> {
        self.index_of(feature_id)
            .ok_or_else(|| HistoryError::NodeNotFound(feature_id.to_owned()))
    }

    fn invalidate_from(&mut self, index: usize) {
        for entry in self.entries.iter_mut().skip(index) {
            entry.invalidate();
        }
    }

    fn next_feature_id(&mut self, short_name: &str) -> String {
        let counter = self.counters.entry(short_name.to_owned()).or_insert(0);
        *counter += 1;
        format!("{short_name}{counter}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryKernel;
    use crate::plugins::PrimitiveFeatureClass;
    use serde_json::json;

    fn sphere() -> Arc<dyn FeatureClass> {
        Arc::new(PrimitiveFeatureClass::sphere().unwrap())
    }

    fn overrides(value: serde_json::Value) -> Overrides {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_feature_ids_are_unique() {
        let mut history = PartHistory::new();
        let a = history.add_feature(sphere(), Overrides::new()).unwrap();
        let b = history.add_feature(sphere(), Overrides::new()).unwrap();
        history.remove_feature(&b).unwrap();
        let c = history.add_feature(sphere(), Overrides::new()).unwrap();

        assert_eq!(a, "P.S1");
        assert_eq!(b, "P.S2");
        assert_eq!(c, "P.S3");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_bad_overrides_rejected_on_add() {
        let mut history = PartHistory::new();
        let result = history.add_feature(sphere(), overrides(json!({ "radius": "big" })));
        assert!(matches!(result, Err(HistoryError::Binding(_))));
        assert!(history.is_empty());
    }

    #[test]
    fn test_rollback() {
        let mut history = PartHistory::new();
        let f1 = history.add_feature(sphere(), Overrides::new()).unwrap();
        history.add_feature(sphere(), Overrides::new()).unwrap();
        history.add_feature(sphere(), Overrides::new()).unwrap();

        assert_eq!(history.effective_len(), 3);

        history.rollback_to(&f1).unwrap();
        assert_eq!(history.effective_len(), 1);

        // New nodes land at the rollback point
        let inserted = history.add_feature(sphere(), Overrides::new()).unwrap();
        assert_eq!(history.index_of(&inserted), Some(1));
        assert_eq!(history.effective_len(), 2);

        history.rollback_to_end();
        assert_eq!(history.effective_len(), 4);
    }

    #[test]
    fn test_move_feature() {
        let mut history = PartHistory::new();
        let f1 = history.add_feature(sphere(), Overrides::new()).unwrap();
        let f2 = history.add_feature(sphere(), Overrides::new()).unwrap();

        history.move_feature(&f1, 1).unwrap();
        assert_eq!(history.index_of(&f2), Some(0));
        assert_eq!(
            history.move_feature(&f1, 5),
            Err(HistoryError::InvalidIndex(5))
        );
        assert_eq!(
            history.move_feature("nope", 0),
            Err(HistoryError::NodeNotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_edit_marks_later_nodes_pending() {
        let kernel = MemoryKernel::new();
        let mut history = PartHistory::new();
        let f1 = history.add_feature(sphere(), Overrides::new()).unwrap();
        let f2 = history.add_feature(sphere(), Overrides::new()).unwrap();

        let report = history.evaluate(&kernel).await;
        assert_eq!(report.completed, 2);

        history
            .set_overrides(&f1, overrides(json!({ "radius": 2 })))
            .unwrap();
        assert_eq!(history.get(&f1).unwrap().status(), &NodeStatus::Pending);
        assert_eq!(history.get(&f2).unwrap().status(), &NodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_set_overrides_keeps_node() {
        let mut history = PartHistory::new();
        let f1 = history
            .add_feature(sphere(), overrides(json!({ "radius": 3 })))
            .unwrap();

        let result = history.set_overrides(&f1, overrides(json!({ "radius": false })));
        assert!(result.is_err());

        let entry = history.get(&f1).unwrap();
        assert_eq!(entry.overrides().get("radius"), Some(&json!(3)));
        assert_eq!(
            entry.instance().params().and_then(|p| p.number("radius")),
            Some(3.0)
        );
    }

    #[tokio::test]
    async fn test_step_record_tracks_created_solids() {
        let kernel = MemoryKernel::new();
        let mut history = PartHistory::new();
        let f1 = history.add_feature(sphere(), Overrides::new()).unwrap();

        history.evaluate(&kernel).await;

        let step = history.get(&f1).unwrap().step();
        assert!(step.before.is_empty());
        assert_eq!(step.after.len(), 1);
        assert_eq!(step.created.len(), 1);
        assert!(step.orphaned.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_from_replays_when_inputs_were_consumed() {
        let kernel = MemoryKernel::new();
        let mut history = PartHistory::new();
        let f1 = history.add_feature(sphere(), Overrides::new()).unwrap();
        let f2 = history
            .add_feature(
                sphere(),
                overrides(json!({ "boolean": { "targets": [f1.clone()], "operation": "UNION" } })),
            )
            .unwrap();
        history.evaluate(&kernel).await;

        let report = history
            .evaluate_from(&f2, &kernel, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.completed, 2);
        assert_eq!(history.solids().keys().collect::<Vec<_>>(), vec![f2.as_str()]);
    }

    #[tokio::test]
    async fn test_failed_node_records_orphan() {
        let kernel = MemoryKernel::new();
        let mut history = PartHistory::new();
        let f1 = history
            .add_feature(
                sphere(),
                overrides(json!({ "boolean": { "targets": ["missing"], "operation": "UNION" } })),
            )
            .unwrap();

        let report = history.evaluate(&kernel).await;
        assert_eq!(report.failed, 1);

        let entry = history.get(&f1).unwrap();
        assert!(entry.status().is_missing_geometry());
        assert_eq!(entry.step().orphaned, entry.step().created);
        assert_eq!(entry.step().orphaned.len(), 1);
        assert!(history.solids().is_empty());
    }
}

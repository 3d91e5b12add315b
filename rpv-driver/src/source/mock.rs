//! Mock driver for testing.
//!
//! Allows declaring nodes and placements up front, forcing lookup failures,
//! and inspecting which volumes were looked up.

use super::{DriverError, ReplicaSource};
use async_trait::async_trait;
use rpv_core::{Labels, ReplicaAssignment};
use rpv_types::{LabelKey, LabelValue, NodeId, VolumeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory replica source.
///
/// Clones share state, so a test can keep a handle while the runner owns
/// another.
#[derive(Debug, Default)]
pub struct MockDriver {
    inner: Arc<Mutex<MockDriverInner>>,
}

#[derive(Debug, Default)]
struct MockDriverInner {
    nodes: BTreeMap<NodeId, Labels>,
    placements: BTreeMap<VolumeId, ReplicaAssignment>,
    failures: BTreeMap<VolumeId, String>,
    fail_next_lookup: Option<String>,
    fail_next_labels: Option<String>,
    lookups: Vec<VolumeId>,
}

impl MockDriver {
    /// Create an empty mock cluster.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockDriverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a node (or replace its labels).
    pub fn add_node<L, K, V>(&self, node: impl Into<NodeId>, labels: L)
    where
        L: IntoIterator<Item = (K, V)>,
        K: Into<LabelKey>,
        V: Into<LabelValue>,
    {
        let labels = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.lock().nodes.insert(node.into(), labels);
    }

    /// Add `count` unlabelled nodes named `{prefix}1..={prefix}{count}`.
    pub fn add_nodes(&self, prefix: &str, count: usize) {
        let mut inner = self.lock();
        for i in 1..=count {
            inner
                .nodes
                .entry(NodeId::new(format!("{}{}", prefix, i)))
                .or_default();
        }
    }

    /// Place a simple volume on `nodes`.
    pub fn place<I, N>(&self, volume: impl Into<VolumeId>, nodes: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.place_groups(volume, ReplicaAssignment::flat(nodes));
    }

    /// Record an arbitrary assignment for a volume.
    pub fn place_groups(&self, volume: impl Into<VolumeId>, assignment: ReplicaAssignment) {
        let volume = volume.into();
        let mut inner = self.lock();
        inner.failures.remove(&volume);
        inner.placements.insert(volume, assignment);
    }

    /// Make every lookup of `volume` fail with `reason`.
    pub fn fail_lookup(&self, volume: impl Into<VolumeId>, reason: &str) {
        self.lock()
            .failures
            .insert(volume.into(), reason.to_string());
    }

    /// Cause the next replica lookup (any volume) to fail with the given error.
    pub fn fail_next_lookup(&self, error: &str) {
        self.lock().fail_next_lookup = Some(error.to_string());
    }

    /// Cause the next `node_labels()` call to fail with the given error.
    pub fn fail_next_labels(&self, error: &str) {
        self.lock().fail_next_labels = Some(error.to_string());
    }

    /// Volumes looked up so far, in call order.
    pub fn lookups(&self) -> Vec<VolumeId> {
        self.lock().lookups.clone()
    }

    /// Node names in order.
    pub fn node_names(&self) -> Vec<NodeId> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Clear all state (nodes, placements, forced failures).
    pub fn reset(&self) {
        *self.lock() = MockDriverInner::default();
    }
}

impl Clone for MockDriver {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ReplicaSource for MockDriver {
    async fn node_labels(&self) -> Result<BTreeMap<NodeId, Labels>, DriverError> {
        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_labels.take() {
            return Err(DriverError::LookupFailed(error));
        }

        Ok(inner.nodes.clone())
    }

    async fn volumes(&self) -> Result<Vec<VolumeId>, DriverError> {
        let inner = self.lock();
        let names: BTreeSet<VolumeId> = inner
            .placements
            .keys()
            .chain(inner.failures.keys())
            .cloned()
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn replica_groups(&self, volume: &VolumeId) -> Result<ReplicaAssignment, DriverError> {
        let mut inner = self.lock();
        inner.lookups.push(volume.clone());

        // Check for forced failure
        if let Some(error) = inner.fail_next_lookup.take() {
            return Err(DriverError::LookupFailed(error));
        }
        if let Some(reason) = inner.failures.get(volume) {
            return Err(DriverError::LookupFailed(reason.clone()));
        }

        inner
            .placements
            .get(volume)
            .cloned()
            .ok_or_else(|| DriverError::UnknownVolume(volume.clone()))
    }
}

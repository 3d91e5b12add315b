//! Point-in-time capture of a cluster.
//!
//! The verifier never re-polls, so everything it looks at is read here
//! first: node labels and the placement of every volume of interest.

use crate::source::{DriverError, ReplicaSource};
use rpv_core::{Labels, Observed, TopologyIndex};
use rpv_types::{NodeId, VolumeId};
use std::collections::BTreeMap;

/// Labels and placements read from a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Node → labels, for every node.
    pub labels: BTreeMap<NodeId, Labels>,
    /// Volume → assignment, or the reason its lookup failed.
    pub assignments: BTreeMap<VolumeId, Observed>,
}

impl Snapshot {
    /// Build the topology index for this snapshot's labels.
    pub fn topology(&self) -> TopologyIndex {
        TopologyIndex::build(self.labels.clone())
    }

    /// Replace the node labels, keeping the placements.
    pub fn with_labels(mut self, labels: BTreeMap<NodeId, Labels>) -> Self {
        self.labels = labels;
        self
    }

    /// Observation for one volume, if it was captured.
    pub fn assignment(&self, volume: &VolumeId) -> Option<&Observed> {
        self.assignments.get(volume)
    }
}

/// Read labels and the placement of each of `volumes` from `source`.
///
/// A failed node listing aborts the capture. A failed replica lookup is
/// recorded in the snapshot; whether it matters is up to the verifier.
pub async fn capture<S, I>(source: &S, volumes: I) -> Result<Snapshot, DriverError>
where
    S: ReplicaSource + ?Sized,
    I: IntoIterator<Item = VolumeId>,
{
    let labels = source.node_labels().await?;
    let assignments = capture_assignments(source, volumes).await;

    tracing::info!(
        "Captured snapshot: {} nodes, {} volumes",
        labels.len(),
        assignments.len()
    );

    Ok(Snapshot {
        labels,
        assignments,
    })
}

/// Look up the placement of each of `volumes`, once per volume.
pub async fn capture_assignments<S, I>(source: &S, volumes: I) -> BTreeMap<VolumeId, Observed>
where
    S: ReplicaSource + ?Sized,
    I: IntoIterator<Item = VolumeId>,
{
    let mut assignments = BTreeMap::new();
    for volume in volumes {
        if assignments.contains_key(&volume) {
            continue;
        }
        let observed = match source.replica_groups(&volume).await {
            Ok(assignment) => {
                tracing::debug!(
                    "Volume '{}' has {} replicas",
                    volume,
                    assignment.replica_count()
                );
                Ok(assignment)
            }
            Err(e) => {
                tracing::debug!("Lookup of volume '{}' failed: {}", volume, e);
                Err(e.to_string())
            }
        };
        assignments.insert(volume, observed);
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockDriver;

    #[tokio::test]
    async fn capture_records_failures_as_data() {
        let driver = MockDriver::new();
        driver.add_node("n1", [("zone", "east")]);
        driver.place("placed", ["n1"]);

        let snapshot = capture(&driver, [VolumeId::new("placed"), VolumeId::new("pending")])
            .await
            .unwrap();

        assert!(snapshot.assignment(&VolumeId::new("placed")).unwrap().is_ok());
        let pending = snapshot.assignment(&VolumeId::new("pending")).unwrap();
        assert_eq!(pending, &Err("volume not found: pending".to_string()));
        assert_eq!(snapshot.topology().len(), 1);
    }

    #[tokio::test]
    async fn capture_fails_when_nodes_unavailable() {
        let driver = MockDriver::new();
        driver.fail_next_labels("forbidden");
        let result = capture(&driver, Vec::new()).await;
        assert!(matches!(result, Err(DriverError::LookupFailed(_))));
    }

    #[tokio::test]
    async fn capture_looks_up_each_volume_once() {
        let driver = MockDriver::new();
        driver.place("v", ["n1"]);
        let snapshot = capture(&driver, [VolumeId::new("v"), VolumeId::new("v")])
            .await
            .unwrap();
        assert_eq!(snapshot.assignments.len(), 1);
        assert_eq!(driver.lookups().len(), 1);
    }

    #[tokio::test]
    async fn capture_through_trait_object() {
        let driver = MockDriver::new();
        driver.place("v", ["n1"]);
        let source: &dyn ReplicaSource = &driver;
        let snapshot = capture(source, [VolumeId::new("v")]).await.unwrap();
        assert_eq!(snapshot.assignments.len(), 1);
    }

    #[tokio::test]
    async fn capture_assignments_skips_labels() {
        let driver = MockDriver::new();
        driver.fail_next_labels("forbidden");
        driver.place("v", ["n1"]);
        let assignments = capture_assignments(&driver, [VolumeId::new("v")]).await;
        assert!(assignments[&VolumeId::new("v")].is_ok());
    }

    #[test]
    fn with_labels_keeps_assignments() {
        let mut snapshot = Snapshot::default();
        snapshot
            .assignments
            .insert(VolumeId::new("v"), Err("gone".to_string()));
        let snapshot = snapshot.with_labels(BTreeMap::from([(NodeId::new("n1"), Labels::new())]));
        assert_eq!(snapshot.labels.len(), 1);
        assert_eq!(snapshot.assignments.len(), 1);
    }
}

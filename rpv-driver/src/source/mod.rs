//! Replica source abstraction.
//!
//! A source answers two questions about a cluster: which labels each node
//! carries, and which nodes hold replicas of a volume.
//!
//! # Design
//!
//! The trait is async because real sources sit behind an API server:
//! - `node_labels()` returns every node, labelled or not
//! - `volumes()` lists the volumes the source knows about
//! - `replica_groups()` returns the per-group placement of one volume
//! - `replica_nodes()` flattens that to a node set
//!
//! An error from a replica lookup is not necessarily fatal: a volume that was
//! expected to stay unplaced usually cannot be found at all.

mod file;
mod mock;

pub use file::SnapshotDriver;
pub use mock::MockDriver;

use async_trait::async_trait;
use rpv_core::{AssignmentError, Labels, ReplicaAssignment};
use rpv_types::{NodeId, VolumeId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The source has no record of the volume.
    #[error("volume not found: {0}")]
    UnknownVolume(VolumeId),

    /// The lookup failed for another reason.
    #[error("lookup failed: {0}")]
    LookupFailed(String),

    /// Snapshot file could not be read.
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file is not valid JSON of the expected shape.
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A recorded placement is not a valid assignment.
    #[error("invalid placement for volume {volume}: {source}")]
    InvalidPlacement {
        /// The volume.
        volume: VolumeId,
        /// Why the placement was rejected.
        #[source]
        source: AssignmentError,
    },
}

/// Source of node labels and replica placements.
#[async_trait]
pub trait ReplicaSource: Send + Sync {
    /// Labels of every node in the cluster.
    async fn node_labels(&self) -> Result<BTreeMap<NodeId, Labels>, DriverError>;

    /// Volumes known to the source, in name order.
    async fn volumes(&self) -> Result<Vec<VolumeId>, DriverError>;

    /// Placement of one volume, one node set per replica group.
    async fn replica_groups(&self, volume: &VolumeId) -> Result<ReplicaAssignment, DriverError>;

    /// Nodes holding any replica of one volume.
    async fn replica_nodes(&self, volume: &VolumeId) -> Result<BTreeSet<NodeId>, DriverError> {
        Ok(self.replica_groups(volume).await?.nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_volume() {
        let err = DriverError::UnknownVolume(VolumeId::new("pvc-1"));
        assert_eq!(err.to_string(), "volume not found: pvc-1");

        let err = DriverError::InvalidPlacement {
            volume: VolumeId::new("pvc-2"),
            source: AssignmentError::DuplicateNode {
                group: 0,
                node: NodeId::new("n1"),
            },
        };
        assert!(err.to_string().starts_with("invalid placement for volume pvc-2"));
    }

    #[test]
    fn source_is_object_safe() {
        fn assert_object(_: &dyn ReplicaSource) {}
        assert_object(&MockDriver::new());
    }
}

//! Replica source backed by a JSON cluster snapshot.
//!
//! ```json
//! {
//!   "nodes": { "n1": { "zone": "east" }, "n2": {} },
//!   "volumes": {
//!     "pvc-a": [["n1", "n2"]],
//!     "pvc-b": ["n1"]
//!   }
//! }
//! ```
//!
//! A volume maps either to a flat node list or to a list of replica groups.
//! Volumes absent from the file are reported as not found.

use super::{DriverError, ReplicaSource};
use async_trait::async_trait;
use rpv_core::{Labels, ReplicaAssignment};
use rpv_types::{NodeId, VolumeId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Placement {
    Groups(Vec<Vec<NodeId>>),
    Flat(Vec<NodeId>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    nodes: BTreeMap<NodeId, Labels>,
    #[serde(default)]
    volumes: BTreeMap<VolumeId, Placement>,
}

/// Read-only source loaded from a snapshot file.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDriver {
    nodes: BTreeMap<NodeId, Labels>,
    placements: BTreeMap<VolumeId, ReplicaAssignment>,
}

impl SnapshotDriver {
    /// Parse a snapshot from JSON text.
    pub fn from_json(json: &str) -> Result<Self, DriverError> {
        let file: SnapshotFile = serde_json::from_str(json)?;

        let mut placements = BTreeMap::new();
        for (volume, placement) in file.volumes {
            let groups = match placement {
                Placement::Flat(nodes) => vec![nodes],
                Placement::Groups(groups) => groups,
            };
            let assignment = ReplicaAssignment::grouped(groups).map_err(|source| {
                DriverError::InvalidPlacement {
                    volume: volume.clone(),
                    source,
                }
            })?;
            placements.insert(volume, assignment);
        }

        tracing::debug!(
            "Loaded snapshot: {} nodes, {} volumes",
            file.nodes.len(),
            placements.len()
        );

        Ok(Self {
            nodes: file.nodes,
            placements,
        })
    }

    /// Load a snapshot file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[async_trait]
impl ReplicaSource for SnapshotDriver {
    async fn node_labels(&self) -> Result<BTreeMap<NodeId, Labels>, DriverError> {
        Ok(self.nodes.clone())
    }

    async fn volumes(&self) -> Result<Vec<VolumeId>, DriverError> {
        Ok(self.placements.keys().cloned().collect())
    }

    async fn replica_groups(&self, volume: &VolumeId) -> Result<ReplicaAssignment, DriverError> {
        self.placements
            .get(volume)
            .cloned()
            .ok_or_else(|| DriverError::UnknownVolume(volume.clone()))
    }
}

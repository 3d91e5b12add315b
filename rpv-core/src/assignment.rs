//! Observed replica placement for one volume.

use rpv_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors constructing a [`ReplicaAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    /// A node was listed twice within one replica group.
    #[error("node {node} appears more than once in replica group {group}")]
    DuplicateNode {
        /// Index of the offending group.
        group: usize,
        /// The repeated node.
        node: NodeId,
    },
}

/// Nodes currently holding replicas of a volume.
///
/// Simple volumes have a single group. Aggregated volumes have one group per
/// replica set, and each group must satisfy spreading rules on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaAssignment {
    groups: Vec<BTreeSet<NodeId>>,
}

impl ReplicaAssignment {
    /// A single-group assignment. Repeated nodes collapse.
    pub fn flat<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let group: BTreeSet<NodeId> = nodes.into_iter().map(Into::into).collect();
        if group.is_empty() {
            return Self::default();
        }
        Self { groups: vec![group] }
    }

    /// An assignment with one node list per replica group, in group order.
    ///
    /// Fails if a node is listed twice within the same group. Empty groups are
    /// dropped.
    pub fn grouped<G, I, N>(groups: G) -> Result<Self, AssignmentError>
    where
        G: IntoIterator<Item = I>,
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let mut out = Vec::new();
        for (index, nodes) in groups.into_iter().enumerate() {
            let mut group = BTreeSet::new();
            for node in nodes {
                let node = node.into();
                if group.contains(&node) {
                    return Err(AssignmentError::DuplicateNode { group: index, node });
                }
                group.insert(node);
            }
            if !group.is_empty() {
                out.push(group);
            }
        }
        Ok(Self { groups: out })
    }

    /// Replica groups in order.
    pub fn groups(&self) -> &[BTreeSet<NodeId>] {
        &self.groups
    }

    /// Union of all groups.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.groups.iter().flatten().cloned().collect()
    }

    /// Whether any replica lives on `node`.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.groups.iter().any(|group| group.contains(node))
    }

    /// Whether the volume has no replica anywhere (not provisioned).
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of replicas across groups.
    pub fn replica_count(&self) -> usize {
        self.groups.iter().map(BTreeSet::len).sum()
    }
}

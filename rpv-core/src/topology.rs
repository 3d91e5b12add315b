//! Topology index: (label key, label value) → nodes sharing that pair.
//!
//! Every topology-aware rule partitions the cluster through this index. It is
//! built once from a node→labels snapshot and never mutated afterwards.

use rpv_types::{Domain, LabelKey, LabelValue, NodeId};
use std::collections::{BTreeMap, BTreeSet};

/// Labels carried by one node.
pub type Labels = BTreeMap<LabelKey, LabelValue>;

static EMPTY: BTreeSet<NodeId> = BTreeSet::new();

/// Immutable index of the cluster's topology domains.
///
/// Sorted maps are used throughout so that two indexes built from equal input
/// compare equal regardless of the order the input was supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyIndex {
    nodes: BTreeMap<NodeId, Labels>,
    domains: BTreeMap<LabelKey, BTreeMap<LabelValue, BTreeSet<NodeId>>>,
}

impl TopologyIndex {
    /// Build an index from a node → labels mapping.
    ///
    /// Nodes without labels are still part of the node universe; they simply
    /// belong to no domain. A node listed twice has its labels merged, later
    /// entries winning.
    pub fn build<I, L, K, V>(node_labels: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, L)>,
        L: IntoIterator<Item = (K, V)>,
        K: Into<LabelKey>,
        V: Into<LabelValue>,
    {
        let mut nodes: BTreeMap<NodeId, Labels> = BTreeMap::new();
        for (node, labels) in node_labels {
            let entry = nodes.entry(node).or_default();
            for (key, value) in labels {
                entry.insert(key.into(), value.into());
            }
        }

        let mut domains: BTreeMap<LabelKey, BTreeMap<LabelValue, BTreeSet<NodeId>>> =
            BTreeMap::new();
        for (node, labels) in &nodes {
            for (key, value) in labels {
                domains
                    .entry(key.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default()
                    .insert(node.clone());
            }
        }

        tracing::debug!(
            "Built topology index: {} nodes, {} label keys",
            nodes.len(),
            domains.len()
        );

        Self { nodes, domains }
    }

    /// Nodes sharing `key=value`. Empty if the pair was never seen.
    pub fn domain_nodes(&self, key: &str, value: &str) -> &BTreeSet<NodeId> {
        self.domains
            .get(key)
            .and_then(|values| values.get(value))
            .unwrap_or(&EMPTY)
    }

    /// Nodes of a [`Domain`]. Empty if the domain was never seen.
    pub fn domain(&self, domain: &Domain) -> &BTreeSet<NodeId> {
        self.domain_nodes(domain.key.as_str(), domain.value.as_str())
    }

    /// All domains of one topology key, in value order.
    pub fn domains<'a>(
        &'a self,
        key: &'a LabelKey,
    ) -> impl Iterator<Item = (Domain, &'a BTreeSet<NodeId>)> + 'a {
        self.domains
            .get(key)
            .into_iter()
            .flat_map(move |values| {
                values
                    .iter()
                    .map(move |(value, nodes)| (Domain::new(key.clone(), value.clone()), nodes))
            })
    }

    /// The domain of `key` that `node` belongs to, if the node carries that key.
    pub fn domain_of(&self, node: &NodeId, key: &LabelKey) -> Option<Domain> {
        self.nodes
            .get(node)
            .and_then(|labels| labels.get(key))
            .map(|value| Domain::new(key.clone(), value.clone()))
    }

    /// Labels of a node, if the node is known.
    pub fn labels_of(&self, node: &NodeId) -> Option<&Labels> {
        self.nodes.get(node)
    }

    /// Every node in the snapshot, labelled or not.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Every label key seen on at least one node.
    pub fn keys(&self) -> impl Iterator<Item = &LabelKey> {
        self.domains.keys()
    }

    /// Whether a node is part of the snapshot.
    pub fn contains_node(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Number of nodes in the snapshot.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

//! Declarative placement constraints.
//!
//! A [`ConstraintSpec`] is built once per rule case from the cluster topology
//! and the case's rule inputs, then handed to the verifier unchanged. Both it
//! and [`VolumeConstraints`] deserialize from TOML/JSON so ad-hoc constraint
//! files can be checked without writing a rule case.

use rpv_types::{LabelKey, LabelValue, NodeId, VolumeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::topology::TopologyIndex;

/// Whether a volume is expected to be provisioned at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Expectation {
    /// The volume must have replicas that satisfy every constraint.
    #[default]
    Placed,
    /// The constraints are unsatisfiable; the volume must stay unplaced.
    Pending,
}

/// Expected replica layout of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyClass {
    /// Replicas per group.
    pub replication_factor: usize,
    /// Number of replica groups (1 for simple volumes).
    #[serde(default = "default_aggregation_level")]
    pub aggregation_level: usize,
}

fn default_aggregation_level() -> usize {
    1
}

impl RedundancyClass {
    /// A simple volume with `replication_factor` replicas.
    pub fn replicated(replication_factor: usize) -> Self {
        Self {
            replication_factor,
            aggregation_level: 1,
        }
    }

    /// An aggregated volume: `aggregation_level` groups of
    /// `replication_factor` replicas each.
    pub fn aggregated(replication_factor: usize, aggregation_level: usize) -> Self {
        Self {
            replication_factor,
            aggregation_level,
        }
    }
}

/// One allowed domain for topology affinity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CandidateDomain {
    /// A labelled domain, resolved through the topology index at check time.
    Label {
        /// Topology key.
        key: LabelKey,
        /// Label value.
        value: LabelValue,
    },
    /// An explicit node set, e.g. the result of a label selector.
    Nodes {
        /// Name used in diagnostics.
        name: String,
        /// Member nodes.
        nodes: BTreeSet<NodeId>,
    },
}

impl CandidateDomain {
    /// A labelled candidate domain.
    pub fn label(key: impl Into<LabelKey>, value: impl Into<LabelValue>) -> Self {
        Self::Label {
            key: key.into(),
            value: value.into(),
        }
    }

    /// An explicit candidate node set.
    pub fn nodes<I, N>(name: impl Into<String>, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        Self::Nodes {
            name: name.into(),
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }

    /// Node set of this candidate.
    pub fn resolve<'a>(&'a self, topology: &'a TopologyIndex) -> &'a BTreeSet<NodeId> {
        match self {
            Self::Label { key, value } => topology.domain_nodes(key.as_str(), value.as_str()),
            Self::Nodes { nodes, .. } => nodes,
        }
    }

    /// Name used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Label { key, value } => format!("{}={}", key, value),
            Self::Nodes { name, .. } => name.clone(),
        }
    }
}

/// All replicas must fall inside one of the candidate domains.
///
/// Candidates are tried in declaration order; the first that contains every
/// replica wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityConstraint {
    /// Candidate domains in declaration order.
    pub candidates: Vec<CandidateDomain>,
}

/// No two replicas of one group may share a domain of `topology_key`, and
/// each group must occupy exactly `replication_factor` domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadConstraint {
    /// Key partitioning the nodes into domains.
    pub topology_key: LabelKey,
    /// Expected layout.
    pub redundancy: RedundancyClass,
}

/// How two volumes' placements relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    /// The dependent volume lives where the peer lives.
    Coincide,
    /// The dependent volume never lives where the peer lives.
    Exclude,
}

/// Granularity of a cross-volume relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RelationScope {
    /// Compare node sets directly.
    #[default]
    Node,
    /// Compare the domains of `key` the volumes occupy.
    Domain {
        /// Topology key.
        key: LabelKey,
    },
}

/// A relation between the constrained volume and a peer volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossVolumeConstraint {
    /// The reference volume.
    pub peer: VolumeId,
    /// Required relation.
    pub relation: Relation,
    /// Node or domain granularity.
    #[serde(default)]
    pub scope: RelationScope,
}

/// Every constraint declared for one volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeConstraints {
    #[serde(default)]
    required: BTreeSet<NodeId>,
    #[serde(default)]
    preferred: BTreeSet<NodeId>,
    #[serde(default)]
    excluded: BTreeSet<NodeId>,
    #[serde(default)]
    affinity: Vec<AffinityConstraint>,
    #[serde(default)]
    spread: Vec<SpreadConstraint>,
    #[serde(default)]
    cross_volume: Vec<CrossVolumeConstraint>,
    #[serde(default)]
    expectation: Expectation,
}

impl VolumeConstraints {
    /// Start building constraints for a volume.
    pub fn builder() -> VolumeConstraintsBuilder {
        VolumeConstraintsBuilder::default()
    }

    /// Nodes that must each host a replica.
    pub fn required(&self) -> &BTreeSet<NodeId> {
        &self.required
    }

    /// Nodes that should host a replica (never fails).
    pub fn preferred(&self) -> &BTreeSet<NodeId> {
        &self.preferred
    }

    /// Nodes that must not host a replica.
    pub fn excluded(&self) -> &BTreeSet<NodeId> {
        &self.excluded
    }

    /// Topology affinity rules.
    pub fn affinity(&self) -> &[AffinityConstraint] {
        &self.affinity
    }

    /// Topology anti-affinity rules.
    pub fn spread(&self) -> &[SpreadConstraint] {
        &self.spread
    }

    /// Relations to other volumes.
    pub fn cross_volume(&self) -> &[CrossVolumeConstraint] {
        &self.cross_volume
    }

    /// Whether the volume should be placed at all.
    pub fn expectation(&self) -> Expectation {
        self.expectation
    }

    /// Peers referenced by cross-volume rules.
    pub fn peers(&self) -> impl Iterator<Item = &VolumeId> {
        self.cross_volume.iter().map(|c| &c.peer)
    }
}

/// Consuming builder for [`VolumeConstraints`].
#[derive(Debug, Default)]
pub struct VolumeConstraintsBuilder {
    inner: VolumeConstraints,
}

impl VolumeConstraintsBuilder {
    /// Require a replica on each of `nodes`.
    pub fn require<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.inner.required.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Prefer a replica on each of `nodes`.
    pub fn prefer<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.inner.preferred.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Forbid replicas on each of `nodes`.
    pub fn exclude<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.inner.excluded.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Confine all replicas to the first matching candidate domain.
    pub fn affinity(mut self, candidates: impl IntoIterator<Item = CandidateDomain>) -> Self {
        self.inner.affinity.push(AffinityConstraint {
            candidates: candidates.into_iter().collect(),
        });
        self
    }

    /// Confine all replicas to any single domain of `key`, trying domains in
    /// value order.
    pub fn affinity_any(self, key: impl Into<LabelKey>, topology: &TopologyIndex) -> Self {
        let key = key.into();
        let candidates: Vec<CandidateDomain> = topology
            .domains(&key)
            .map(|(domain, _)| CandidateDomain::Label {
                key: domain.key,
                value: domain.value,
            })
            .collect();
        self.affinity(candidates)
    }

    /// Spread replicas across domains of `key`.
    pub fn spread(mut self, key: impl Into<LabelKey>, redundancy: RedundancyClass) -> Self {
        self.inner.spread.push(SpreadConstraint {
            topology_key: key.into(),
            redundancy,
        });
        self
    }

    /// Replicas must land on nodes hosting `peer`.
    pub fn coincide_with(self, peer: impl Into<VolumeId>) -> Self {
        self.relate(peer, Relation::Coincide, RelationScope::Node)
    }

    /// Replicas must never share a node with `peer`.
    pub fn exclude_from(self, peer: impl Into<VolumeId>) -> Self {
        self.relate(peer, Relation::Exclude, RelationScope::Node)
    }

    /// Both volumes must sit together inside one domain of `key`.
    pub fn coincide_in_domain(self, peer: impl Into<VolumeId>, key: impl Into<LabelKey>) -> Self {
        self.relate(
            peer,
            Relation::Coincide,
            RelationScope::Domain { key: key.into() },
        )
    }

    /// The volumes must never share a domain of `key`.
    pub fn exclude_from_domain(self, peer: impl Into<VolumeId>, key: impl Into<LabelKey>) -> Self {
        self.relate(
            peer,
            Relation::Exclude,
            RelationScope::Domain { key: key.into() },
        )
    }

    fn relate(mut self, peer: impl Into<VolumeId>, relation: Relation, scope: RelationScope) -> Self {
        self.inner.cross_volume.push(CrossVolumeConstraint {
            peer: peer.into(),
            relation,
            scope,
        });
        self
    }

    /// The volume is expected to remain unplaced.
    pub fn expect_pending(mut self) -> Self {
        self.inner.expectation = Expectation::Pending;
        self
    }

    /// Finish building.
    pub fn build(self) -> VolumeConstraints {
        self.inner
    }
}

/// Constraints for every volume of a rule case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    #[serde(default)]
    volumes: BTreeMap<VolumeId, VolumeConstraints>,
}

impl ConstraintSpec {
    /// An empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the constraints of one volume.
    pub fn with_volume(mut self, volume: impl Into<VolumeId>, constraints: VolumeConstraints) -> Self {
        self.volumes.insert(volume.into(), constraints);
        self
    }

    /// Constraints of one volume.
    pub fn get(&self, volume: &VolumeId) -> Option<&VolumeConstraints> {
        self.volumes.get(volume)
    }

    /// Constrained volumes in name order.
    pub fn volumes(&self) -> impl Iterator<Item = (&VolumeId, &VolumeConstraints)> {
        self.volumes.iter()
    }

    /// Constrained volumes plus every peer they reference.
    pub fn referenced_volumes(&self) -> BTreeSet<VolumeId> {
        let mut out: BTreeSet<VolumeId> = self.volumes.keys().cloned().collect();
        for constraints in self.volumes.values() {
            out.extend(constraints.peers().cloned());
        }
        out
    }

    /// Number of constrained volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Whether no volume is constrained.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_node_sets() {
        let constraints = VolumeConstraints::builder()
            .require(["n1", "n2"])
            .require(["n3"])
            .prefer(["n4"])
            .exclude(["n5"])
            .build();
        assert_eq!(constraints.required().len(), 3);
        assert_eq!(constraints.preferred().len(), 1);
        assert!(constraints.excluded().contains(&NodeId::new("n5")));
        assert_eq!(constraints.expectation(), Expectation::Placed);
    }

    #[test]
    fn affinity_any_expands_domains_in_value_order() {
        let topology = TopologyIndex::build(vec![
            (NodeId::new("n1"), vec![("zone", "west")]),
            (NodeId::new("n2"), vec![("zone", "east")]),
        ]);
        let constraints = VolumeConstraints::builder()
            .affinity_any("zone", &topology)
            .build();
        let names: Vec<String> = constraints.affinity()[0]
            .candidates
            .iter()
            .map(CandidateDomain::describe)
            .collect();
        assert_eq!(names, vec!["zone=east", "zone=west"]);
    }

    #[test]
    fn referenced_volumes_include_peers() {
        let spec = ConstraintSpec::new()
            .with_volume("b", VolumeConstraints::builder().coincide_with("a").build())
            .with_volume("c", VolumeConstraints::builder().exclude_from("d").build());
        let names: Vec<String> = spec
            .referenced_volumes()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn candidate_resolves_through_topology() {
        let topology = TopologyIndex::build(vec![(NodeId::new("n1"), vec![("zone", "east")])]);
        let label = CandidateDomain::label("zone", "east");
        assert_eq!(label.resolve(&topology).len(), 1);
        let missing = CandidateDomain::label("zone", "north");
        assert!(missing.resolve(&topology).is_empty());
        let explicit = CandidateDomain::nodes("fast", ["n7", "n8"]);
        assert_eq!(explicit.resolve(&topology).len(), 2);
        assert_eq!(explicit.describe(), "fast");
    }

    #[test]
    fn spec_from_toml() {
        let text = r#"
[volumes.mysql-data]
required = ["n1", "n2"]
excluded = ["n9"]

[[volumes.mysql-data.spread]]
topology_key = "zone"
redundancy = { replication_factor = 3 }

[[volumes.mysql-data.affinity]]
candidates = [
    { kind = "label", key = "zone", value = "east" },
    { kind = "nodes", name = "fast", nodes = ["n1", "n2"] },
]

[volumes.mysql-data-seq]
expectation = "placed"

[[volumes.mysql-data-seq.cross_volume]]
peer = "mysql-data"
relation = "exclude"
scope = { kind = "domain", key = "zone" }
"#;
        let spec: ConstraintSpec = toml::from_str(text).unwrap();
        assert_eq!(spec.len(), 2);

        let data = spec.get(&VolumeId::new("mysql-data")).unwrap();
        assert_eq!(data.required().len(), 2);
        assert_eq!(data.spread()[0].redundancy, RedundancyClass::replicated(3));
        assert_eq!(data.affinity()[0].candidates.len(), 2);

        let seq = spec.get(&VolumeId::new("mysql-data-seq")).unwrap();
        assert_eq!(seq.cross_volume()[0].relation, Relation::Exclude);
        assert_eq!(
            seq.cross_volume()[0].scope,
            RelationScope::Domain {
                key: LabelKey::new("zone")
            }
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let text = r#"
[volumes.v]
requird = ["n1"]
"#;
        assert!(toml::from_str::<ConstraintSpec>(text).is_err());
    }
}

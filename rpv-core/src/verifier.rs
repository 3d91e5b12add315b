//! The placement verifier.
//!
//! Evaluates one volume's constraints against its observed assignment, in a
//! fixed order: required, excluded, preferred, affinity, spreading,
//! cross-volume. Every failure is accumulated; nothing short-circuits.

use rpv_types::{Domain, LabelKey, NodeId, VolumeId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::assignment::ReplicaAssignment;
use crate::constraint::{
    AffinityConstraint, ConstraintSpec, CrossVolumeConstraint, Expectation, Relation,
    RelationScope, SpreadConstraint, VolumeConstraints,
};
use crate::topology::TopologyIndex;
use crate::verdict::{CandidateReport, Note, Verdict, Violation};

/// An observed assignment, or the reason the lookup failed.
pub type Observed = Result<ReplicaAssignment, String>;

/// Problems with the verifier's inputs, as opposed to constraint violations.
///
/// A caller should treat these as provisioning failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InputError {
    /// The volume was expected to be placed but has no replicas.
    #[error("volume {volume} has no replicas")]
    EmptyAssignment {
        /// The volume.
        volume: VolumeId,
    },

    /// The replica lookup itself failed.
    #[error("replica lookup for volume {volume} failed: {reason}")]
    Lookup {
        /// The volume.
        volume: VolumeId,
        /// Reason reported by the source.
        reason: String,
    },

    /// A cross-volume rule names a peer whose assignment was not supplied.
    #[error("volume {volume} is related to {peer}, but no assignment for {peer} was supplied")]
    MissingPeer {
        /// The dependent volume.
        volume: VolumeId,
        /// The missing reference volume.
        peer: VolumeId,
    },

    /// Single-peer checking was used for a volume related to several peers.
    #[error("volume {volume} is related to more than one peer volume")]
    AmbiguousPeer {
        /// The dependent volume.
        volume: VolumeId,
    },
}

/// Check one volume.
///
/// `other` is the peer assignment for cross-volume rules; every rule is
/// evaluated against it, so use [`Verifier::check_volume`] when a volume
/// relates to more than one peer.
///
/// An empty `assignment` is an [`InputError::EmptyAssignment`] unless the
/// constraints expect the volume to stay pending, in which case it passes and
/// any replica at all is a violation.
pub fn check(
    volume: &VolumeId,
    constraints: &VolumeConstraints,
    assignment: &ReplicaAssignment,
    topology: &TopologyIndex,
    other: Option<&ReplicaAssignment>,
) -> Result<Verdict, InputError> {
    let mut resolved = BTreeMap::new();
    if constraints.expectation() == Expectation::Pending {
        return evaluate(volume, constraints, assignment, topology, &resolved);
    }
    let peers: BTreeSet<&VolumeId> = constraints.peers().collect();
    match (peers.len(), other) {
        (0, _) => {}
        (1, Some(peer_assignment)) => {
            for peer in peers {
                resolved.insert(peer.clone(), peer_assignment);
            }
        }
        (1, None) => {
            let peer = peers.into_iter().next().cloned().unwrap_or_else(|| volume.clone());
            return Err(InputError::MissingPeer {
                volume: volume.clone(),
                peer,
            });
        }
        _ => {
            return Err(InputError::AmbiguousPeer {
                volume: volume.clone(),
            })
        }
    }
    evaluate(volume, constraints, assignment, topology, &resolved)
}

/// Check one volume from a lookup that may have failed.
///
/// A failed lookup passes for a pending volume and is an
/// [`InputError::Lookup`] otherwise.
pub fn check_observed(
    volume: &VolumeId,
    constraints: &VolumeConstraints,
    observed: &Observed,
    topology: &TopologyIndex,
    other: Option<&ReplicaAssignment>,
) -> Result<Verdict, InputError> {
    match observed {
        Ok(assignment) => check(volume, constraints, assignment, topology, other),
        Err(reason) => lookup_failed(volume, constraints, reason),
    }
}

fn lookup_failed(
    volume: &VolumeId,
    constraints: &VolumeConstraints,
    reason: &str,
) -> Result<Verdict, InputError> {
    match constraints.expectation() {
        Expectation::Pending => {
            tracing::info!("Volume '{}' remained pending: {}", volume, reason);
            let mut verdict = Verdict::new(volume.clone());
            verdict.note(Note::RemainedPending {
                reason: Some(reason.to_string()),
            });
            Ok(verdict)
        }
        Expectation::Placed => Err(InputError::Lookup {
            volume: volume.clone(),
            reason: reason.to_string(),
        }),
    }
}

/// Outcome for one volume of a [`Verifier::check_all`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeReport {
    /// The checked volume.
    pub volume: VolumeId,
    /// Verdict, or the input error that prevented checking.
    pub outcome: Result<Verdict, InputError>,
}

impl VolumeReport {
    /// Whether the volume was checked and passed.
    pub fn passed(&self) -> bool {
        matches!(&self.outcome, Ok(verdict) if verdict.passed())
    }
}

/// Verifier bound to one topology snapshot.
///
/// Holds only a shared reference; it can be used from several threads at once.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    topology: &'a TopologyIndex,
}

impl<'a> Verifier<'a> {
    /// Bind to a topology.
    pub fn new(topology: &'a TopologyIndex) -> Self {
        Self { topology }
    }

    /// The bound topology.
    pub fn topology(&self) -> &'a TopologyIndex {
        self.topology
    }

    /// Check one volume, resolving peers from `assignments`.
    pub fn check_volume(
        &self,
        volume: &VolumeId,
        constraints: &VolumeConstraints,
        assignments: &BTreeMap<VolumeId, Observed>,
    ) -> Result<Verdict, InputError> {
        let assignment = match assignments.get(volume) {
            Some(Ok(assignment)) => assignment.clone(),
            Some(Err(reason)) => return lookup_failed(volume, constraints, reason),
            None => ReplicaAssignment::default(),
        };

        let mut peers = BTreeMap::new();
        // A pending volume never looks at its peers.
        let related = match constraints.expectation() {
            Expectation::Placed => constraints.peers().collect(),
            Expectation::Pending => Vec::new(),
        };
        for peer in related {
            match assignments.get(peer) {
                Some(Ok(peer_assignment)) => {
                    peers.insert(peer.clone(), peer_assignment);
                }
                Some(Err(reason)) => {
                    return Err(InputError::Lookup {
                        volume: peer.clone(),
                        reason: reason.clone(),
                    })
                }
                None => {
                    return Err(InputError::MissingPeer {
                        volume: volume.clone(),
                        peer: peer.clone(),
                    })
                }
            }
        }

        evaluate(volume, constraints, &assignment, self.topology, &peers)
    }

    /// Check every volume of `spec`, in volume order.
    pub fn check_all(
        &self,
        spec: &ConstraintSpec,
        assignments: &BTreeMap<VolumeId, Observed>,
    ) -> Vec<VolumeReport> {
        spec.volumes()
            .map(|(volume, constraints)| VolumeReport {
                volume: volume.clone(),
                outcome: self.check_volume(volume, constraints, assignments),
            })
            .collect()
    }
}

fn evaluate(
    volume: &VolumeId,
    constraints: &VolumeConstraints,
    assignment: &ReplicaAssignment,
    topology: &TopologyIndex,
    peers: &BTreeMap<VolumeId, &ReplicaAssignment>,
) -> Result<Verdict, InputError> {
    let mut verdict = Verdict::new(volume.clone());
    let nodes = assignment.nodes();

    if constraints.expectation() == Expectation::Pending {
        if nodes.is_empty() {
            tracing::info!("Volume '{}' remained pending", volume);
            verdict.note(Note::RemainedPending { reason: None });
        } else {
            tracing::warn!(
                "Volume '{}' expected pending but has {} replicas",
                volume,
                nodes.len()
            );
            verdict.violate(Violation::UnexpectedPlacement { actual: nodes });
        }
        return Ok(verdict);
    }

    if nodes.is_empty() {
        return Err(InputError::EmptyAssignment {
            volume: volume.clone(),
        });
    }

    tracing::debug!("Checking volume '{}' on {} nodes", volume, nodes.len());

    for node in constraints.required() {
        if !nodes.contains(node) {
            verdict.violate(Violation::RequiredNodeAbsent {
                node: node.clone(),
                actual: nodes.clone(),
            });
        }
    }

    for node in constraints.excluded() {
        if nodes.contains(node) {
            verdict.violate(Violation::ExcludedNodePresent {
                node: node.clone(),
                actual: nodes.clone(),
            });
        }
    }

    for node in constraints.preferred() {
        if nodes.contains(node) {
            tracing::info!("Volume '{}' has a replica on preferred node '{}'", volume, node);
            verdict.note(Note::PreferredHit { node: node.clone() });
        } else {
            tracing::info!("Volume '{}' has no replica on preferred node '{}'", volume, node);
            verdict.note(Note::PreferredMiss { node: node.clone() });
        }
    }

    for rule in constraints.affinity() {
        check_affinity(rule, &nodes, topology, &mut verdict);
    }

    for rule in constraints.spread() {
        check_spread(rule, assignment, topology, &mut verdict);
    }

    for rule in constraints.cross_volume() {
        let peer = peers.get(&rule.peer).ok_or_else(|| InputError::MissingPeer {
            volume: volume.clone(),
            peer: rule.peer.clone(),
        })?;
        check_cross_volume(rule, &nodes, &peer.nodes(), topology, &mut verdict);
    }

    if verdict.passed() {
        tracing::debug!("Volume '{}' satisfies all constraints", volume);
    } else {
        for violation in verdict.violations() {
            tracing::warn!("Volume '{}': {}", volume, violation);
        }
    }

    Ok(verdict)
}

fn check_affinity(
    rule: &AffinityConstraint,
    nodes: &BTreeSet<NodeId>,
    topology: &TopologyIndex,
    verdict: &mut Verdict,
) {
    let matched = rule
        .candidates
        .iter()
        .find(|candidate| nodes.is_subset(candidate.resolve(topology)));

    match matched {
        Some(candidate) => {
            tracing::debug!("Replicas fall inside candidate domain {}", candidate.describe());
            verdict.note(Note::AffinityMatched {
                candidate: candidate.describe(),
            });
        }
        None => verdict.violate(Violation::NoCandidateDomain {
            replicas: nodes.clone(),
            candidates: rule
                .candidates
                .iter()
                .map(|candidate| CandidateReport {
                    name: candidate.describe(),
                    nodes: candidate.resolve(topology).clone(),
                })
                .collect(),
        }),
    }
}

fn check_spread(
    rule: &SpreadConstraint,
    assignment: &ReplicaAssignment,
    topology: &TopologyIndex,
    verdict: &mut Verdict,
) {
    let expected = rule.redundancy.replication_factor;

    for (index, group) in assignment.groups().iter().enumerate() {
        let mut occupied = BTreeSet::new();
        for (domain, members) in topology.domains(&rule.topology_key) {
            let inside: BTreeSet<NodeId> = group.intersection(members).cloned().collect();
            tracing::debug!("Group {} has {} replicas in {}", index, inside.len(), domain);
            match inside.len() {
                0 => {}
                1 => {
                    occupied.insert(domain);
                }
                _ => verdict.violate(Violation::DomainOverloaded {
                    group: index,
                    domain,
                    replicas: inside,
                }),
            }
        }
        if occupied.len() != expected {
            verdict.violate(Violation::RedundancyMismatch {
                group: index,
                topology_key: rule.topology_key.clone(),
                expected,
                occupied,
                replicas: group.clone(),
            });
        }
    }

    let groups = assignment.groups().len();
    if groups != rule.redundancy.aggregation_level {
        verdict.violate(Violation::GroupCountMismatch {
            expected: rule.redundancy.aggregation_level,
            actual: groups,
        });
    }
}

fn check_cross_volume(
    rule: &CrossVolumeConstraint,
    nodes: &BTreeSet<NodeId>,
    peer_nodes: &BTreeSet<NodeId>,
    topology: &TopologyIndex,
    verdict: &mut Verdict,
) {
    match (&rule.scope, rule.relation) {
        (RelationScope::Node, Relation::Coincide) => {
            for node in nodes.difference(peer_nodes) {
                verdict.violate(Violation::UnmatchedPeerNode {
                    peer: rule.peer.clone(),
                    node: node.clone(),
                    peer_nodes: peer_nodes.clone(),
                });
            }
        }
        (RelationScope::Node, Relation::Exclude) => {
            for node in nodes.intersection(peer_nodes) {
                verdict.violate(Violation::SharedPeerNode {
                    peer: rule.peer.clone(),
                    node: node.clone(),
                    peer_nodes: peer_nodes.clone(),
                });
            }
        }
        (RelationScope::Domain { key }, Relation::Exclude) => {
            for (domain, shared, peer_shared) in shared_domains(key, nodes, peer_nodes, topology) {
                verdict.violate(Violation::SharedPeerDomain {
                    peer: rule.peer.clone(),
                    domain,
                    nodes: shared,
                    peer_nodes: peer_shared,
                });
            }
        }
        (RelationScope::Domain { key }, Relation::Coincide) => {
            let common = topology
                .domains(key)
                .any(|(_, members)| nodes.is_subset(members) && peer_nodes.is_subset(members));
            if !common {
                verdict.violate(Violation::NoCommonDomain {
                    peer: rule.peer.clone(),
                    topology_key: key.clone(),
                    nodes: nodes.clone(),
                    peer_nodes: peer_nodes.clone(),
                });
            }
        }
    }
}

fn shared_domains(
    key: &LabelKey,
    nodes: &BTreeSet<NodeId>,
    peer_nodes: &BTreeSet<NodeId>,
    topology: &TopologyIndex,
) -> Vec<(Domain, BTreeSet<NodeId>, BTreeSet<NodeId>)> {
    topology
        .domains(key)
        .filter_map(|(domain, members)| {
            let ours: BTreeSet<NodeId> = nodes.intersection(members).cloned().collect();
            let theirs: BTreeSet<NodeId> = peer_nodes.intersection(members).cloned().collect();
            if ours.is_empty() || theirs.is_empty() {
                None
            } else {
                Some((domain, ours, theirs))
            }
        })
        .collect()
}

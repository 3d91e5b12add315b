//! Verification outcomes.
//!
//! Violations are data, not errors: a [`Verdict`] carries every failed
//! constraint found for one volume, plus non-fatal notes such as preferred
//! node hits. [`Verdict::into_result`] converts to the strict form.

use rpv_types::{Domain, LabelKey, NodeId, VolumeId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Which kind of constraint a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintKind {
    /// Required node set.
    Required,
    /// Excluded node set.
    Excluded,
    /// Topology affinity.
    Affinity,
    /// Topology anti-affinity (spreading).
    Spread,
    /// Relation to another volume.
    CrossVolume,
    /// Placed vs. pending expectation.
    Expectation,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Required => "required",
            Self::Excluded => "excluded",
            Self::Affinity => "affinity",
            Self::Spread => "anti-affinity",
            Self::CrossVolume => "cross-volume",
            Self::Expectation => "expectation",
        };
        f.write_str(name)
    }
}

/// A candidate domain as it looked when affinity was evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReport {
    /// Candidate name (`key=value` or explicit set name).
    pub name: String,
    /// Member nodes.
    pub nodes: BTreeSet<NodeId>,
}

/// One failed constraint, with the sets needed to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Violation {
    /// A required node hosts no replica.
    RequiredNodeAbsent {
        /// The missing node.
        node: NodeId,
        /// Nodes that do host replicas.
        actual: BTreeSet<NodeId>,
    },
    /// An excluded node hosts a replica.
    ExcludedNodePresent {
        /// The offending node.
        node: NodeId,
        /// Nodes that host replicas.
        actual: BTreeSet<NodeId>,
    },
    /// No candidate domain contains every replica.
    NoCandidateDomain {
        /// Nodes that host replicas.
        replicas: BTreeSet<NodeId>,
        /// Candidates tried, in order.
        candidates: Vec<CandidateReport>,
    },
    /// A domain holds more than one replica of a group.
    DomainOverloaded {
        /// Replica group index.
        group: usize,
        /// The crowded domain.
        domain: Domain,
        /// Replicas of the group inside the domain.
        replicas: BTreeSet<NodeId>,
    },
    /// A group occupies the wrong number of domains.
    RedundancyMismatch {
        /// Replica group index.
        group: usize,
        /// Topology key of the spreading rule.
        topology_key: LabelKey,
        /// Expected number of occupied domains.
        expected: usize,
        /// Domains holding exactly one replica of the group.
        occupied: BTreeSet<Domain>,
        /// Replicas of the group.
        replicas: BTreeSet<NodeId>,
    },
    /// The volume has the wrong number of replica groups.
    GroupCountMismatch {
        /// Expected aggregation level.
        expected: usize,
        /// Observed group count.
        actual: usize,
    },
    /// A replica sits on a node the peer volume does not use.
    UnmatchedPeerNode {
        /// Reference volume.
        peer: VolumeId,
        /// The unmatched node.
        node: NodeId,
        /// Nodes hosting the peer.
        peer_nodes: BTreeSet<NodeId>,
    },
    /// A replica shares a node with the peer volume.
    SharedPeerNode {
        /// Reference volume.
        peer: VolumeId,
        /// The shared node.
        node: NodeId,
        /// Nodes hosting the peer.
        peer_nodes: BTreeSet<NodeId>,
    },
    /// Both volumes have replicas inside one domain.
    SharedPeerDomain {
        /// Reference volume.
        peer: VolumeId,
        /// The shared domain.
        domain: Domain,
        /// This volume's replicas in the domain.
        nodes: BTreeSet<NodeId>,
        /// The peer's replicas in the domain.
        peer_nodes: BTreeSet<NodeId>,
    },
    /// No single domain holds the replicas of both volumes.
    NoCommonDomain {
        /// Reference volume.
        peer: VolumeId,
        /// Topology key of the relation.
        topology_key: LabelKey,
        /// This volume's replicas.
        nodes: BTreeSet<NodeId>,
        /// The peer's replicas.
        peer_nodes: BTreeSet<NodeId>,
    },
    /// A volume expected to stay pending was placed.
    UnexpectedPlacement {
        /// Nodes that host replicas.
        actual: BTreeSet<NodeId>,
    },
}

impl Violation {
    /// The constraint kind that failed.
    pub fn constraint(&self) -> ConstraintKind {
        match self {
            Self::RequiredNodeAbsent { .. } => ConstraintKind::Required,
            Self::ExcludedNodePresent { .. } => ConstraintKind::Excluded,
            Self::NoCandidateDomain { .. } => ConstraintKind::Affinity,
            Self::DomainOverloaded { .. }
            | Self::RedundancyMismatch { .. }
            | Self::GroupCountMismatch { .. } => ConstraintKind::Spread,
            Self::UnmatchedPeerNode { .. }
            | Self::SharedPeerNode { .. }
            | Self::SharedPeerDomain { .. }
            | Self::NoCommonDomain { .. } => ConstraintKind::CrossVolume,
            Self::UnexpectedPlacement { .. } => ConstraintKind::Expectation,
        }
    }

    /// Nodes cited as the cause of the violation.
    pub fn offending_nodes(&self) -> BTreeSet<NodeId> {
        match self {
            Self::RequiredNodeAbsent { node, .. }
            | Self::ExcludedNodePresent { node, .. }
            | Self::UnmatchedPeerNode { node, .. }
            | Self::SharedPeerNode { node, .. } => BTreeSet::from([node.clone()]),
            Self::NoCandidateDomain { replicas, .. } | Self::DomainOverloaded { replicas, .. } => {
                replicas.clone()
            }
            Self::RedundancyMismatch { replicas, .. } => replicas.clone(),
            Self::SharedPeerDomain { nodes, .. } | Self::NoCommonDomain { nodes, .. } => {
                nodes.clone()
            }
            Self::UnexpectedPlacement { actual } => actual.clone(),
            Self::GroupCountMismatch { .. } => BTreeSet::new(),
        }
    }

    /// The peer volume involved, for cross-volume violations.
    pub fn peer(&self) -> Option<&VolumeId> {
        match self {
            Self::UnmatchedPeerNode { peer, .. }
            | Self::SharedPeerNode { peer, .. }
            | Self::SharedPeerDomain { peer, .. }
            | Self::NoCommonDomain { peer, .. } => Some(peer),
            _ => None,
        }
    }
}

fn list<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let parts: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiredNodeAbsent { node, actual } => write!(
                f,
                "required node absent: {} (replicas on {})",
                node,
                list(actual)
            ),
            Self::ExcludedNodePresent { node, actual } => write!(
                f,
                "excluded node present: {} (replicas on {})",
                node,
                list(actual)
            ),
            Self::NoCandidateDomain {
                replicas,
                candidates,
            } => {
                write!(
                    f,
                    "no candidate domain contains all replicas: replicas on {}",
                    list(replicas)
                )?;
                for candidate in candidates {
                    write!(f, "; {} = {}", candidate.name, list(&candidate.nodes))?;
                }
                Ok(())
            }
            Self::DomainOverloaded {
                group,
                domain,
                replicas,
            } => write!(
                f,
                "domain holds more than one replica: {} holds {} of group {}",
                domain,
                list(replicas),
                group
            ),
            Self::RedundancyMismatch {
                group,
                topology_key,
                expected,
                occupied,
                replicas,
            } => write!(
                f,
                "replica count across domains mismatches redundancy class: group {} ({}) occupies {} {} domains {}, expected {}",
                group,
                list(replicas),
                occupied.len(),
                topology_key,
                list(occupied),
                expected
            ),
            Self::GroupCountMismatch { expected, actual } => write!(
                f,
                "replica count across domains mismatches redundancy class: {} replica groups, expected {}",
                actual, expected
            ),
            Self::UnmatchedPeerNode {
                peer,
                node,
                peer_nodes,
            } => write!(
                f,
                "replica on {} is not among the nodes of volume {} {}",
                node,
                peer,
                list(peer_nodes)
            ),
            Self::SharedPeerNode {
                peer,
                node,
                peer_nodes,
            } => write!(
                f,
                "replica on {} overlaps volume {} {}",
                node,
                peer,
                list(peer_nodes)
            ),
            Self::SharedPeerDomain {
                peer,
                domain,
                nodes,
                peer_nodes,
            } => write!(
                f,
                "volumes share a topology domain: {} holds {} and {} of volume {}",
                domain,
                list(nodes),
                list(peer_nodes),
                peer
            ),
            Self::NoCommonDomain {
                peer,
                topology_key,
                nodes,
                peer_nodes,
            } => write!(
                f,
                "volumes do not share a topology domain: no {} domain holds {} and {} of volume {}",
                topology_key,
                list(nodes),
                list(peer_nodes),
                peer
            ),
            Self::UnexpectedPlacement { actual } => write!(
                f,
                "volume was expected to stay pending but has replicas on {}",
                list(actual)
            ),
        }
    }
}

/// Non-fatal facts recorded while checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Note {
    /// A preferred node hosts a replica.
    PreferredHit {
        /// The node.
        node: NodeId,
    },
    /// A preferred node hosts no replica.
    PreferredMiss {
        /// The node.
        node: NodeId,
    },
    /// Affinity was satisfied by this candidate.
    AffinityMatched {
        /// Candidate name.
        candidate: String,
    },
    /// The volume stayed unplaced, as expected.
    RemainedPending {
        /// Lookup failure reported by the driver, if any.
        reason: Option<String>,
    },
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreferredHit { node } => write!(f, "preferred node {} hosts a replica", node),
            Self::PreferredMiss { node } => write!(f, "preferred node {} hosts no replica", node),
            Self::AffinityMatched { candidate } => write!(f, "replicas within {}", candidate),
            Self::RemainedPending { reason: Some(reason) } => {
                write!(f, "remained pending ({})", reason)
            }
            Self::RemainedPending { reason: None } => f.write_str("remained pending"),
        }
    }
}

/// Outcome of checking one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    volume: VolumeId,
    violations: Vec<Violation>,
    notes: Vec<Note>,
}

impl Verdict {
    pub(crate) fn new(volume: VolumeId) -> Self {
        Self {
            volume,
            violations: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub(crate) fn violate(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub(crate) fn note(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// The checked volume.
    pub fn volume(&self) -> &VolumeId {
        &self.volume
    }

    /// Whether every required constraint held.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Every failed constraint, in evaluation order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Non-fatal notes, in evaluation order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Union of the nodes cited by all violations.
    pub fn offending_nodes(&self) -> BTreeSet<NodeId> {
        self.violations
            .iter()
            .flat_map(Violation::offending_nodes)
            .collect()
    }

    /// Strict form: `Err` if any constraint failed.
    pub fn into_result(self) -> Result<Self, ValidationError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ValidationError {
                volume: self.volume,
                violations: self.violations,
            })
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(f, "{}: pass", self.volume)
        } else {
            write!(
                f,
                "{}: fail ({} violations)",
                self.volume,
                self.violations.len()
            )
        }
    }
}

/// Structured error for callers that want failures as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("volume {volume} violates {} placement constraint(s): {}", violations.len(), summary(violations))]
pub struct ValidationError {
    /// The checked volume.
    pub volume: VolumeId,
    /// Every failed constraint.
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    let parts: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> BTreeSet<NodeId> {
        ids.iter().map(|s| NodeId::new(*s)).collect()
    }

    #[test]
    fn violation_kinds() {
        let v = Violation::RequiredNodeAbsent {
            node: NodeId::new("b"),
            actual: nodes(&["a", "c"]),
        };
        assert_eq!(v.constraint(), ConstraintKind::Required);
        assert_eq!(v.offending_nodes(), nodes(&["b"]));
        assert!(v.to_string().starts_with("required node absent: b"));
    }

    #[test]
    fn overloaded_display_names_domain() {
        let v = Violation::DomainOverloaded {
            group: 0,
            domain: Domain::new("zone", "east"),
            replicas: nodes(&["n1", "n2"]),
        };
        assert_eq!(
            v.to_string(),
            "domain holds more than one replica: zone=east holds [n1, n2] of group 0"
        );
    }

    #[test]
    fn empty_verdict_passes() {
        let verdict = Verdict::new(VolumeId::new("v"));
        assert!(verdict.passed());
        assert_eq!(verdict.to_string(), "v: pass");
        assert!(verdict.into_result().is_ok());
    }

    #[test]
    fn strict_form_carries_violations() {
        let mut verdict = Verdict::new(VolumeId::new("v"));
        verdict.violate(Violation::ExcludedNodePresent {
            node: NodeId::new("x"),
            actual: nodes(&["x"]),
        });
        let err = verdict.into_result().unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert!(err.to_string().contains("excluded node present: x"));
    }

    #[test]
    fn note_display() {
        let note = Note::PreferredMiss {
            node: NodeId::new("n2"),
        };
        assert_eq!(note.to_string(), "preferred node n2 hosts no replica");
        let note = Note::RemainedPending {
            reason: Some("volume not found: v".into()),
        };
        assert_eq!(note.to_string(), "remained pending (volume not found: v)");
    }

    #[test]
    fn notes_never_fail() {
        let mut verdict = Verdict::new(VolumeId::new("v"));
        verdict.note(Note::PreferredMiss {
            node: NodeId::new("p"),
        });
        assert!(verdict.passed());
        assert_eq!(verdict.notes().len(), 1);
    }

    #[test]
    fn verdict_serializes_to_json() {
        let mut verdict = Verdict::new(VolumeId::new("v"));
        verdict.violate(Violation::GroupCountMismatch {
            expected: 2,
            actual: 1,
        });
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["volume"], "v");
        assert_eq!(json["violations"][0]["kind"], "group-count-mismatch");
    }
}

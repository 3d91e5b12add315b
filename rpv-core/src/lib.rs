//! # rpv-core
//!
//! Pure logic for the replica placement verifier (no I/O, instant tests).
//!
//! This crate decides whether an observed replica placement satisfies a
//! declarative set of placement constraints.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take immutable snapshots and
//! produce a verdict without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same verdict)
//! - Safe concurrent use for independent volumes
//!
//! Collecting the snapshots (node labels, replica locations) is done by
//! `rpv-driver`; deriving constraints from placement rules is done by
//! `rpv-rules`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assignment;
pub mod constraint;
pub mod topology;
pub mod verdict;
pub mod verifier;

pub use assignment::{AssignmentError, ReplicaAssignment};
pub use constraint::{
    AffinityConstraint, CandidateDomain, ConstraintSpec, CrossVolumeConstraint, Expectation,
    RedundancyClass, Relation, RelationScope, SpreadConstraint, VolumeConstraints,
    VolumeConstraintsBuilder,
};
pub use topology::{Labels, TopologyIndex};
pub use verdict::{CandidateReport, ConstraintKind, Note, ValidationError, Verdict, Violation};
pub use verifier::{check, check_observed, InputError, Observed, Verifier, VolumeReport};

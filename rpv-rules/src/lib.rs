//! # rpv-rules
//!
//! Placement rule cases for the replica placement verifier.
//!
//! A rule case describes one scenario: which labels to put on which nodes,
//! which `VolumePlacementStrategy` documents apply to which storage classes,
//! and what placement that should produce. This crate turns cases into
//! [`rpv_core::ConstraintSpec`]s and runs them against a
//! [`rpv_driver::ReplicaSource`].
//!
//! ## Modules
//!
//! - [`strategy`]: placement strategy documents (YAML)
//! - [`selector`]: match-expression evaluation
//! - [`labels`]: node label plans
//! - [`case`]: the [`RuleCase`] trait
//! - [`cases`]: the standard cases
//! - [`catalog`]: explicit case table
//! - [`runner`]: run cases, produce [`CaseReport`]s
//!
//! ## Example
//!
//! ```ignore
//! use rpv_rules::{Catalog, RuleRunner};
//!
//! let catalog = Catalog::standard();
//! let entry = catalog.get("replica-topology-spread")?;
//! let report = RuleRunner::new(&driver).run(entry.case.as_ref()).await?;
//! assert!(report.passed());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod case;
pub mod cases;
pub mod catalog;
pub mod error;
pub mod labels;
pub mod runner;
pub mod selector;
pub mod strategy;

pub use case::{CaseVolume, RuleCase, Suite, VolumeRelation};
pub use catalog::{Catalog, CatalogEntry};
pub use error::RuleError;
pub use labels::{apply_label_plan, LabelPlan};
pub use runner::{CaseFailure, CaseReport, RuleRunner, RunSummary};
pub use strategy::{MatchExpression, Operator, StrategySet};

//! # rpv-types
//!
//! Identifier types for the replica placement verifier.
//!
//! This crate provides the foundational types used across all rpv crates:
//! - [`NodeId`], [`VolumeId`] - Cluster node and volume identity
//! - [`LabelKey`], [`LabelValue`], [`Domain`] - Topology labels
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;

pub use error::TypesError;
pub use ids::{Domain, LabelKey, LabelValue, NodeId, VolumeId};

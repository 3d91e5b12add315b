//! # rpv-driver
//!
//! Where replica placements come from.
//!
//! The verifier in `rpv-core` never talks to a cluster. This crate provides
//! the seam it is fed through:
//!
//! - **[`ReplicaSource`]**: async access to node labels and replica locations
//! - **[`MockDriver`]**: in-memory source with forced failures, for tests
//! - **[`SnapshotDriver`]**: a cluster snapshot loaded from a JSON file
//! - **[`capture`]**: read everything once, at a single point in time
//!
//! ## Example
//!
//! ```ignore
//! use rpv_driver::{capture, SnapshotDriver};
//!
//! let driver = SnapshotDriver::from_file("cluster.json")?;
//! let snapshot = capture(&driver, volumes).await?;
//! let topology = snapshot.topology();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod snapshot;
pub mod source;

pub use snapshot::{capture, capture_assignments, Snapshot};
pub use source::{DriverError, MockDriver, ReplicaSource, SnapshotDriver};

//! Error types shared across the verifier crates.

use thiserror::Error;

/// Errors raised while constructing identifier types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// An identifier was empty or blank.
    #[error("{kind} identifier must not be empty")]
    EmptyIdentifier {
        /// Which identifier kind was rejected.
        kind: &'static str,
    },
}

//! Rule layer errors.

use rpv_driver::DriverError;
use rpv_types::LabelKey;
use thiserror::Error;

/// Errors raised while turning rule cases into constraints or running them.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A placement strategy document could not be parsed.
    #[error("malformed placement strategy document: {0}")]
    Document(#[from] serde_yaml::Error),

    /// A match expression is not well formed.
    #[error("invalid match expression on {key}: {reason}")]
    InvalidExpression {
        /// Label key of the expression.
        key: LabelKey,
        /// What is wrong with it.
        reason: String,
    },

    /// A storage class refers to a strategy the document does not define.
    #[error("unknown placement strategy: {0}")]
    UnknownStrategy(String),

    /// A case with the same name is already in the catalog.
    #[error("rule case {0} is already registered")]
    DuplicateCase(String),

    /// No case with this name is in the catalog.
    #[error("unknown rule case: {0}")]
    UnknownCase(String),

    /// Suite name not recognised.
    #[error("unknown suite: {0}")]
    UnknownSuite(String),

    /// The label plan needs more nodes than the cluster has.
    #[error("label plan needs {needed} nodes but the cluster has {available}")]
    NotEnoughNodes {
        /// Nodes the plan labels.
        needed: usize,
        /// Nodes available.
        available: usize,
    },

    /// Reading the cluster failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

//! Identity types for the placement verifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier without validation.
            ///
            /// Use [`Self::parse`] for untrusted input.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Parse an identifier, rejecting empty or blank strings.
            pub fn parse(value: &str) -> Result<Self, TypesError> {
                if value.trim().is_empty() {
                    return Err(TypesError::EmptyIdentifier { kind: $what });
                }
                Ok(Self(value.to_string()))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypesError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Opaque identifier of a cluster node, unique within one snapshot.
    NodeId,
    "node"
);

string_id!(
    /// Name of a logical volume under test.
    VolumeId,
    "volume"
);

string_id!(
    /// Key of a node label, e.g. `failure-domain.beta.kubernetes.io/px_zone`.
    LabelKey,
    "label key"
);

string_id!(
    /// Value of a node label, e.g. `east`.
    LabelValue,
    "label value"
);

/// A topology domain: every node carrying `key=value`.
///
/// Domains derived from a single key partition the labelled nodes; domains
/// from different keys may overlap.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Domain {
    /// Topology key.
    pub key: LabelKey,
    /// Value shared by the nodes of this domain.
    pub value: LabelValue,
}

impl Domain {
    /// Create a domain from a key/value pair.
    pub fn new(key: impl Into<LabelKey>, value: impl Into<LabelValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Domain({}={})", self.key, self.value)
    }
}

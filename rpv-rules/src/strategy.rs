//! VolumePlacementStrategy documents.
//!
//! Only the parts needed to derive constraints are modelled: the four rule
//! lists and, per rule, its enforcement, topology key, weight and match
//! expressions. Unknown fields are ignored.

use rpv_types::LabelKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RuleError;

/// Whether a rule must hold or is a scheduling hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// The rule must hold.
    #[default]
    Required,
    /// The rule is best effort.
    Preferred,
}

/// Match expression operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// Label value is one of `values`.
    In,
    /// Label absent or value not in `values`.
    NotIn,
    /// Label present.
    Exists,
    /// Label absent.
    DoesNotExist,
    /// Integer label value greater than the single value.
    Gt,
    /// Integer label value less than the single value.
    Lt,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Exists => "Exists",
            Self::DoesNotExist => "DoesNotExist",
            Self::Gt => "Gt",
            Self::Lt => "Lt",
        };
        f.write_str(name)
    }
}

/// One `key operator values` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchExpression {
    /// Label key.
    pub key: LabelKey,
    /// Operator.
    pub operator: Operator,
    /// Operand values.
    #[serde(default)]
    pub values: Vec<String>,
}

impl MatchExpression {
    /// Build an expression.
    pub fn new<I, S>(key: impl Into<LabelKey>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            write!(f, "{} {}", self.key, self.operator)
        } else {
            write!(f, "{} {} [{}]", self.key, self.operator, self.values.join(", "))
        }
    }
}

/// One affinity or anti-affinity rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRule {
    /// Required or preferred.
    #[serde(default)]
    pub enforcement: Enforcement,
    /// Topology key the rule works on, if any.
    #[serde(default)]
    pub topology_key: Option<LabelKey>,
    /// Weight of a preferred rule.
    #[serde(default)]
    pub weight: Option<u32>,
    /// Selector clauses, ANDed.
    #[serde(default)]
    pub match_expressions: Vec<MatchExpression>,
}

/// The `spec` section of a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySpec {
    /// Where replicas must (or should) go.
    #[serde(default)]
    pub replica_affinity: Vec<PlacementRule>,
    /// How replicas must spread.
    #[serde(default)]
    pub replica_anti_affinity: Vec<PlacementRule>,
    /// Which volumes to colocate with.
    #[serde(default)]
    pub volume_affinity: Vec<PlacementRule>,
    /// Which volumes to stay away from.
    #[serde(default)]
    pub volume_anti_affinity: Vec<PlacementRule>,
}

/// Strategy metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Strategy name, referenced from storage classes.
    pub name: String,
}

/// One `VolumePlacementStrategy` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDocument {
    /// API version string.
    #[serde(default)]
    pub api_version: String,
    /// Object kind.
    #[serde(default)]
    pub kind: String,
    /// Name and friends.
    pub metadata: Metadata,
    /// The rules.
    #[serde(default)]
    pub spec: StrategySpec,
}

/// Parse a multi-document YAML stream of strategies.
pub fn parse_documents(yaml: &str) -> Result<Vec<StrategyDocument>, RuleError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        documents.push(StrategyDocument::deserialize(document)?);
    }
    tracing::debug!("Parsed {} placement strategies", documents.len());
    Ok(documents)
}

/// Strategies by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategySet {
    strategies: BTreeMap<String, StrategySpec>,
}

impl StrategySet {
    /// Parse a multi-document stream. A later document with the same name
    /// replaces an earlier one.
    pub fn parse(yaml: &str) -> Result<Self, RuleError> {
        let strategies = parse_documents(yaml)?
            .into_iter()
            .map(|doc| (doc.metadata.name, doc.spec))
            .collect();
        Ok(Self { strategies })
    }

    /// Look up a strategy.
    pub fn get(&self, name: &str) -> Result<&StrategySpec, RuleError> {
        self.strategies
            .get(name)
            .ok_or_else(|| RuleError::UnknownStrategy(name.to_string()))
    }

    /// Strategy names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether no strategy was defined.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

//! Match-expression evaluation against node labels.

use rpv_core::{Labels, TopologyIndex};
use rpv_types::NodeId;
use std::collections::BTreeSet;

use crate::error::RuleError;
use crate::strategy::{MatchExpression, Operator};

fn invalid(expr: &MatchExpression, reason: impl Into<String>) -> RuleError {
    RuleError::InvalidExpression {
        key: expr.key.clone(),
        reason: reason.into(),
    }
}

/// Reject expressions whose operands do not fit the operator.
pub fn validate(expr: &MatchExpression) -> Result<(), RuleError> {
    match expr.operator {
        Operator::In | Operator::NotIn if expr.values.is_empty() => {
            Err(invalid(expr, format!("{} needs at least one value", expr.operator)))
        }
        Operator::Exists | Operator::DoesNotExist if !expr.values.is_empty() => {
            Err(invalid(expr, format!("{} takes no values", expr.operator)))
        }
        Operator::Gt | Operator::Lt => threshold(expr).map(|_| ()),
        _ => Ok(()),
    }
}

fn threshold(expr: &MatchExpression) -> Result<i64, RuleError> {
    match expr.values.as_slice() {
        [value] => value.trim().parse::<i64>().map_err(|_| {
            invalid(
                expr,
                format!("{} value {:?} is not an integer", expr.operator, value),
            )
        }),
        _ => Err(invalid(
            expr,
            format!("{} needs exactly one value", expr.operator),
        )),
    }
}

/// Whether one node's labels satisfy one expression.
///
/// `NotIn` and `DoesNotExist` match nodes without the key. For `Gt`/`Lt` a
/// label value that is not an integer never matches.
pub fn matches(expr: &MatchExpression, labels: &Labels) -> Result<bool, RuleError> {
    validate(expr)?;
    let value = labels.get(expr.key.as_str()).map(|v| v.as_str());
    let matched = match expr.operator {
        Operator::In => value.is_some_and(|v| expr.values.iter().any(|x| x == v)),
        Operator::NotIn => value.map_or(true, |v| expr.values.iter().all(|x| x != v)),
        Operator::Exists => value.is_some(),
        Operator::DoesNotExist => value.is_none(),
        Operator::Gt | Operator::Lt => {
            let limit = threshold(expr)?;
            match value.and_then(|v| v.trim().parse::<i64>().ok()) {
                Some(n) if expr.operator == Operator::Gt => n > limit,
                Some(n) => n < limit,
                None => false,
            }
        }
    };
    Ok(matched)
}

/// Whether one node's labels satisfy every expression.
pub fn matches_all(exprs: &[MatchExpression], labels: &Labels) -> Result<bool, RuleError> {
    for expr in exprs {
        if !matches(expr, labels)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Nodes of `topology` whose labels satisfy every expression.
pub fn select_nodes(
    topology: &TopologyIndex,
    exprs: &[MatchExpression],
) -> Result<BTreeSet<NodeId>, RuleError> {
    for expr in exprs {
        validate(expr)?;
    }

    let empty = Labels::new();
    let mut selected = BTreeSet::new();
    for node in topology.nodes() {
        let labels = topology.labels_of(node).unwrap_or(&empty);
        if matches_all(exprs, labels)? {
            selected.insert(node.clone());
        }
    }

    tracing::debug!("Selector matched {} of {} nodes", selected.len(), topology.len());
    Ok(selected)
}

/// Human-readable form of a selector, used to name candidate sets.
pub fn describe(exprs: &[MatchExpression]) -> String {
    let parts: Vec<String> = exprs.iter().map(ToString::to_string).collect();
    parts.join(" and ")
}

//! Node label plans.
//!
//! A rule case describes the labels its scenario needs as an ordered list of
//! label sets: the first set goes on the first node (in name order), the
//! second on the second, and so on.

use rpv_core::Labels;
use rpv_types::{LabelKey, LabelValue, NodeId};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::RuleError;

/// Ordered label sets, one per node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    sets: Vec<Labels>,
}

impl LabelPlan {
    /// An empty plan: node labels are used as captured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the label set for the next node.
    pub fn node<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<LabelKey>,
        V: Into<LabelValue>,
    {
        self.sets
            .push(labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Label sets in node order.
    pub fn sets(&self) -> &[Labels] {
        &self.sets
    }

    /// Every key the plan sets.
    pub fn keys(&self) -> BTreeSet<LabelKey> {
        self.sets.iter().flat_map(|set| set.keys().cloned()).collect()
    }

    /// Number of nodes the plan labels.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the plan labels nothing.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Apply `plan` to a node → labels map.
///
/// Every key the plan mentions is first removed from all nodes, so stale
/// values from an earlier scenario never leak in. Labels with other keys are
/// kept.
pub fn apply_label_plan(
    nodes: &BTreeMap<NodeId, Labels>,
    plan: &LabelPlan,
) -> Result<BTreeMap<NodeId, Labels>, RuleError> {
    if plan.len() > nodes.len() {
        return Err(RuleError::NotEnoughNodes {
            needed: plan.len(),
            available: nodes.len(),
        });
    }

    let keys = plan.keys();
    let mut out = nodes.clone();
    for labels in out.values_mut() {
        labels.retain(|key, _| !keys.contains(key));
    }

    for (labels, set) in out.values_mut().zip(plan.sets()) {
        labels.extend(set.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    tracing::debug!(
        "Applied label plan: {} keys on {} of {} nodes",
        keys.len(),
        plan.len(),
        out.len()
    );

    Ok(out)
}

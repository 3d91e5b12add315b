//! The rule case abstraction.
//!
//! A rule case bundles everything one placement scenario needs: the node
//! labels to set up, the placement strategy document, which storage class
//! uses which strategy, and how to turn all of that into a
//! [`ConstraintSpec`] once the topology is known.

use rpv_core::{ConstraintSpec, RedundancyClass, Relation, TopologyIndex, VolumeConstraintsBuilder};
use rpv_types::{LabelKey, VolumeId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RuleError;
use crate::labels::LabelPlan;
use crate::selector;
use crate::strategy::{Enforcement, StrategySet, StrategySpec};

/// Group of cases run together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Suite {
    /// Where replicas of one volume go.
    ReplicaAffinity,
    /// Where volumes go relative to each other.
    VolumeAffinity,
    /// Both at once.
    ReplicaVolumeAffinity,
    /// Unsatisfiable rules; volumes must stay unplaced.
    Pending,
}

impl Suite {
    /// Every suite, in run order.
    pub const ALL: [Suite; 4] = [
        Suite::ReplicaAffinity,
        Suite::VolumeAffinity,
        Suite::ReplicaVolumeAffinity,
        Suite::Pending,
    ];

    /// Kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplicaAffinity => "replica-affinity",
            Self::VolumeAffinity => "volume-affinity",
            Self::ReplicaVolumeAffinity => "replica-volume-affinity",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.as_str() == s)
            .ok_or_else(|| RuleError::UnknownSuite(s.to_string()))
    }
}

/// A volume deployed by a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseVolume {
    /// Volume name.
    pub name: VolumeId,
    /// Storage class it is provisioned from.
    pub storage_class: String,
    /// Replica layout of the storage class.
    pub redundancy: RedundancyClass,
}

impl CaseVolume {
    /// Describe a volume.
    pub fn new(
        name: impl Into<VolumeId>,
        storage_class: impl Into<String>,
        redundancy: RedundancyClass,
    ) -> Self {
        Self {
            name: name.into(),
            storage_class: storage_class.into(),
            redundancy,
        }
    }
}

/// Primary database volume.
pub const DATA_VOLUME: &str = "mysql-data";
/// Secondary volume of the same application.
pub const SEQ_VOLUME: &str = "mysql-data-seq";
/// Aggregated volume: two groups of two replicas.
pub const AGGR_VOLUME: &str = "mysql-data-aggr";

/// The three volumes every standard scenario deploys.
pub fn standard_volumes() -> Vec<CaseVolume> {
    vec![
        CaseVolume::new(DATA_VOLUME, "placement-1", RedundancyClass::replicated(3)),
        CaseVolume::new(SEQ_VOLUME, "placement-2", RedundancyClass::replicated(3)),
        CaseVolume::new(AGGR_VOLUME, "placement-3", RedundancyClass::aggregated(2, 2)),
    ]
}

/// An expected relation between two deployed volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRelation {
    /// Volume the relation is checked on.
    pub dependent: VolumeId,
    /// Reference volume.
    pub peer: VolumeId,
    /// Colocate or separate.
    pub relation: Relation,
    /// Compare domains of this key instead of nodes.
    pub topology_key: Option<LabelKey>,
}

impl VolumeRelation {
    /// `dependent` must live on nodes of `peer`.
    pub fn coincide(dependent: impl Into<VolumeId>, peer: impl Into<VolumeId>) -> Self {
        Self {
            dependent: dependent.into(),
            peer: peer.into(),
            relation: Relation::Coincide,
            topology_key: None,
        }
    }

    /// `dependent` must share no node with `peer`.
    pub fn exclude(dependent: impl Into<VolumeId>, peer: impl Into<VolumeId>) -> Self {
        Self {
            dependent: dependent.into(),
            peer: peer.into(),
            relation: Relation::Exclude,
            topology_key: None,
        }
    }

    /// Compare at domain granularity.
    pub fn in_domain(mut self, key: impl Into<LabelKey>) -> Self {
        self.topology_key = Some(key.into());
        self
    }

    /// Add this relation to a constraint builder.
    pub fn apply(&self, builder: VolumeConstraintsBuilder) -> VolumeConstraintsBuilder {
        match (&self.topology_key, self.relation) {
            (None, Relation::Coincide) => builder.coincide_with(self.peer.clone()),
            (None, Relation::Exclude) => builder.exclude_from(self.peer.clone()),
            (Some(key), Relation::Coincide) => {
                builder.coincide_in_domain(self.peer.clone(), key.clone())
            }
            (Some(key), Relation::Exclude) => {
                builder.exclude_from_domain(self.peer.clone(), key.clone())
            }
        }
    }
}

/// One placement scenario.
pub trait RuleCase: Send + Sync {
    /// Unique short name.
    fn name(&self) -> &str;

    /// One-line summary.
    fn description(&self) -> &str;

    /// Suite the case belongs to.
    fn suite(&self) -> Suite;

    /// Node labels the scenario needs.
    fn label_plan(&self) -> LabelPlan;

    /// Multi-document VolumePlacementStrategy YAML.
    fn strategy_document(&self) -> &str;

    /// Storage class → strategy name. `None` means no strategy: volumes of
    /// that class are deployed but not checked.
    fn storage_class_strategies(&self) -> BTreeMap<String, Option<String>>;

    /// Derive the expected placement once the labelled topology is known.
    fn constraints(&self, topology: &TopologyIndex) -> Result<ConstraintSpec, RuleError>;

    /// Volumes the scenario deploys.
    fn volumes(&self) -> Vec<CaseVolume> {
        standard_volumes()
    }

    /// Parsed strategy document.
    fn strategies(&self) -> Result<StrategySet, RuleError> {
        StrategySet::parse(self.strategy_document())
    }
}

/// Volumes of `case` whose storage class has a strategy, with that strategy.
pub fn checked_volumes<'a>(
    case: &dyn RuleCase,
    strategies: &'a StrategySet,
) -> Result<Vec<(CaseVolume, &'a StrategySpec)>, RuleError> {
    let classes = case.storage_class_strategies();
    let mut checked = Vec::new();
    for volume in case.volumes() {
        let Some(Some(name)) = classes.get(&volume.storage_class) else {
            tracing::debug!(
                "Volume '{}' has no placement strategy; not checked",
                volume.name
            );
            continue;
        };
        let spec = strategies.get(name)?;
        checked.push((volume, spec));
    }
    Ok(checked)
}

/// Translate a strategy's replica rules into constraints for one volume.
///
/// - affinity with a topology key: all replicas inside one domain of the key
/// - required affinity with a selector: every selected node hosts a replica;
///   if nothing is selected the volume must stay pending
/// - preferred affinity with a selector: selected nodes are preferred
/// - anti-affinity with a topology key: spread over the key's domains
/// - required anti-affinity with a selector: selected nodes are excluded
pub fn derive_replica_rules(
    volume: &CaseVolume,
    strategy: &StrategySpec,
    topology: &TopologyIndex,
    mut builder: VolumeConstraintsBuilder,
) -> Result<VolumeConstraintsBuilder, RuleError> {
    for rule in &strategy.replica_affinity {
        if let Some(key) = &rule.topology_key {
            builder = builder.affinity_any(key.clone(), topology);
        }
        if rule.match_expressions.is_empty() {
            continue;
        }
        let selected = selector::select_nodes(topology, &rule.match_expressions)?;
        match rule.enforcement {
            Enforcement::Required if selected.is_empty() => {
                tracing::info!(
                    "No node matches {} for volume '{}'; expecting it to stay pending",
                    selector::describe(&rule.match_expressions),
                    volume.name
                );
                builder = builder.expect_pending();
            }
            Enforcement::Required => {
                builder = builder.require(selected);
            }
            Enforcement::Preferred => builder = builder.prefer(selected),
        }
    }

    for rule in &strategy.replica_anti_affinity {
        if let Some(key) = &rule.topology_key {
            builder = builder.spread(key.clone(), volume.redundancy);
        }
        if !rule.match_expressions.is_empty() && rule.enforcement == Enforcement::Required {
            builder = builder.exclude(selector::select_nodes(topology, &rule.match_expressions)?);
        }
    }

    Ok(builder)
}

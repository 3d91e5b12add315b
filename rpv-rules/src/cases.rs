//! The standard rule cases.
//!
//! Two implementations cover every scenario:
//!
//! - [`ReplicaRuleCase`] derives constraints from the replica rules of its
//!   strategies (node selectors, topology affinity, spreading), plus any
//!   volume relations it declares.
//! - [`VolumeRuleCase`] checks volume-to-volume relations, optionally pinning
//!   volumes to fixed domains.

use rpv_core::{CandidateDomain, ConstraintSpec, TopologyIndex, VolumeConstraints};
use rpv_types::VolumeId;
use std::collections::BTreeMap;

use crate::case::{
    checked_volumes, derive_replica_rules, RuleCase, Suite, VolumeRelation, AGGR_VOLUME,
    DATA_VOLUME, SEQ_VOLUME,
};
use crate::error::RuleError;
use crate::labels::LabelPlan;

/// Zone label key.
pub const ZONE_KEY: &str = "failure-domain.beta.kubernetes.io/px_zone";
/// Region label key.
pub const REGION_KEY: &str = "failure-domain.beta.kubernetes.io/px_region";

/// Storage classes of the standard volumes, in order.
const STORAGE_CLASSES: [&str; 3] = ["placement-1", "placement-2", "placement-3"];

/// What every case carries regardless of how it derives constraints.
#[derive(Debug, Clone)]
struct CaseInfo {
    name: &'static str,
    description: &'static str,
    suite: Suite,
    labels: LabelPlan,
    document: &'static str,
    strategies: [Option<&'static str>; 3],
    relations: Vec<VolumeRelation>,
}

impl CaseInfo {
    fn storage_class_strategies(&self) -> BTreeMap<String, Option<String>> {
        STORAGE_CLASSES
            .iter()
            .zip(self.strategies)
            .map(|(class, strategy)| (class.to_string(), strategy.map(str::to_string)))
            .collect()
    }

    fn relations_of<'a>(&'a self, volume: &'a VolumeId) -> impl Iterator<Item = &'a VolumeRelation> {
        self.relations.iter().filter(move |r| &r.dependent == volume)
    }
}

/// Constraints derived from the strategies' replica rules.
#[derive(Debug, Clone)]
pub struct ReplicaRuleCase {
    info: CaseInfo,
}

impl RuleCase for ReplicaRuleCase {
    fn name(&self) -> &str {
        self.info.name
    }

    fn description(&self) -> &str {
        self.info.description
    }

    fn suite(&self) -> Suite {
        self.info.suite
    }

    fn label_plan(&self) -> LabelPlan {
        self.info.labels.clone()
    }

    fn strategy_document(&self) -> &str {
        self.info.document
    }

    fn storage_class_strategies(&self) -> BTreeMap<String, Option<String>> {
        self.info.storage_class_strategies()
    }

    fn constraints(&self, topology: &TopologyIndex) -> Result<ConstraintSpec, RuleError> {
        let strategies = self.strategies()?;
        let mut spec = ConstraintSpec::new();
        for (volume, strategy) in checked_volumes(self, &strategies)? {
            let mut builder =
                derive_replica_rules(&volume, strategy, topology, VolumeConstraints::builder())?;
            for relation in self.info.relations_of(&volume.name) {
                builder = relation.apply(builder);
            }
            spec = spec.with_volume(volume.name, builder.build());
        }
        Ok(spec)
    }
}

/// Volume relations, with optional fixed domains per volume.
#[derive(Debug, Clone)]
pub struct VolumeRuleCase {
    info: CaseInfo,
    pinned: Vec<(VolumeId, CandidateDomain)>,
}

impl VolumeRuleCase {
    fn pin(mut self, volume: &str, domain: CandidateDomain) -> Self {
        self.pinned.push((VolumeId::new(volume), domain));
        self
    }
}

impl RuleCase for VolumeRuleCase {
    fn name(&self) -> &str {
        self.info.name
    }

    fn description(&self) -> &str {
        self.info.description
    }

    fn suite(&self) -> Suite {
        self.info.suite
    }

    fn label_plan(&self) -> LabelPlan {
        self.info.labels.clone()
    }

    fn strategy_document(&self) -> &str {
        self.info.document
    }

    fn storage_class_strategies(&self) -> BTreeMap<String, Option<String>> {
        self.info.storage_class_strategies()
    }

    fn constraints(&self, _topology: &TopologyIndex) -> Result<ConstraintSpec, RuleError> {
        let strategies = self.strategies()?;
        let mut spec = ConstraintSpec::new();
        for (volume, _) in checked_volumes(self, &strategies)? {
            let mut builder = VolumeConstraints::builder();
            let pinned: Vec<CandidateDomain> = self
                .pinned
                .iter()
                .filter(|(name, _)| name == &volume.name)
                .map(|(_, domain)| domain.clone())
                .collect();
            if !pinned.is_empty() {
                builder = builder.affinity(pinned);
            }
            for relation in self.info.relations_of(&volume.name) {
                builder = relation.apply(builder);
            }
            spec = spec.with_volume(volume.name, builder.build());
        }
        Ok(spec)
    }
}

fn replica_case(info: CaseInfo) -> ReplicaRuleCase {
    ReplicaRuleCase { info }
}

fn volume_case(info: CaseInfo) -> VolumeRuleCase {
    VolumeRuleCase {
        info,
        pinned: Vec::new(),
    }
}

fn zones_and_regions(pairs: &[(&str, &str)]) -> LabelPlan {
    pairs.iter().fold(LabelPlan::new(), |plan, (zone, region)| {
        plan.node([(ZONE_KEY, *zone), (REGION_KEY, *region)])
    })
}

fn media_types() -> LabelPlan {
    LabelPlan::new()
        .node([("media_type", "SSD"), ("vps_test", "test")])
        .node([("media_type", "SATA"), ("vps_test", "test")])
        .node([("media_type", "SSD"), ("vps_test", "test")])
        .node([("media_type", "SSD"), ("vps_test", "test")])
}

const SSD_REQUIRED: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  replicaAffinity:
  - enforcement: required
    matchExpressions:
    - key: media_type
      operator: In
      values:
      - "SSD"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  replicaAffinity:
  - enforcement: required
    matchExpressions:
    - key: media_type
      operator: In
      values:
      - "SSD"
"#;

/// Replicas on every SSD node.
pub fn required_node_affinity() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "required-node-affinity",
        description: "required replica affinity to media_type=SSD nodes",
        suite: Suite::ReplicaAffinity,
        labels: media_types(),
        document: SSD_REQUIRED,
        strategies: [Some("placement-1"), Some("placement-2"), None],
        relations: Vec::new(),
    })
}

const SSD_PREFERRED: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  replicaAffinity:
  - enforcement: preferred
    matchExpressions:
    - key: media_type
      operator: In
      values:
      - "SSD"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  replicaAffinity:
  - enforcement: preferred
    matchExpressions:
    - key: media_type
      operator: In
      values:
      - "SSD"
"#;

/// SSD nodes preferred; any placement passes.
pub fn preferred_node_affinity() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "preferred-node-affinity",
        description: "preferred replica affinity to media_type=SSD nodes",
        suite: Suite::ReplicaAffinity,
        labels: media_types(),
        document: SSD_PREFERRED,
        strategies: [Some("placement-1"), Some("placement-2"), None],
        relations: Vec::new(),
    })
}

const NUMERIC: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  replicaAffinity:
  - enforcement: required
    matchExpressions:
    - key: iops
      operator: Gt
      values:
      - "60"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  replicaAffinity:
  - enforcement: required
    matchExpressions:
    - key: latency
      operator: Lt
      values:
      - "50"
"#;

/// `Gt` and `Lt` selectors on integer labels.
pub fn numeric_node_affinity() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "numeric-node-affinity",
        description: "required replica affinity with iops Gt and latency Lt",
        suite: Suite::ReplicaAffinity,
        labels: [("90", "50"), ("80", "40"), ("70", "30"), ("60", "20")]
            .into_iter()
            .fold(LabelPlan::new(), |plan, (iops, latency)| {
                plan.node([("iops", iops), ("latency", latency)])
            }),
        document: NUMERIC,
        strategies: [Some("placement-1"), Some("placement-2"), None],
        relations: Vec::new(),
    })
}

const TOPOLOGY_AFFINITY: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  replicaAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-3
spec:
  replicaAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_region
"#;

/// All replicas of a volume inside one zone (one region for aggregated).
pub fn replica_topology_affinity() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "replica-topology-affinity",
        description: "replica affinity by zone and region topology keys",
        suite: Suite::ReplicaAffinity,
        labels: zones_and_regions(&[
            ("east", "usa"),
            ("east", "usa"),
            ("east", "usa"),
            ("east", "usa"),
            ("west", "usa"),
            ("west", "usa"),
            ("west", "usa"),
            ("west", "usa"),
        ]),
        document: TOPOLOGY_AFFINITY,
        strategies: [Some("placement-1"), Some("placement-1"), Some("placement-3")],
        relations: Vec::new(),
    })
}

const TOPOLOGY_SPREAD: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  replicaAntiAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-3
spec:
  replicaAntiAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_region
"#;

/// Replicas spread one per zone (one per region for aggregated groups).
pub fn replica_topology_spread() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "replica-topology-spread",
        description: "replica anti-affinity by zone and region topology keys",
        suite: Suite::ReplicaAffinity,
        labels: zones_and_regions(&[
            ("east", "usa"),
            ("east", "usa"),
            ("west", "asia"),
            ("west", "asia"),
            ("south", "eu"),
            ("south", "eu"),
            ("north", "jp"),
            ("north", "jp"),
        ]),
        document: TOPOLOGY_SPREAD,
        strategies: [Some("placement-1"), Some("placement-1"), Some("placement-3")],
        relations: Vec::new(),
    })
}

const UNSATISFIABLE: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  replicaAffinity:
  - enforcement: required
    matchExpressions:
    - key: "region"
      operator: In
      values:
      - "infra"
"#;

/// No node carries the required label, so every volume stays pending.
pub fn unsatisfiable_node_affinity() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "unsatisfiable-node-affinity",
        description: "required replica affinity to a label no node has",
        suite: Suite::Pending,
        labels: LabelPlan::new(),
        document: UNSATISFIABLE,
        strategies: [Some("placement-1"), Some("placement-1"), Some("placement-1")],
        relations: Vec::new(),
    })
}

/// Node-level volume relation between the two mysql volumes, both provisioned
/// from `placement-2`.
fn volume_selector_case(
    name: &'static str,
    description: &'static str,
    document: &'static str,
    relation: VolumeRelation,
) -> VolumeRuleCase {
    volume_case(CaseInfo {
        name,
        description,
        suite: Suite::VolumeAffinity,
        labels: LabelPlan::new(),
        document,
        strategies: [Some("placement-2"), Some("placement-2"), None],
        relations: vec![relation],
    })
}

const AFFINITY_EXISTS: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: Exists
"#;

const AFFINITY_IN: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: In
      values:
      - "mysql"
"#;

const AFFINITY_DOES_NOT_EXIST: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: DoesNotExist
"#;

const AFFINITY_NOT_IN: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: NotIn
      values:
      - "mysql"
"#;

const ANTI_AFFINITY_EXISTS: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAntiAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: Exists
"#;

const ANTI_AFFINITY_IN: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAntiAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: In
      values:
      - "mysql"
"#;

const ANTI_AFFINITY_DOES_NOT_EXIST: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAntiAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: DoesNotExist
"#;

const ANTI_AFFINITY_NOT_IN: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAntiAffinity:
  - enforcement: required
    matchExpressions:
    - key: app
      operator: NotIn
      values:
      - "mysql"
"#;

/// Volume affinity to labelled volumes: the secondary volume joins the primary.
pub fn volume_affinity_exists() -> VolumeRuleCase {
    volume_selector_case(
        "volume-affinity-exists",
        "volume affinity with app Exists",
        AFFINITY_EXISTS,
        VolumeRelation::coincide(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Volume affinity to `app=mysql` volumes.
pub fn volume_affinity_in() -> VolumeRuleCase {
    volume_selector_case(
        "volume-affinity-in",
        "volume affinity with app In mysql",
        AFFINITY_IN,
        VolumeRelation::coincide(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Affinity to unlabelled volumes keeps the two volumes apart.
pub fn volume_affinity_does_not_exist() -> VolumeRuleCase {
    volume_selector_case(
        "volume-affinity-does-not-exist",
        "volume affinity with app DoesNotExist",
        AFFINITY_DOES_NOT_EXIST,
        VolumeRelation::exclude(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Affinity to non-mysql volumes keeps the two volumes apart.
pub fn volume_affinity_not_in() -> VolumeRuleCase {
    volume_selector_case(
        "volume-affinity-not-in",
        "volume affinity with app NotIn mysql",
        AFFINITY_NOT_IN,
        VolumeRelation::exclude(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Anti-affinity to labelled volumes.
pub fn volume_anti_affinity_exists() -> VolumeRuleCase {
    volume_selector_case(
        "volume-anti-affinity-exists",
        "volume anti-affinity with app Exists",
        ANTI_AFFINITY_EXISTS,
        VolumeRelation::exclude(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Anti-affinity to `app=mysql` volumes.
pub fn volume_anti_affinity_in() -> VolumeRuleCase {
    volume_selector_case(
        "volume-anti-affinity-in",
        "volume anti-affinity with app In mysql",
        ANTI_AFFINITY_IN,
        VolumeRelation::exclude(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Anti-affinity to unlabelled volumes lets the two volumes share nodes.
pub fn volume_anti_affinity_does_not_exist() -> VolumeRuleCase {
    volume_selector_case(
        "volume-anti-affinity-does-not-exist",
        "volume anti-affinity with app DoesNotExist",
        ANTI_AFFINITY_DOES_NOT_EXIST,
        VolumeRelation::coincide(SEQ_VOLUME, DATA_VOLUME),
    )
}

/// Anti-affinity to non-mysql volumes lets the two volumes share nodes.
pub fn volume_anti_affinity_not_in() -> VolumeRuleCase {
    volume_selector_case(
        "volume-anti-affinity-not-in",
        "volume anti-affinity with app NotIn mysql",
        ANTI_AFFINITY_NOT_IN,
        VolumeRelation::coincide(SEQ_VOLUME, DATA_VOLUME),
    )
}

const VOLUME_TOPOLOGY_AFFINITY: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
  - enforcement: required
    matchExpressions:
      - key: "failure-domain.beta.kubernetes.io/px_zone"
        operator: In
        values:
          - "east"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-3
spec:
  volumeAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_region
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
  - enforcement: required
    matchExpressions:
      - key: "failure-domain.beta.kubernetes.io/px_region"
        operator: In
        values:
          - "usa"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  volumeAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
    matchExpressions:
      - key: "failure-domain.beta.kubernetes.io/px_zone"
        operator: In
        values:
          - "east"
"#;

/// Mysql volumes gathered in the east zone, the aggregated one in the usa
/// region.
pub fn volume_topology_affinity() -> VolumeRuleCase {
    volume_case(CaseInfo {
        name: "volume-topology-affinity",
        description: "volume affinity by topology key, pinned to zone east and region usa",
        suite: Suite::VolumeAffinity,
        labels: zones_and_regions(&[
            ("east", "usa"),
            ("east", "usa"),
            ("east", "usa"),
            ("south", "usa"),
            ("south", "jp"),
            ("south", "jp"),
            ("north", "jp"),
            ("north", "jp"),
        ]),
        document: VOLUME_TOPOLOGY_AFFINITY,
        strategies: [Some("placement-2"), Some("placement-2"), Some("placement-3")],
        relations: vec![VolumeRelation::coincide(SEQ_VOLUME, DATA_VOLUME).in_domain(ZONE_KEY)],
    })
    .pin(DATA_VOLUME, CandidateDomain::label(ZONE_KEY, "east"))
    .pin(SEQ_VOLUME, CandidateDomain::label(ZONE_KEY, "east"))
    .pin(AGGR_VOLUME, CandidateDomain::label(REGION_KEY, "usa"))
}

fn six_zones() -> LabelPlan {
    zones_and_regions(&[
        ("east", "usa"),
        ("east", "usa"),
        ("west", "usa"),
        ("central", "usa"),
        ("middle", "jp"),
        ("south", "jp"),
        ("north", "jp"),
        ("north", "jp"),
    ])
}

const VOLUME_TOPOLOGY_ANTI_AFFINITY: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAntiAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-3
spec:
  volumeAntiAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_region
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  volumeAntiAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
"#;

/// The two mysql volumes never share a zone.
pub fn volume_topology_anti_affinity() -> VolumeRuleCase {
    volume_case(CaseInfo {
        name: "volume-topology-anti-affinity",
        description: "volume anti-affinity by zone topology key",
        suite: Suite::VolumeAffinity,
        labels: six_zones(),
        document: VOLUME_TOPOLOGY_ANTI_AFFINITY,
        strategies: [Some("placement-1"), Some("placement-2"), None],
        relations: vec![VolumeRelation::exclude(SEQ_VOLUME, DATA_VOLUME).in_domain(ZONE_KEY)],
    })
}

const MULTIPLE_ANTI_AFFINITY: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  volumeAntiAffinity:
  - enforcement: required
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
  - enforcement: required
    matchExpressions:
      - key: voltype
        operator: In
        values:
         - "seq"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAntiAffinity:
  - enforcement: required
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
  - enforcement: required
    matchExpressions:
      - key: voltype
        operator: In
        values:
         - "data"
"#;

/// Each volume's strategy keeps it off the other's nodes.
pub fn multiple_volume_anti_affinity() -> VolumeRuleCase {
    volume_case(CaseInfo {
        name: "multiple-volume-anti-affinity",
        description: "several volume anti-affinity rules per strategy",
        suite: Suite::VolumeAffinity,
        labels: six_zones(),
        document: MULTIPLE_ANTI_AFFINITY,
        strategies: [Some("placement-1"), Some("placement-2"), None],
        relations: vec![
            VolumeRelation::exclude(DATA_VOLUME, SEQ_VOLUME),
            VolumeRelation::exclude(SEQ_VOLUME, DATA_VOLUME),
        ],
    })
}

const REPLICA_AND_VOLUME_AFFINITY: &str = r#"apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-2
spec:
  volumeAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
  replicaAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-3
spec:
  volumeAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_region
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
---
apiVersion: portworx.io/v1beta2
kind: VolumePlacementStrategy
metadata:
  name: placement-1
spec:
  volumeAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
    matchExpressions:
      - key: app
        operator: In
        values:
          - "mysql"
  replicaAffinity:
  - enforcement: required
    topologyKey: failure-domain.beta.kubernetes.io/px_zone
"#;

/// Replicas of each mysql volume in one zone, and both volumes in the same
/// zone.
pub fn replica_and_volume_topology_affinity() -> ReplicaRuleCase {
    replica_case(CaseInfo {
        name: "replica-and-volume-topology-affinity",
        description: "replica and volume affinity on the zone topology key",
        suite: Suite::ReplicaVolumeAffinity,
        labels: zones_and_regions(&[
            ("east", "usa"),
            ("east", "usa"),
            ("east", "usa"),
            ("west", "usa"),
            ("west", "jp"),
            ("north", "jp"),
            ("north", "jp"),
            ("north", "jp"),
        ]),
        document: REPLICA_AND_VOLUME_AFFINITY,
        strategies: [Some("placement-1"), Some("placement-2"), None],
        relations: vec![VolumeRelation::coincide(SEQ_VOLUME, DATA_VOLUME).in_domain(ZONE_KEY)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::apply_label_plan;
    use rpv_core::{
        InputError, Labels, Observed, ReplicaAssignment, Verifier, Violation, VolumeReport,
    };
    use rpv_types::{Domain, NodeId};

    fn cluster() -> BTreeMap<NodeId, Labels> {
        (1..=8)
            .map(|i| (NodeId::new(format!("n{}", i)), Labels::new()))
            .collect()
    }

    fn flat(nodes: &[&str]) -> ReplicaAssignment {
        ReplicaAssignment::flat(nodes.iter().copied())
    }

    fn verify(case: &dyn RuleCase, placements: &[(&str, ReplicaAssignment)]) -> Vec<VolumeReport> {
        let labels = apply_label_plan(&cluster(), &case.label_plan()).unwrap();
        let topology = TopologyIndex::build(labels);
        let spec = case.constraints(&topology).unwrap();
        let assignments: BTreeMap<VolumeId, Observed> = placements
            .iter()
            .map(|(volume, assignment)| (VolumeId::new(*volume), Ok(assignment.clone())))
            .collect();
        Verifier::new(&topology).check_all(&spec, &assignments)
    }

    fn all_pass(reports: &[VolumeReport]) -> bool {
        !reports.is_empty() && reports.iter().all(VolumeReport::passed)
    }

    fn violations_of<'a>(reports: &'a [VolumeReport], volume: &str) -> &'a [Violation] {
        reports
            .iter()
            .find(|r| r.volume.as_str() == volume)
            .and_then(|r| r.outcome.as_ref().ok())
            .map(|v| v.violations())
            .unwrap_or(&[])
    }

    #[test]
    fn every_document_parses_and_names_its_strategies() {
        let cases: Vec<Box<dyn RuleCase>> = vec![
            Box::new(required_node_affinity()),
            Box::new(preferred_node_affinity()),
            Box::new(numeric_node_affinity()),
            Box::new(replica_topology_affinity()),
            Box::new(replica_topology_spread()),
            Box::new(unsatisfiable_node_affinity()),
            Box::new(volume_affinity_exists()),
            Box::new(volume_affinity_in()),
            Box::new(volume_affinity_does_not_exist()),
            Box::new(volume_affinity_not_in()),
            Box::new(volume_anti_affinity_exists()),
            Box::new(volume_anti_affinity_in()),
            Box::new(volume_anti_affinity_does_not_exist()),
            Box::new(volume_anti_affinity_not_in()),
            Box::new(volume_topology_affinity()),
            Box::new(volume_topology_anti_affinity()),
            Box::new(multiple_volume_anti_affinity()),
            Box::new(replica_and_volume_topology_affinity()),
        ];
        for case in &cases {
            let strategies = case.strategies().unwrap();
            assert!(!strategies.is_empty(), "{}", case.name());
            for name in case.storage_class_strategies().values().flatten() {
                assert!(strategies.get(name).is_ok(), "{}: {}", case.name(), name);
            }
        }
    }

    #[test]
    fn unmapped_storage_class_not_checked() {
        let labels = apply_label_plan(&cluster(), &media_types()).unwrap();
        let spec = required_node_affinity()
            .constraints(&TopologyIndex::build(labels))
            .unwrap();
        assert_eq!(spec.len(), 2);
        assert!(spec.get(&VolumeId::new(AGGR_VOLUME)).is_none());
    }

    #[test]
    fn required_node_affinity_verdicts() {
        let case = required_node_affinity();
        let ssd = flat(&["n1", "n3", "n4"]);
        assert!(all_pass(&verify(
            &case,
            &[(DATA_VOLUME, ssd.clone()), (SEQ_VOLUME, ssd)]
        )));

        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n1", "n3", "n4"])),
            ],
        );
        assert!(matches!(
            violations_of(&reports, DATA_VOLUME),
            [Violation::RequiredNodeAbsent { node, .. }] if node.as_str() == "n4"
        ));
        assert!(violations_of(&reports, SEQ_VOLUME).is_empty());
    }

    #[test]
    fn preferred_node_affinity_verdicts() {
        let case = preferred_node_affinity();
        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n2", "n5", "n6"])),
                (SEQ_VOLUME, flat(&["n1", "n3", "n4"])),
            ],
        );
        assert!(all_pass(&reports));

        let reports = verify(&case, &[(SEQ_VOLUME, flat(&["n1", "n3", "n4"]))]);
        let data = reports.iter().find(|r| r.volume.as_str() == DATA_VOLUME).unwrap();
        assert!(matches!(data.outcome, Err(InputError::EmptyAssignment { .. })));
    }

    #[test]
    fn numeric_node_affinity_verdicts() {
        let case = numeric_node_affinity();
        assert!(all_pass(&verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n2", "n3", "n4"])),
            ],
        )));

        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n1", "n2", "n3"])),
            ],
        );
        assert!(matches!(
            violations_of(&reports, SEQ_VOLUME),
            [Violation::RequiredNodeAbsent { node, .. }] if node.as_str() == "n4"
        ));
    }

    #[test]
    fn replica_topology_affinity_verdicts() {
        let case = replica_topology_affinity();
        let aggr = ReplicaAssignment::grouped([["n1", "n2"], ["n5", "n6"]]).unwrap();
        assert!(all_pass(&verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n5", "n6", "n7"])),
                (AGGR_VOLUME, aggr.clone()),
            ],
        )));

        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n5"])),
                (SEQ_VOLUME, flat(&["n5", "n6", "n7"])),
                (AGGR_VOLUME, aggr),
            ],
        );
        assert!(matches!(
            violations_of(&reports, DATA_VOLUME),
            [Violation::NoCandidateDomain { .. }]
        ));
    }

    #[test]
    fn replica_topology_spread_verdicts() {
        let case = replica_topology_spread();
        let aggr = ReplicaAssignment::grouped([["n1", "n3"], ["n5", "n7"]]).unwrap();
        assert!(all_pass(&verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n3", "n5"])),
                (SEQ_VOLUME, flat(&["n2", "n4", "n7"])),
                (AGGR_VOLUME, aggr.clone()),
            ],
        )));

        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n2", "n4", "n7"])),
                (AGGR_VOLUME, aggr),
            ],
        );
        let data = violations_of(&reports, DATA_VOLUME);
        assert!(data.iter().any(|v| matches!(
            v,
            Violation::DomainOverloaded { domain, .. } if *domain == Domain::new(ZONE_KEY, "east")
        )));
        assert!(data
            .iter()
            .any(|v| matches!(v, Violation::RedundancyMismatch { .. })));
    }

    #[test]
    fn unsatisfiable_node_affinity_verdicts() {
        let case = unsatisfiable_node_affinity();
        let reports = verify(&case, &[]);
        assert_eq!(reports.len(), 3);
        assert!(all_pass(&reports));

        let reports = verify(&case, &[(DATA_VOLUME, flat(&["n1"]))]);
        assert!(matches!(
            violations_of(&reports, DATA_VOLUME),
            [Violation::UnexpectedPlacement { .. }]
        ));
    }

    fn shared_nodes_pass(case: &dyn RuleCase) -> bool {
        all_pass(&verify(
            case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n1", "n2", "n3"])),
            ],
        ))
    }

    fn disjoint_nodes_pass(case: &dyn RuleCase) -> bool {
        all_pass(&verify(
            case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n4", "n5", "n6"])),
            ],
        ))
    }

    #[test]
    fn colocating_volume_cases() {
        for case in [
            volume_affinity_exists(),
            volume_affinity_in(),
            volume_anti_affinity_does_not_exist(),
            volume_anti_affinity_not_in(),
        ] {
            assert!(shared_nodes_pass(&case), "{}", case.name());
            assert!(!disjoint_nodes_pass(&case), "{}", case.name());

            let reports = verify(
                &case,
                &[
                    (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                    (SEQ_VOLUME, flat(&["n1", "n2", "n4"])),
                ],
            );
            assert!(matches!(
                violations_of(&reports, SEQ_VOLUME),
                [Violation::UnmatchedPeerNode { node, .. }] if node.as_str() == "n4"
            ));
        }
    }

    #[test]
    fn separating_volume_cases() {
        for case in [
            volume_affinity_does_not_exist(),
            volume_affinity_not_in(),
            volume_anti_affinity_exists(),
            volume_anti_affinity_in(),
        ] {
            assert!(disjoint_nodes_pass(&case), "{}", case.name());
            assert!(!shared_nodes_pass(&case), "{}", case.name());

            let reports = verify(
                &case,
                &[
                    (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                    (SEQ_VOLUME, flat(&["n3", "n4", "n5"])),
                ],
            );
            assert!(matches!(
                violations_of(&reports, SEQ_VOLUME),
                [Violation::SharedPeerNode { .. }]
            ));
        }
    }

    #[test]
    fn volume_topology_affinity_verdicts() {
        let case = volume_topology_affinity();
        let aggr = ReplicaAssignment::grouped([["n1", "n2"], ["n3", "n4"]]).unwrap();
        assert!(all_pass(&verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n1", "n2", "n3"])),
                (AGGR_VOLUME, aggr.clone()),
            ],
        )));

        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n1", "n2", "n4"])),
                (AGGR_VOLUME, aggr),
            ],
        );
        let seq = violations_of(&reports, SEQ_VOLUME);
        assert!(seq
            .iter()
            .any(|v| matches!(v, Violation::NoCandidateDomain { .. })));
        assert!(seq
            .iter()
            .any(|v| matches!(v, Violation::NoCommonDomain { .. })));
        assert!(violations_of(&reports, DATA_VOLUME).is_empty());
    }

    #[test]
    fn volume_topology_anti_affinity_verdicts() {
        let case = volume_topology_anti_affinity();
        assert!(all_pass(&verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n3", "n4"])),
                (SEQ_VOLUME, flat(&["n5", "n6", "n7"])),
            ],
        )));

        // n2 shares zone east with n1 without sharing a node
        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n3", "n4"])),
                (SEQ_VOLUME, flat(&["n2", "n5", "n6"])),
            ],
        );
        assert!(matches!(
            violations_of(&reports, SEQ_VOLUME),
            [Violation::SharedPeerDomain { domain, .. }] if *domain == Domain::new(ZONE_KEY, "east")
        ));
    }

    #[test]
    fn multiple_volume_anti_affinity_verdicts() {
        let case = multiple_volume_anti_affinity();
        assert!(disjoint_nodes_pass(&case));

        let reports = verify(
            &case,
            &[
                (DATA_VOLUME, flat(&["n1", "n2", "n3"])),
                (SEQ_VOLUME, flat(&["n1", "n4", "n5"])),
            ],
        );
        assert!(!violations_of(&reports, DATA_VOLUME).is_empty());
        assert!(!violations_of(&reports, SEQ_VOLUME).is_empty());
    }

    #[test]
    fn replica_and_volume_topology_affinity_verdicts() {
        let case = replica_and_volume_topology_affinity();
        let north = flat(&["n6", "n7", "n8"]);
        assert!(all_pass(&verify(
            &case,
            &[(DATA_VOLUME, north.clone()), (SEQ_VOLUME, north.clone())],
        )));

        let reports = verify(
            &case,
            &[(DATA_VOLUME, flat(&["n1", "n2", "n3"])), (SEQ_VOLUME, north)],
        );
        assert!(violations_of(&reports, DATA_VOLUME).is_empty());
        assert!(matches!(
            violations_of(&reports, SEQ_VOLUME),
            [Violation::NoCommonDomain { .. }]
        ));
    }
}

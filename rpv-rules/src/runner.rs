//! Running rule cases against a replica source.
//!
//! One run of a case:
//! 1. read node labels from the source
//! 2. apply the case's label plan
//! 3. build the topology index
//! 4. derive the constraints
//! 5. look up every volume the constraints mention
//! 6. verify volume by volume

use rpv_core::{TopologyIndex, Verifier, VolumeReport};
use rpv_driver::{capture_assignments, ReplicaSource};
use rpv_types::VolumeId;
use serde::Serialize;

use crate::case::{RuleCase, Suite};
use crate::catalog::Catalog;
use crate::error::RuleError;
use crate::labels::apply_label_plan;

/// Result of running one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    /// Unique id of this run.
    pub run_id: String,
    /// Case name.
    pub case: String,
    /// Suite of the case.
    pub suite: Suite,
    /// Per-volume outcomes, in volume order.
    pub volumes: Vec<VolumeReport>,
    /// Volumes not checked because an earlier one failed.
    pub skipped: Vec<VolumeId>,
}

impl CaseReport {
    /// Whether every checked volume passed and none was skipped.
    pub fn passed(&self) -> bool {
        self.skipped.is_empty() && self.volumes.iter().all(VolumeReport::passed)
    }

    /// Volumes that failed or could not be checked.
    pub fn failed_volumes(&self) -> impl Iterator<Item = &VolumeReport> {
        self.volumes.iter().filter(|v| !v.passed())
    }
}

/// A case that could not be run at all.
#[derive(Debug)]
pub struct CaseFailure {
    /// Case name.
    pub case: String,
    /// Why it could not run.
    pub error: RuleError,
}

/// Results of a multi-case run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Reports of cases that ran.
    pub reports: Vec<CaseReport>,
    /// Cases that errored before verification.
    pub errors: Vec<CaseFailure>,
}

impl RunSummary {
    /// Whether every case ran and passed.
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.reports.iter().all(CaseReport::passed)
    }

    /// Number of cases that ran and passed.
    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }
}

/// Runs rule cases against one replica source.
pub struct RuleRunner<'a, S: ReplicaSource + ?Sized> {
    source: &'a S,
    fail_fast: bool,
}

impl<'a, S: ReplicaSource + ?Sized> RuleRunner<'a, S> {
    /// Create a runner reading from `source`.
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            fail_fast: false,
        }
    }

    /// Stop at the first failing volume (and, for multi-case runs, the first
    /// failing case).
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run one case.
    pub async fn run(&self, case: &dyn RuleCase) -> Result<CaseReport, RuleError> {
        let run_id = format!("rpv-{}", uuid::Uuid::new_v4().as_simple());
        tracing::info!("[{}] Running case '{}': {}", run_id, case.name(), case.description());

        let labels = self.source.node_labels().await?;
        let labels = apply_label_plan(&labels, &case.label_plan())?;
        let topology = TopologyIndex::build(labels);
        let spec = case.constraints(&topology)?;

        let assignments = capture_assignments(self.source, spec.referenced_volumes()).await;
        let verifier = Verifier::new(&topology);

        let mut volumes = Vec::new();
        let mut skipped = Vec::new();
        for (volume, constraints) in spec.volumes() {
            if self.fail_fast && volumes.iter().any(|v: &VolumeReport| !v.passed()) {
                skipped.push(volume.clone());
                continue;
            }
            let outcome = verifier.check_volume(volume, constraints, &assignments);
            match &outcome {
                Ok(verdict) => tracing::info!("[{}] {}", run_id, verdict),
                Err(e) => tracing::warn!("[{}] {}", run_id, e),
            }
            volumes.push(VolumeReport {
                volume: volume.clone(),
                outcome,
            });
        }

        let report = CaseReport {
            run_id,
            case: case.name().to_string(),
            suite: case.suite(),
            volumes,
            skipped,
        };
        tracing::info!(
            "[{}] Case '{}' {}",
            report.run_id,
            report.case,
            if report.passed() { "passed" } else { "failed" }
        );
        Ok(report)
    }

    /// Run every enabled case of `catalog`, optionally restricted to one suite.
    pub async fn run_all(&self, catalog: &Catalog, suite: Option<Suite>) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in catalog.enabled() {
            if suite.is_some_and(|s| s != entry.case.suite()) {
                continue;
            }
            let passed = match self.run(entry.case.as_ref()).await {
                Ok(report) => {
                    let passed = report.passed();
                    summary.reports.push(report);
                    passed
                }
                Err(error) => {
                    tracing::warn!("Case '{}' could not run: {}", entry.case.name(), error);
                    summary.errors.push(CaseFailure {
                        case: entry.case.name().to_string(),
                        error,
                    });
                    false
                }
            };
            if self.fail_fast && !passed {
                break;
            }
        }
        tracing::info!(
            "{} of {} cases passed",
            summary.passed_count(),
            summary.reports.len() + summary.errors.len()
        );
        summary
    }
}

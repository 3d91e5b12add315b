//! `rpv run` and `rpv run-all`: run rule cases against a cluster snapshot.

use anyhow::{Context, Result};
use rpv_driver::SnapshotDriver;
use rpv_rules::{Catalog, CaseReport, RuleRunner, RunSummary};
use serde::Serialize;
use std::path::Path;

use super::{parse_suite, print_json, print_volume};

/// JSON form of a multi-case run.
#[derive(Serialize)]
struct SummaryOutput<'a> {
    passed: bool,
    reports: &'a [CaseReport],
    errors: Vec<ErrorOutput<'a>>,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    case: &'a str,
    error: String,
}

fn load_driver(snapshot: &Path) -> Result<SnapshotDriver> {
    SnapshotDriver::from_file(snapshot)
        .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))
}

/// Run a single case.
pub async fn one(case: &str, snapshot: &Path, json: bool, fail_fast: bool) -> Result<bool> {
    let catalog = Catalog::standard();
    let entry = catalog.get(case)?;
    if !entry.enabled {
        tracing::warn!("Case '{}' is disabled in the catalog; running anyway", case);
    }

    let driver = load_driver(snapshot)?;
    let report = RuleRunner::new(&driver)
        .fail_fast(fail_fast)
        .run(entry.case.as_ref())
        .await
        .with_context(|| format!("Case {} could not run", case))?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(report.passed())
}

/// Run every enabled case, optionally only one suite.
pub async fn all(snapshot: &Path, suite: Option<&str>, json: bool, fail_fast: bool) -> Result<bool> {
    let suite = parse_suite(suite)?;
    let catalog = Catalog::standard();
    let driver = load_driver(snapshot)?;

    let summary = RuleRunner::new(&driver)
        .fail_fast(fail_fast)
        .run_all(&catalog, suite)
        .await;

    if json {
        print_json(&SummaryOutput {
            passed: summary.passed(),
            reports: &summary.reports,
            errors: summary
                .errors
                .iter()
                .map(|failure| ErrorOutput {
                    case: &failure.case,
                    error: failure.error.to_string(),
                })
                .collect(),
        })?;
    } else {
        print_summary(&summary);
    }
    Ok(summary.passed())
}

fn print_report(report: &CaseReport) {
    let status = if report.passed() { "PASS" } else { "FAIL" };
    println!("{} {} ({}, run {})", status, report.case, report.suite, report.run_id);
    for volume in &report.volumes {
        print_volume(volume);
    }
    for volume in &report.skipped {
        println!("  SKIP  {}", volume);
    }
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        print_report(report);
    }
    for failure in &summary.errors {
        println!("ERROR {}: {}", failure.case, failure.error);
    }
    println!();
    println!(
        "{} passed, {} failed, {} errors",
        summary.passed_count(),
        summary.reports.len() - summary.passed_count(),
        summary.errors.len()
    );
}

//! CLI command implementations.
//!
//! Every command returns whether it passed; `main` turns `false` into a
//! non-zero exit status.

pub mod list;
pub mod run;
pub mod show;
pub mod verify;

use anyhow::Result;
use rpv_core::VolumeReport;
use rpv_rules::Suite;
use serde::Serialize;

/// Parse an optional `--suite` argument.
pub fn parse_suite(suite: Option<&str>) -> Result<Option<Suite>> {
    Ok(suite.map(str::parse).transpose()?)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print one volume's outcome, with violations and notes indented below it.
pub fn print_volume(report: &VolumeReport) {
    match &report.outcome {
        Ok(verdict) => {
            let status = if verdict.passed() { "PASS" } else { "FAIL" };
            println!("  {}  {}", status, report.volume);
            for violation in verdict.violations() {
                println!("        - {}", violation);
            }
            for note in verdict.notes() {
                println!("        note: {}", note);
            }
        }
        Err(e) => println!("  ERROR {}: {}", report.volume, e),
    }
}

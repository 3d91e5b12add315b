//! `rpv verify`: check a constraint file against a cluster snapshot.

use anyhow::{Context, Result};
use rpv_core::{ConstraintSpec, Verifier, VolumeReport};
use rpv_driver::{capture, SnapshotDriver};
use serde::Serialize;
use std::path::Path;

use super::{print_json, print_volume};
use crate::read_file;

#[derive(Serialize)]
struct VerifyOutput<'a> {
    passed: bool,
    volumes: &'a [VolumeReport],
}

/// Parse a constraint file: JSON if it ends in `.json`, TOML otherwise.
pub fn load_constraints(path: &Path) -> Result<ConstraintSpec> {
    let content = read_file(path)?;
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    let spec: ConstraintSpec = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid constraint file {}", path.display()))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Invalid constraint file {}", path.display()))?
    };
    Ok(spec)
}

/// Verify every volume of the constraint file.
pub async fn run(snapshot: &Path, constraints: &Path, json: bool) -> Result<bool> {
    let spec = load_constraints(constraints)?;
    if spec.is_empty() {
        tracing::warn!("Constraint file {} names no volumes", constraints.display());
    }

    let driver = SnapshotDriver::from_file(snapshot)
        .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
    let captured = capture(&driver, spec.referenced_volumes())
        .await
        .context("Failed to read the cluster snapshot")?;

    let topology = captured.topology();
    let reports = Verifier::new(&topology).check_all(&spec, &captured.assignments);
    let passed = reports.iter().all(VolumeReport::passed);

    if json {
        print_json(&VerifyOutput {
            passed,
            volumes: &reports,
        })?;
    } else {
        println!("{} {}", if passed { "PASS" } else { "FAIL" }, constraints.display());
        for report in &reports {
            print_volume(report);
        }
    }
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpv_types::VolumeId;
    use std::io::Write;

    #[test]
    fn constraints_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[volumes.data]
required = ["n1"]
excluded = ["n4"]

[[volumes.data.spread]]
topology_key = "zone"
redundancy = {{ replication_factor = 3 }}
"#
        )
        .unwrap();

        let spec = load_constraints(file.path()).unwrap();
        assert_eq!(spec.len(), 1);
        let data = spec.get(&VolumeId::new("data")).unwrap();
        assert_eq!(data.required().len(), 1);
        assert_eq!(data.spread().len(), 1);
    }

    #[test]
    fn constraints_from_json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"volumes": {{"data": {{"preferred": ["n2"]}}}}}}"#).unwrap();

        let spec = load_constraints(file.path()).unwrap();
        assert_eq!(
            spec.get(&VolumeId::new("data")).unwrap().preferred().len(),
            1
        );
    }

    #[test]
    fn unknown_field_names_the_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[volumes.data]\nrequird = [\"n1\"]\n").unwrap();

        let err = load_constraints(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid constraint file"));
    }
}

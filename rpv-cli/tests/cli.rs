//! End-to-end tests for the `rpv` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ZONE: &str = "failure-domain.beta.kubernetes.io/px_zone";

/// Scratch directory with an empty config file, so a config in the user's
/// home directory never leaks into a test.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        ws.write("rpv.toml", "");
        ws
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn rpv(&self) -> Command {
        let mut cmd = Command::cargo_bin("rpv").unwrap();
        cmd.arg("--config").arg(self.path("rpv.toml"));
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

fn snapshot(data: &str) -> String {
    format!(
        r#"{{
  "nodes": {{ "n1": {{}}, "n2": {{}}, "n3": {{}}, "n4": {{}},
             "n5": {{}}, "n6": {{}}, "n7": {{}}, "n8": {{}} }},
  "volumes": {{
    "mysql-data": {},
    "mysql-data-seq": ["n2", "n4", "n7"],
    "mysql-data-aggr": [["n1", "n3"], ["n5", "n7"]]
  }}
}}"#,
        data
    )
}

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("demos")
        .join(name)
}

#[test]
fn list_shows_enabled_cases() {
    let ws = Workspace::new();
    ws.rpv()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("replica-topology-spread"))
        .stdout(predicate::str::contains("unsatisfiable-node-affinity").not());
}

#[test]
fn list_all_includes_disabled_cases() {
    let ws = Workspace::new();
    ws.rpv()
        .args(["list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unsatisfiable-node-affinity"))
        .stdout(predicate::str::contains("volume-anti-affinity-not-in"));
}

#[test]
fn list_filters_by_suite() {
    let ws = Workspace::new();
    ws.rpv()
        .args(["list", "--suite", "replica-volume-affinity"])
        .assert()
        .success()
        .stdout(predicate::str::contains("replica-and-volume-topology-affinity"))
        .stdout(predicate::str::contains("required-node-affinity").not());
}

#[test]
fn list_rejects_unknown_suite() {
    let ws = Workspace::new();
    ws.rpv()
        .args(["list", "--suite", "stress"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown suite: stress"));
}

#[test]
fn show_prints_strategy_document() {
    let ws = Workspace::new();
    ws.rpv()
        .args(["show", "required-node-affinity"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: VolumePlacementStrategy"))
        .stdout(predicate::str::contains("media_type"))
        .stdout(predicate::str::contains("-> placement-1"));
}

#[test]
fn show_unknown_case_fails() {
    let ws = Workspace::new();
    ws.rpv()
        .args(["show", "no-such-case"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown rule case: no-such-case"));
}

#[test]
fn run_passing_case() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n3", "n5"]"#));
    ws.rpv()
        .args(["run", "replica-topology-spread", "--snapshot"])
        .arg(&snap)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS replica-topology-spread"));
}

#[test]
fn run_failing_case_exits_nonzero() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n2", "n3"]"#));
    ws.rpv()
        .args(["run", "replica-topology-spread", "--snapshot"])
        .arg(&snap)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL replica-topology-spread"))
        .stdout(predicate::str::contains("FAIL  mysql-data"));
}

#[test]
fn run_json_report() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n3", "n5"]"#));
    let output = ws
        .rpv()
        .args(["run", "replica-topology-spread", "--json", "--snapshot"])
        .arg(&snap)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["case"], "replica-topology-spread");
    assert_eq!(report["suite"], "replica-affinity");
    assert_eq!(report["volumes"].as_array().unwrap().len(), 3);
    assert!(report["run_id"].as_str().unwrap().starts_with("rpv-"));
}

#[test]
fn run_without_snapshot_fails() {
    let ws = Workspace::new();
    ws.rpv()
        .args(["run", "replica-topology-spread"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No snapshot given"));
}

#[test]
fn snapshot_from_config() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n3", "n5"]"#));
    ws.write(
        "rpv.toml",
        &format!("[runner]\nsnapshot = {:?}\n", snap.display().to_string()),
    );
    ws.rpv()
        .args(["run", "replica-topology-spread"])
        .assert()
        .success();
}

#[test]
fn run_all_reports_summary() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n3", "n5"]"#));
    ws.rpv()
        .args(["run-all", "--suite", "replica-affinity", "--snapshot"])
        .arg(&snap)
        .assert()
        .stdout(predicate::str::contains("passed,"))
        .stdout(predicate::str::contains("replica-topology-spread"));
}

#[test]
fn verify_demo_constraints_pass() {
    let ws = Workspace::new();
    ws.rpv()
        .arg("verify")
        .arg("--snapshot")
        .arg(demo("cluster.json"))
        .arg("--constraints")
        .arg(demo("constraints.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS  mysql-data-aggr"));
}

#[test]
fn verify_violation_exits_nonzero() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n3", "n5"]"#));
    let constraints = ws.write("constraints.toml", "[volumes.mysql-data]\nrequired = [\"n8\"]\n");
    ws.rpv()
        .arg("verify")
        .arg("--snapshot")
        .arg(&snap)
        .arg("--constraints")
        .arg(&constraints)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL  mysql-data"));
}

#[test]
fn verify_json_constraints_and_report() {
    let ws = Workspace::new();
    let snap = ws.write(
        "cluster.json",
        &format!(
            r#"{{"nodes": {{"n1": {{"{zone}": "east"}}, "n2": {{"{zone}": "east"}}}},
                "volumes": {{"mysql-data": ["n1", "n2"]}}}}"#,
            zone = ZONE
        ),
    );
    let constraints = ws.write(
        "constraints.json",
        &format!(
            r#"{{"volumes": {{"mysql-data": {{"spread": [
                {{"topology_key": "{}", "redundancy": {{"replication_factor": 2}}}}
            ]}}}}}}"#,
            ZONE
        ),
    );
    let output = ws
        .rpv()
        .args(["verify", "--json", "--snapshot"])
        .arg(&snap)
        .arg("--constraints")
        .arg(&constraints)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], false);
    assert_eq!(report["volumes"][0]["volume"], "mysql-data");
}

#[test]
fn verify_missing_volume_is_reported_as_error() {
    let ws = Workspace::new();
    let snap = ws.write("cluster.json", &snapshot(r#"["n1", "n3", "n5"]"#));
    let constraints = ws.write("constraints.toml", "[volumes.absent]\nrequired = [\"n1\"]\n");
    ws.rpv()
        .arg("verify")
        .arg("--snapshot")
        .arg(&snap)
        .arg("--constraints")
        .arg(&constraints)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ERROR absent"));
}

#[test]
fn malformed_config_is_rejected() {
    let ws = Workspace::new();
    ws.write("rpv.toml", "[server]\nport = 1\n");
    ws.rpv()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

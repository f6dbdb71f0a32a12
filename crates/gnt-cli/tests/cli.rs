use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

const FEATURES: &str = r#"[
  {"class": "Substation", "points": [{"x": 0, "y": 0}],
   "properties": {"external_id": "S1", "voltage_level": 22}},
  {"class": "Breaker", "points": [{"x": 5, "y": 0}],
   "properties": {"external_id": "B1", "substation_id": "S1"}},
  {"class": "AcLineSegment", "points": [{"x": 5, "y": 0}, {"x": 50, "y": 0}],
   "properties": {"external_id": "C1", "voltage_level": 22}},
  {"class": "EnergyConsumer", "points": [{"x": 50, "y": 0}],
   "properties": {"external_id": "L1"}}
]"#;

#[test]
fn gnt_validate_reports_dangling_breaker_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("features.json");
    fs::write(&input, FEATURES).unwrap();

    let mut cmd = Command::cargo_bin("gnt").unwrap();
    cmd.args(["validate", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dangling ends      : 1"));
}

#[test]
fn gnt_normalize_writes_snapshot() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("features.json");
    let out = dir.path().join("topology.json");
    fs::write(&input, FEATURES).unwrap();

    let mut cmd = Command::cargo_bin("gnt").unwrap();
    cmd.args([
        "normalize",
        input.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Normalized"));

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let objects = written["snapshot"]["objects"].as_array().unwrap();
    assert!(objects.iter().any(|o| o["external_id"] == "B1"));
    assert!(written["report"]["terminals"]["assigned"].as_u64().unwrap() >= 2);
}

#[test]
fn gnt_rejects_missing_input() {
    let mut cmd = Command::cargo_bin("gnt").unwrap();
    cmd.args(["stats", "does-not-exist.json"]).assert().failure();
}

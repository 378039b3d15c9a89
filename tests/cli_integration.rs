//! CLI integration tests for metastage
//!
//! These tests drive the binary end to end: loading edge and catalog
//! files, staging, and writing manifests.

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command instance for the metastage binary
fn metastage_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("metastage"))
}

fn row(id: &str, name: &str, ty: &str, ref_id: &str, ref_name: &str, ref_ty: &str) -> Value {
    serde_json::json!({
        "MetadataComponentId": id,
        "MetadataComponentName": name,
        "MetadataComponentType": ty,
        "RefMetadataComponentId": ref_id,
        "RefMetadataComponentName": ref_name,
        "RefMetadataComponentType": ref_ty,
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

/// An object, a class that uses it, the class's test and an unrelated page
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();

    let edges = serde_json::json!([
        row("01p1", "OrderService", "ApexClass", "01I9", "Order__c", "CustomObject"),
        row("01p2", "OrderServiceTest", "ApexClass", "01p2", "OrderServiceTest", "ApexClass"),
        row("0663", "OrderPage", "ApexPage", "01p1", "OrderService", "ApexClass"),
    ]);
    write_json(dir.path(), "edges.json", &edges);

    let catalog = serde_json::json!({
        "version": "60.0",
        "types": [
            {"name": "ApexClass", "suffix": "cls", "directoryName": "classes", "hasMetaFile": true},
            {"name": "ApexPage", "suffix": "page", "directoryName": "pages", "hasMetaFile": true},
            {"name": "CustomObject", "childTypeNames": ["CustomField"]},
            {"name": "StaticResource"}
        ],
        "members": [
            {"key": "c1", "id": "01p1", "name": "OrderService", "type": "ApexClass"},
            {"key": "c2", "id": "01p2", "name": "OrderServiceTest", "type": "ApexClass"},
            {"key": "p1", "id": "0663", "name": "OrderPage", "type": "ApexPage"},
            {"key": "o1", "id": "01I9", "name": "Order__c", "type": "CustomObject"},
            {"key": "f1", "name": "Order__c.Total__c", "type": "CustomField"}
        ]
    });
    write_json(dir.path(), "catalog.json", &catalog);

    dir
}

fn setup_cycle_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let edges = serde_json::json!([
        row("a", "Alpha", "CustomObject", "b", "Beta", "CustomObject"),
        row("b", "Beta", "CustomObject", "c", "Gamma", "CustomObject"),
        row("c", "Gamma", "CustomObject", "a", "Alpha", "CustomObject"),
        row("d", "Delta", "CustomObject", "e", "Epsilon", "CustomObject"),
    ]);
    write_json(dir.path(), "edges.json", &edges);
    dir
}

// =============================================================================
// Plan Tests
// =============================================================================

#[test]
fn test_plan_prints_groups() {
    let dir = setup_project();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Group 1:"))
        .stdout(predicate::str::contains("CustomObject: Order__c (01I9)"))
        .stdout(predicate::str::contains("Group 2:"))
        .stdout(predicate::str::contains("ApexClass: OrderServiceTest (01p2)"))
        .stdout(predicate::str::contains("Group 3:"))
        .stdout(predicate::str::contains("UNTESTED").not())
        .stdout(predicate::str::contains("groups: 3, components: 4, untested: 0"));
}

#[test]
fn test_plan_json_output() {
    let dir = setup_project();

    let output = metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json", "--format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: Value = serde_json::from_str(&stdout).unwrap();

    let groups = json["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 3);
    let second: Vec<_> = groups[1]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(second, vec!["OrderService", "OrderServiceTest"]);
    assert!(json["untested"].as_array().unwrap().is_empty());
    assert!(json["residual"].as_array().unwrap().is_empty());
    assert_eq!(json["pairings"][0]["subject"], "01p1");
    assert_eq!(json["pairings"][0]["score"], 100);
}

#[test]
fn test_plan_marks_untested_subject() {
    let dir = TempDir::new().unwrap();
    let edges = serde_json::json!([
        row("01p1", "InvoiceService", "ApexClass", "01I9", "Invoice__c", "CustomObject"),
    ]);
    write_json(dir.path(), "edges.json", &edges);

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("InvoiceService (01p1) -- UNTESTED"));
}

#[test]
fn test_plan_skips_malformed_rows() {
    let dir = TempDir::new().unwrap();
    let edges = serde_json::json!([
        {"MetadataComponentName": "Orphan", "RefMetadataComponentId": "x"},
        row("a", "A", "CustomObject", "b", "B", "CustomObject"),
    ]);
    write_json(dir.path(), "edges.json", &edges);

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no component id"))
        .stdout(predicate::str::contains("components: 2"));
}

#[test]
fn test_plan_reports_residual_cycle() {
    let dir = setup_cycle_project();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("components: 2"))
        .stderr(predicate::str::contains("3 components are caught in dependency cycles"))
        .stderr(predicate::str::contains("a \"Alpha\" (CustomObject) - in-degree 1, waiting on: b \"Beta\""));
}

#[test]
fn test_plan_residual_fail() {
    let dir = setup_cycle_project();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["--residual", "fail", "plan", "edges.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("caught in dependency cycles"));
}

#[test]
fn test_plan_residual_force() {
    let dir = setup_cycle_project();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json", "--residual", "force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Group 3: (forced: cyclic)"))
        .stdout(predicate::str::contains("components: 5"));
}

#[test]
fn test_plan_residual_policy_from_config() {
    let dir = setup_cycle_project();
    fs::write(
        dir.path().join("metastage.toml"),
        "[resolver]\nresidual_policy = \"fail\"\n",
    )
    .unwrap();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json"])
        .assert()
        .failure();
}

#[test]
fn test_plan_missing_file() {
    let dir = TempDir::new().unwrap();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read edges"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = setup_project();
    fs::write(
        dir.path().join("metastage.toml"),
        "[resolver]\ntest_name_pattern = \"(unclosed\"\n",
    )
    .unwrap();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["plan", "edges.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid project config"));
}

// =============================================================================
// Manifest Tests
// =============================================================================

#[test]
fn test_manifest_writes_all_scopes() {
    let dir = setup_project();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["manifest", "edges.json", "catalog.json", "--out-dir", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tests: OrderServiceTest"))
        .stdout(predicate::str::contains("Wrote 5 manifests"));

    let out = dir.path().join("out");
    for name in [
        "package-all.xml",
        "package-group-0.xml",
        "package-group-1.xml",
        "package-group-2.xml",
        "package-group-3.xml",
    ] {
        assert!(out.join(name).is_file(), "missing {}", name);
    }

    let all = fs::read_to_string(out.join("package-all.xml")).unwrap();
    assert!(all.starts_with("<Package xmlns=\"http://soap.sforce.com/2006/04/metadata\">\n"));
    assert!(all.contains("        <members>*</members>\n        <name>StaticResource</name>"));
    assert!(all.ends_with("    <version>60.0</version>\n</Package>\n"));

    let group1 = fs::read_to_string(out.join("package-group-1.xml")).unwrap();
    assert!(group1.contains("<members>Order__c</members>"));
    assert!(!group1.contains("<members>*</members>"));
    assert!(!group1.contains("ApexClass"));

    let group2 = fs::read_to_string(out.join("package-group-2.xml")).unwrap();
    assert!(group2.contains(
        "        <members>OrderService</members>\n        <members>OrderServiceTest</members>\n        <name>ApexClass</name>"
    ));

    // The field has no ID, so it never got a group
    let unassigned = fs::read_to_string(out.join("package-group-0.xml")).unwrap();
    assert!(unassigned.contains("<members>Order__c.Total__c</members>"));
    assert!(unassigned.contains("<name>CustomField</name>"));
}

#[test]
fn test_manifest_is_deterministic() {
    let dir = setup_project();

    for out in ["run1", "run2"] {
        metastage_cmd()
            .current_dir(dir.path())
            .args(["manifest", "edges.json", "catalog.json", "-o", out])
            .assert()
            .success();
    }

    for name in ["package-all.xml", "package-group-1.xml", "package-group-2.xml", "package-group-3.xml"] {
        let first = fs::read(dir.path().join("run1").join(name)).unwrap();
        let second = fs::read(dir.path().join("run2").join(name)).unwrap();
        assert_eq!(first, second, "{} differs between runs", name);
    }
}

#[test]
fn test_manifest_json_output() {
    let dir = setup_project();

    let output = metastage_cmd()
        .current_dir(dir.path())
        .args(["manifest", "edges.json", "catalog.json", "-o", "out", "-f", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    let items = json["manifests"].as_array().unwrap();

    assert_eq!(items.len(), 5);
    assert!(json["skipped_members"].as_array().unwrap().is_empty());
    assert_eq!(items[0]["scope"]["scope"], "all");
    assert_eq!(items[0]["member_count"], 5);
    assert_eq!(items[2]["scope"]["stage"], 0);
    assert_eq!(items[0]["digest"].as_str().unwrap().len(), 64);
}

#[test]
fn test_manifest_uses_config_prefix_and_indent() {
    let dir = setup_project();
    fs::write(
        dir.path().join("metastage.toml"),
        "[manifest]\nfile_prefix = \"deploy\"\nindent = 2\n",
    )
    .unwrap();

    metastage_cmd()
        .current_dir(dir.path())
        .args(["manifest", "edges.json", "catalog.json", "-o", "out"])
        .assert()
        .success();

    let all = fs::read_to_string(dir.path().join("out/deploy-all.xml")).unwrap();
    assert!(all.contains("\n  <types>\n    <members>"));
}

#[test]
fn test_manifest_warns_on_unknown_member_type() {
    let dir = setup_project();
    let catalog = serde_json::json!({
        "version": "60.0",
        "types": [{"name": "ApexClass"}],
        "members": [{"key": "x", "name": "Ghost", "type": "Flow"}]
    });
    write_json(dir.path(), "catalog.json", &catalog);

    metastage_cmd()
        .current_dir(dir.path())
        .args(["manifest", "edges.json", "catalog.json", "-o", "out"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Unknown component type 'Flow'"));

    let all = fs::read_to_string(dir.path().join("out/package-all.xml")).unwrap();
    assert!(!all.contains("Flow"));
}

#[test]
fn test_manifest_json_reports_skipped_members() {
    let dir = setup_project();
    let catalog = serde_json::json!({
        "version": "60.0",
        "types": [{"name": "ApexClass"}, {"name": "ApexPage"}],
        "members": [
            {"key": "k1", "name": "OrderService", "type": "ApexClass"},
            {"key": "k1", "name": "OrderPage", "type": "ApexPage"},
            {"key": "x", "name": "Ghost", "type": "Flow"}
        ]
    });
    write_json(dir.path(), "catalog.json", &catalog);

    let output = metastage_cmd()
        .current_dir(dir.path())
        .args(["manifest", "edges.json", "catalog.json", "-o", "out", "--format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    let skipped: Vec<_> = json["skipped_members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();

    assert_eq!(skipped.len(), 2);
    assert!(skipped[0].contains("OrderPage"));
    assert!(skipped[1].contains("Unknown component type 'Flow'"));
}

// =============================================================================
// Score Tests
// =============================================================================

#[test]
fn test_score_match() {
    metastage_cmd()
        .args(["score", "OrderService", "OrderServiceTest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("75 (match, threshold 50)"));
}

#[test]
fn test_score_no_match_json() {
    let output = metastage_cmd()
        .args(["score", "Alpha", "ZetaUtil", "--format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["matches"], false);
    assert!(json["score"].as_u64().unwrap() < 50);
}

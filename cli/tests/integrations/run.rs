use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_request(dir: &TempDir, body: &Value) -> PathBuf {
    let path = dir.path().join("request.json");
    fs::write(&path, body.to_string()).unwrap();
    path
}

fn family_request() -> Value {
    json!({
        "inputs": [{
            "name": "parent",
            "args": [{"name": "a", "type": "String"}, {"name": "b", "type": "String"}],
            "facts": [[null, ["Emily", "Bob"]], [null, ["Bob", "Alice"]]]
        }],
        "program": "rel grandparent(a, c) = parent(a, b), parent(b, c)",
        "outputs": [{"name": "grandparent"}]
    })
}

#[test]
fn test_cli_run_prints_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_request(&temp_dir, &family_request());

    let output = Command::cargo_bin("scl")
        .unwrap()
        .arg("run")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body, json!({"grandparent": [[1.0, ["Emily", "Alice"]]]}));
}

#[test]
fn test_cli_run_table_format() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_request(&temp_dir, &family_request());

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("run").arg(&path).arg("--format").arg("table");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("grandparent (1 tuple(s))"))
        .stdout(predicate::str::contains(r#"("Emily", "Alice")"#));
}

#[test]
fn test_cli_run_with_provenance_flag() {
    let temp_dir = TempDir::new().unwrap();
    let body = json!({
        "inputs": [{
            "name": "edge",
            "args": [{"type": "Integer"}, {"type": "Integer"}],
            "facts": [[0.5, [0, 1]], [0.4, [1, 2]]]
        }],
        "program": "rel path(a, b) = edge(a, b)\nrel path(a, c) = path(a, b), edge(b, c)",
        "outputs": [{"name": "path"}]
    });
    let path = write_request(&temp_dir, &body);

    let output = Command::cargo_bin("scl")
        .unwrap()
        .arg("run")
        .arg(&path)
        .arg("--provenance")
        .arg("minmaxprob")
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    let through = body["path"]
        .as_array()
        .unwrap()
        .iter()
        .find(|pair| pair[1] == json!([0, 2]))
        .unwrap();
    assert_eq!(through[0], json!(0.4));
}

#[test]
fn test_cli_run_reports_unknown_output() {
    let temp_dir = TempDir::new().unwrap();
    let mut body = family_request();
    body["outputs"] = json!([{"name": "cousin"}]);
    let path = write_request(&temp_dir, &body);

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("run").arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("UnknownRelation"))
        .stderr(predicate::str::contains("cousin"));
}

#[test]
fn test_cli_run_renders_syntax_errors() {
    let temp_dir = TempDir::new().unwrap();
    let mut body = family_request();
    body["program"] = json!("rel grandparent(a, c) = parent(a, b");
    let path = write_request(&temp_dir, &body);

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("run").arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn test_cli_run_tempfile_loader() {
    let temp_dir = TempDir::new().unwrap();
    let programs = TempDir::new().unwrap();
    let path = write_request(&temp_dir, &family_request());

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("run")
        .arg(&path)
        .arg("--program-loader")
        .arg("tempfile")
        .arg("--tmp-dir")
        .arg(programs.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Alice"));
    assert_eq!(fs::read_dir(programs.path()).unwrap().count(), 0);
}

#[test]
fn test_cli_run_rejects_malformed_request() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("request.json");
    fs::write(&path, "{\"inputs\": [").unwrap();

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("run").arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("BadRequest"));
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_check_summarizes_program() {
    let temp_dir = TempDir::new().unwrap();
    let program = temp_dir.path().join("graph.scl");
    fs::write(
        &program,
        r#"
type edge(a: i32, b: i32)
rel edge = {(0, 1), (1, 2)}
rel path(a, b) = edge(a, b)
rel path(a, c) = path(a, b), edge(b, c)
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("check").arg(&program);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("edge"))
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("2 relation(s), 2 fact(s), 2 rule(s)"));
}

#[test]
fn test_check_uses_request_inputs() {
    let temp_dir = TempDir::new().unwrap();
    let program = temp_dir.path().join("family.scl");
    fs::write(&program, "rel grandparent(a, c) = parent(a, b), parent(b, c)\n").unwrap();
    let request = temp_dir.path().join("request.json");
    fs::write(
        &request,
        r#"{
  "inputs": [{"name": "parent", "args": [{"type": "String"}, {"type": "String"}], "facts": []}],
  "program": "",
  "outputs": []
}"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("check").arg(&program);
    cmd.assert().failure().stderr(predicate::str::contains("parent"));

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("check").arg(&program).arg("--request").arg(&request);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("grandparent"))
        .stdout(predicate::str::contains("input"));
}

#[test]
fn test_check_renders_parse_errors_with_file_name() {
    let temp_dir = TempDir::new().unwrap();
    let program = temp_dir.path().join("broken.scl");
    fs::write(&program, "rel path(a, b) = edge(a, b\n").unwrap();

    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("check").arg(&program);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"))
        .stderr(predicate::str::contains("broken.scl"));
}

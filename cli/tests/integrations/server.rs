use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_server_command_available() {
    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_server_help_lists_configuration() {
    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("server").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--eval-timeout-ms"))
        .stdout(predicate::str::contains("SCL_PROVENANCE"));
}

#[test]
fn test_server_rejects_invalid_provenance() {
    let mut cmd = Command::cargo_bin("scl").unwrap();
    cmd.arg("server").arg("--provenance").arg("proofs");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unsupported provenance"));
}

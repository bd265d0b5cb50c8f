//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("slipdfu")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("slipdfu"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn short_help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("slipdfu"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("slipdfu"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn exit_code_two_for_usage_error_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_two_for_usage_error_invalid_flag() {
    let mut cmd = cli_cmd();
    cmd.arg("--invalid-flag-xyz")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn flash_without_package_is_usage_error() {
    let mut cmd = cli_cmd();
    cmd.arg("flash")
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty().not());
}

#[test]
fn flash_with_missing_package_fails() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("does_not_exist.zip");

    let mut cmd = cli_cmd();
    cmd.arg("-p")
        .arg("INVALID_PORT_NAME_XYZ")
        .arg("flash")
        .arg("--no-touch")
        .arg(&nonexistent)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to load firmware package"));
}

#[test]
fn flash_with_invalid_port_fails() {
    let dir = tempdir().expect("tempdir should be created");
    let package = dir.path().join("fw.zip");
    std::fs::write(&package, b"not a zip").expect("write dummy package");

    let mut cmd = cli_cmd();
    let output = cmd
        .arg("-p")
        .arg("INVALID_PORT_NAME_XYZ")
        .arg("flash")
        .arg("--no-touch")
        .arg(&package)
        .output()
        .expect("command should execute");

    assert!(!output.status.success(), "invalid input should not succeed");
}

#[test]
fn unknown_command_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("falsh") // typo for flash
        .assert()
        .failure()
        .stderr(predicate::str::contains("flash").or(predicate::str::contains("did you mean")));
}

#[test]
fn option_terminator_allows_dash_prefixed_operand() {
    let dir = tempdir().expect("tempdir should be created");
    let test_file = dir.path().join("test.zip");

    let mut cmd = cli_cmd();
    cmd.arg("-p")
        .arg("INVALID_PORT_NAME_XYZ")
        .arg("flash")
        .arg("--")
        .arg(test_file)
        .assert()
        .failure(); // File doesn't exist, but parses correctly
}

#[test]
fn port_env_variable_is_recognized() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("does_not_exist.zip");

    // The env port short-circuits enumeration; the load error proves
    // the command got past port selection.
    let mut cmd = cli_cmd();
    cmd.env("SLIPDFU_PORT", "INVALID_PORT_NAME_XYZ")
        .arg("flash")
        .arg("--no-touch")
        .arg(&nonexistent)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load firmware package"));
}

#[test]
fn colors_disabled_when_not_tty() {
    let mut cmd = cli_cmd();
    let output = cmd.arg("--help").assert().success().get_output().clone();

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert!(
        !stdout.contains("\x1b["),
        "Colors should be disabled in non-TTY mode"
    );
}

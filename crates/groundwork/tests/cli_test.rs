#![allow(deprecated)] // TODO: migrate Command::cargo_bin to the cargo_bin! macro

mod common;

use assert_cmd::Command;
use common::{TRACKING_STACK, TestProject};
use predicates::prelude::*;

/// Help lists the main subcommands
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("groundwork"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// Planning is offline: no provider, no cloud calls
#[test]
fn test_plan_on_fresh_project() {
    let project = TestProject::new();
    project.write_stack(TRACKING_STACK);

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("tracking-db-instance"))
        .stdout(predicate::str::contains("tracking-service"))
        .stdout(predicate::str::contains("4 to create"));
}

/// Dependencies must come before dependents in the rendered plan
#[test]
fn test_plan_orders_dependencies_first() {
    let project = TestProject::new();
    project.write_stack(TRACKING_STACK);

    let mut cmd = Command::cargo_bin("ground").unwrap();
    let output = cmd
        .current_dir(project.path())
        .arg("plan")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let pos = |needle: &str| stdout.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
    assert!(pos("tracking-db-instance") < pos("tracking-db\n"));
    assert!(pos("tracking-db\n") < pos("tracking-service"));
    assert!(pos("artifact-bucket") < pos("tracking-service"));
}

/// Malformed stack files exit with the spec-error code
#[test]
fn test_plan_missing_file_exits_2() {
    let project = TestProject::new();

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("plan")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_plan_cycle_exits_2_and_names_resources() {
    let project = TestProject::new();
    project.write_stack(
        r#"
        resource "a" kind="database" {
            depends-on "b"
        }
        resource "b" kind="database" {
            depends-on "a"
        }
        "#,
    );

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("plan")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cycle"))
        .stderr(predicate::str::contains("a"));
}

#[test]
fn test_plan_duplicate_id_exits_2() {
    let project = TestProject::new();
    project.write_stack(
        r#"
        resource "dup" kind="database-instance" {
            tier "db-f1-micro"
        }
        resource "dup" kind="storage-bucket"
        "#,
    );

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("plan")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("dup"));
}

#[test]
fn test_plan_unknown_dependency_exits_2() {
    let project = TestProject::new();
    project.write_stack(
        r#"
        resource "svc" kind="deployed-service" {
            depends-on "ghost"
            image "gcr.io/p/i:latest"
            port 5000
        }
        "#,
    );

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("plan")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ghost"));
}

/// Without --yes, apply shows the plan and stops before touching the
/// provider
#[test]
fn test_apply_requires_yes() {
    let project = TestProject::new();
    project.write_stack(TRACKING_STACK);

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_destroy_with_empty_state() {
    let project = TestProject::new();
    project.write_stack(TRACKING_STACK);

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("destroy")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing recorded as applied"));
}

#[test]
fn test_validate_without_provider_node() {
    let project = TestProject::new();
    project.write_stack(
        r#"
        project "minimal"

        resource "bucket" kind="storage-bucket"
        "#,
    );

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.current_dir(project.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack file is valid"));
}

#[test]
fn test_explicit_file_and_state_dir() {
    let project = TestProject::new();
    let stack = project.write_stack(TRACKING_STACK);
    let state_dir = project.path().join("custom-state");

    let mut cmd = Command::cargo_bin("ground").unwrap();
    cmd.arg("plan")
        .arg("--file")
        .arg(&stack)
        .arg("--state-dir")
        .arg(&state_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 to create"));
}

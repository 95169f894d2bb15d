#[path = "common/mod.rs"]
mod common;

use std::{thread, time::Duration};

use assert_cmd::Command;
use common::write_config;
use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn version_flag_prints_version_and_exits_zero() {
    Command::new(assert_cmd::cargo::cargo_bin!("bakufud"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_config_prints_usage_and_exits_zero() {
    Command::new(assert_cmd::cargo::cargo_bin!("bakufud"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn sigterm_triggers_graceful_shutdown_with_exit_zero() {
    let temp = tempdir().unwrap();
    let config_path = write_config(
        temp.path(),
        r#"
        service {
            web {
                command = "sleep 30";
            }
        }
        "#,
    );

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin!("bakufud"))
        .arg(&config_path)
        .spawn()
        .unwrap();

    // Give the supervisor time to parse the config and spawn its service.
    thread::sleep(Duration::from_millis(300));

    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();

    let status = child.wait().unwrap();
    assert!(status.success());
}

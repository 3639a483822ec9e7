//! Worker CLI error-path specs.

use crate::prelude::*;

#[test]
fn missing_config_argument_is_a_usage_error() {
    worker().assert().failure();
}

#[test]
fn unreadable_config_exits_one() {
    worker()
        .arg("/nonexistent/backend.ini")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("config"));
}

#[test]
fn config_with_missing_credentials_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = write_broken_config(dir.path());

    worker().arg(config).assert().code(1);
}

#[test]
fn cleanup_only_with_unreadable_config_exits_one() {
    worker()
        .args(["--cleanup-only", "1", "/nonexistent/backend.ini"])
        .assert()
        .code(1);
}

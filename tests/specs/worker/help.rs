//! Worker CLI help output specs.

use crate::prelude::*;

#[test]
fn help_shows_usage_and_flags() {
    worker()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Usage:"))
        .stdout(predicates::str::contains("--id-randomize"))
        .stdout(predicates::str::contains("--cleanup-only"))
        .stdout(predicates::str::contains("--forwarded-mysql"))
        .stdout(predicates::str::contains("--run-time"));
}

#[test]
fn version_prints_crate_version() {
    worker()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("0.1"));
}

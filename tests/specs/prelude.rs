//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;

/// A fresh invocation of the worker binary.
pub fn worker() -> Command {
    Command::cargo_bin("rtt-worker").unwrap()
}

/// An INI config whose referenced files do not exist, for failure paths.
pub fn write_broken_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("backend.ini");
    std::fs::write(
        &path,
        "[MySQL-Database]\n\
         Name = rtt\n\
         Address = 127.0.0.1\n\
         Port = 3306\n\
         Credentials-file = /nonexistent/db-credentials.ini\n",
    )
    .unwrap();
    path
}

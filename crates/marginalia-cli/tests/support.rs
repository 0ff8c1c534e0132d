//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;

/// `marginalia` isolated under `home`.
pub fn marginalia(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("marginalia");
    cmd.env("MARGINALIA_HOME", home).env_remove("MARGINALIA_LOG");
    cmd
}

/// Runs a command that must succeed and returns its trimmed stdout.
pub fn stdout_of(home: &Path, args: &[&str]) -> String {
    let output = marginalia(home).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "marginalia {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

pub fn new_conversation(home: &Path, title: &str) -> String {
    stdout_of(home, &["conversations", "new", "--title", title])
}

pub fn add_message(home: &Path, conversation: &str, text: &str, role: &str) -> String {
    stdout_of(home, &["messages", "add", conversation, text, "--role", role])
}

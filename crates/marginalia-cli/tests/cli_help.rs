use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("marginalia")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("conversations"))
        .stdout(predicate::str::contains("messages"))
        .stdout(predicate::str::contains("threads"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_threads_help_shows_subcommands() {
    cargo_bin_cmd!("marginalia")
        .args(["threads", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("reply"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_missing_subcommand_fails() {
    cargo_bin_cmd!("marginalia").assert().failure();
}

//! Integration tests for `marginalia conversations` and `marginalia messages`.

mod support;

use std::fs;

use predicates::prelude::*;
use serde_json::Value;
use support::{add_message, marginalia, new_conversation, stdout_of};
use tempfile::TempDir;

#[test]
fn test_conversations_list_empty() {
    let home = TempDir::new().unwrap();

    marginalia(home.path())
        .args(["conversations", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversations found."));
}

#[test]
fn test_new_conversation_is_listed() {
    let home = TempDir::new().unwrap();
    let id = new_conversation(home.path(), "Trip planning");

    marginalia(home.path())
        .args(["conversations", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trip planning"))
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("0 messages, 0 threads"));
}

#[test]
fn test_show_prints_active_chain() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Greeting");
    add_message(home.path(), &conv, "hello there", "user");
    add_message(home.path(), &conv, "hi! how can I help?", "assistant");

    marginalia(home.path())
        .args(["conversations", "show", &conv])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Greeting"))
        .stdout(predicate::str::contains("[user] hello there"))
        .stdout(predicate::str::contains("[assistant] hi! how can I help?"));
}

#[test]
fn test_show_empty_conversation() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Empty");

    marginalia(home.path())
        .args(["conversations", "show", &conv])
        .assert()
        .success()
        .stdout(predicate::str::contains("Conversation is empty."));
}

#[test]
fn test_conversation_id_prefix_is_accepted() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Prefixed");
    add_message(home.path(), &conv, "hello", "user");

    marginalia(home.path())
        .args(["conversations", "show", &conv[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("[user] hello"));
}

#[test]
fn test_unknown_conversation_fails() {
    let home = TempDir::new().unwrap();

    marginalia(home.path())
        .args(["conversations", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conversation 'nope' not found"));
}

#[test]
fn test_checkout_switches_branch() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Branches");
    let root = add_message(home.path(), &conv, "pick a city", "user");
    let first = add_message(home.path(), &conv, "Lisbon", "assistant");
    stdout_of(
        home.path(),
        &["messages", "add", &conv, "Porto", "--role", "assistant", "--parent", &root],
    );

    let show = stdout_of(home.path(), &["conversations", "show", &conv]);
    assert!(show.contains("Porto"));
    assert!(!show.contains("Lisbon"));

    stdout_of(home.path(), &["messages", "checkout", &conv, &first]);
    let show = stdout_of(home.path(), &["conversations", "show", &conv]);
    assert!(show.contains("Lisbon"));
    assert!(!show.contains("Porto"));
}

#[test]
fn test_delete_message_reattaches_children() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Delete");
    add_message(home.path(), &conv, "first", "user");
    let middle = add_message(home.path(), &conv, "second", "assistant");
    add_message(home.path(), &conv, "third", "user");

    marginalia(home.path())
        .args(["messages", "delete", &conv, &middle])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted message"));

    // The current node was "third", which survives under "first".
    let show = stdout_of(home.path(), &["conversations", "show", &conv]);
    assert!(show.contains("[user] first"));
    assert!(show.contains("[user] third"));
    assert!(!show.contains("second"));
}

#[test]
fn test_add_with_unknown_role_fails() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Roles");

    marginalia(home.path())
        .args(["messages", "add", &conv, "hi", "--role", "robot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown role 'robot'"));
}

#[test]
fn test_snapshot_file_layout() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Stored");
    let root = add_message(home.path(), &conv, "hello", "user");

    let path = home.path().join("conversations").join(format!("{conv}.json"));
    let snapshot: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(snapshot["schema_version"], 1);
    assert_eq!(snapshot["title"], "Stored");
    assert_eq!(snapshot["root"], root.as_str());
    assert_eq!(snapshot["current_node"], root.as_str());
    assert_eq!(snapshot["nodes"][0]["role"], "user");
    assert_eq!(snapshot["nodes"][0]["content"], "hello");
}

#[test]
fn test_add_after_deleting_checked_out_root_continues_conversation() {
    let home = TempDir::new().unwrap();
    let conv = new_conversation(home.path(), "Roots");
    let root = add_message(home.path(), &conv, "pick a city", "user");
    add_message(home.path(), &conv, "Lisbon", "assistant");

    stdout_of(home.path(), &["messages", "checkout", &conv, &root]);
    stdout_of(home.path(), &["messages", "delete", &conv, &root]);
    add_message(home.path(), &conv, "why Lisbon?", "user");

    let show = stdout_of(home.path(), &["conversations", "show", &conv]);
    assert!(show.contains("Lisbon"));
    assert!(show.contains("why Lisbon?"));
    assert!(!show.contains("pick a city"));
}

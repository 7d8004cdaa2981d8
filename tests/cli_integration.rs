//! Integration tests for the `tf` CLI.
//!
//! Each test creates a temp data directory, runs `tf` as a subprocess,
//! and verifies stdout and/or the task document on disk.

use std::fs;
use std::path::Path;
use std::process::Command;

use chrono::{Days, Local};
use tempfile::TempDir;

fn run_tf(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_tf"))
        .arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("TODO_FLOW_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tf");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_tf_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, ok) = run_tf(dir, args);
    assert!(ok, "tf {:?} failed.\nstdout: {}\nstderr: {}", args, stdout, stderr);
    stdout
}

fn run_tf_err(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, ok) = run_tf(dir, args);
    assert!(!ok, "tf {:?} should have failed.\nstdout: {}", args, stdout);
    stderr
}

fn setup() -> TempDir {
    let tmp = TempDir::new().unwrap();
    run_tf_ok(tmp.path(), &["init"]);
    tmp
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("bad json ({}): {}", e, stdout))
}

fn write_tasks(dir: &Path, user: &str, doc: serde_json::Value) {
    let user_dir = dir.join("users").join(user);
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(
        user_dir.join("tasks.json"),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[test]
fn test_init_creates_config() {
    let tmp = TempDir::new().unwrap();
    let out = run_tf_ok(tmp.path(), &["init"]);
    assert!(out.starts_with("initialized todo-flow in"));
    assert!(tmp.path().join("config.toml").exists());

    let again = run_tf_ok(tmp.path(), &["init"]);
    assert!(again.contains("already initialized"));
}

#[test]
fn test_list_empty() {
    let tmp = setup();
    let out = run_tf_ok(tmp.path(), &["list", "today"]);
    assert_eq!(out.trim(), "== Today (0) ==");
}

// ---------------------------------------------------------------------------
// Adding and classification
// ---------------------------------------------------------------------------

#[test]
fn test_add_classifies_by_due_date() {
    let tmp = setup();
    assert_eq!(run_tf_ok(tmp.path(), &["add", "Buy milk"]).trim(), "t1");
    assert_eq!(
        run_tf_ok(tmp.path(), &["add", "Call mom", "--due", "today"]).trim(),
        "t2"
    );
    assert_eq!(
        run_tf_ok(tmp.path(), &["add", "Renew passport", "--due", "+3"]).trim(),
        "t3"
    );

    let today = run_tf_ok(tmp.path(), &["list", "today"]);
    assert!(today.contains("t2   Call mom"));
    assert!(!today.contains("Buy milk"));

    let backlog = run_tf_ok(tmp.path(), &["list", "backlog"]);
    assert!(backlog.contains("t1   Buy milk"));

    let postponed = run_tf_ok(tmp.path(), &["list", "postponed"]);
    assert!(postponed.contains("t3   Renew passport"));
}

#[test]
fn test_add_json_and_document_on_disk() {
    let tmp = setup();
    let out = run_tf_ok(
        tmp.path(),
        &["--json", "add", "Water plants #garden", "--desc", "balcony too"],
    );
    let v = json(&out);
    assert_eq!(v["task"]["id"], "t1");
    assert_eq!(v["task"]["category"], "backlog");
    assert_eq!(v["task"]["tags"][0], "garden");
    assert_eq!(v["notifications"], serde_json::json!([]));

    let doc = json(&fs::read_to_string(tmp.path().join("users/local/tasks.json")).unwrap());
    assert_eq!(doc["next_id"], 1);
    assert_eq!(doc["tasks"]["t1"]["description"], "balcony too");
}

#[test]
fn test_add_rejects_blank_text_and_bad_dates() {
    let tmp = setup();
    let err = run_tf_err(tmp.path(), &["add", "   "]);
    assert!(err.contains("error: task text cannot be empty"));
    let err = run_tf_err(tmp.path(), &["add", "x", "--due", "someday"]);
    assert!(err.contains("invalid due date"));
}

#[test]
fn test_newest_task_goes_on_top() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "first"]);
    run_tf_ok(tmp.path(), &["add", "second"]);
    let out = run_tf_ok(tmp.path(), &["list", "backlog"]);
    let second = out.find("second").unwrap();
    let first = out.find("first").unwrap();
    assert!(second < first);
}

// ---------------------------------------------------------------------------
// Blocking and completion
// ---------------------------------------------------------------------------

#[test]
fn test_block_then_complete_releases_child() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "Paint fence", "--due", "today"]);
    run_tf_ok(tmp.path(), &["add", "Buy paint"]);
    run_tf_ok(tmp.path(), &["block", "t2", "t1"]);

    let today = run_tf_ok(tmp.path(), &["list", "today"]);
    assert!(today.contains("== Today (2) =="));
    assert!(today.contains("  ↳ [ ] t2   Buy paint"));

    let out = run_tf_ok(tmp.path(), &["done", "1"]);
    assert!(out.contains("completed t1"));
    assert!(out.contains("» completed \"Paint fence\": 1 blocked task moved to backlog"));

    let backlog = run_tf_ok(tmp.path(), &["list", "backlog"]);
    assert!(backlog.contains("t2   Buy paint"));
    let shown = json(&run_tf_ok(tmp.path(), &["--json", "show", "t2"]));
    assert!(shown.get("blockedBy").is_none());

    let reopened = run_tf_ok(tmp.path(), &["done", "t1"]);
    assert!(reopened.contains("reopened t1"));
}

#[test]
fn test_block_validation_errors() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "a"]);
    run_tf_ok(tmp.path(), &["add", "b"]);
    run_tf_ok(tmp.path(), &["add", "c"]);

    let err = run_tf_err(tmp.path(), &["block", "t1", "t1"]);
    assert!(err.contains("cannot block itself"));

    let err = run_tf_err(tmp.path(), &["block", "t1", "t9"]);
    assert!(err.contains("blocker not found: t9"));

    run_tf_ok(tmp.path(), &["block", "t2", "t1"]);
    let err = run_tf_err(tmp.path(), &["block", "t3", "t2"]);
    assert!(err.contains("t2 is blocked by another task"));
}

#[test]
fn test_candidates_exclude_blocked_and_self() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "a"]);
    run_tf_ok(tmp.path(), &["add", "b"]);
    run_tf_ok(tmp.path(), &["add", "c"]);
    run_tf_ok(tmp.path(), &["block", "t2", "t1"]);

    let v = json(&run_tf_ok(tmp.path(), &["--json", "candidates", "t3"]));
    let ids: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t1"]);
}

#[test]
fn test_unblock_keeps_position() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "parent", "--due", "today"]);
    run_tf_ok(tmp.path(), &["add", "child"]);
    run_tf_ok(tmp.path(), &["block", "t2", "t1"]);
    let v = json(&run_tf_ok(tmp.path(), &["--json", "unblock", "t2"]));
    assert_eq!(v["task"]["category"], "today");
    assert!(v["task"].get("blockedBy").is_none());
}

#[test]
fn test_rm_unblocks_dependents() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "parent"]);
    run_tf_ok(tmp.path(), &["add", "child"]);
    run_tf_ok(tmp.path(), &["block", "t2", "t1"]);

    let v = json(&run_tf_ok(tmp.path(), &["--json", "rm", "t1"]));
    assert_eq!(v["deleted"], "t1");

    let err = run_tf_err(tmp.path(), &["show", "t1"]);
    assert!(err.contains("task not found: t1"));
    let child = json(&run_tf_ok(tmp.path(), &["--json", "show", "t2"]));
    assert!(child.get("blockedBy").is_none());
}

// ---------------------------------------------------------------------------
// Editing and moving
// ---------------------------------------------------------------------------

#[test]
fn test_edit_due_date_reclassifies() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "Dentist"]);

    let v = json(&run_tf_ok(tmp.path(), &["--json", "edit", "t1", "--due", "today"]));
    assert_eq!(v["task"]["category"], "today");

    let v = json(&run_tf_ok(tmp.path(), &["--json", "edit", "t1", "--no-due"]));
    assert_eq!(v["task"]["category"], "backlog");

    let v = json(&run_tf_ok(
        tmp.path(),
        &["--json", "edit", "t1", "--text", "Dentist at 3pm", "--desc", "bring card"],
    ));
    assert_eq!(v["task"]["text"], "Dentist at 3pm");
    assert_eq!(v["task"]["description"], "bring card");

    let err = run_tf_err(tmp.path(), &["edit", "t1"]);
    assert!(err.contains("nothing to change"));
}

#[test]
fn test_mv_reorders_and_recategorizes() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "one"]);
    run_tf_ok(tmp.path(), &["add", "two"]);
    run_tf_ok(tmp.path(), &["add", "three"]);

    // three, two, one -> one, three, two
    run_tf_ok(tmp.path(), &["mv", "t1", "backlog", "--index", "0"]);
    let v = json(&run_tf_ok(tmp.path(), &["--json", "list", "backlog"]));
    let ids: Vec<&str> = v[0]["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t1", "t3", "t2"]);

    let v = json(&run_tf_ok(tmp.path(), &["--json", "mv", "t3", "today", "--bottom"]));
    assert_eq!(v["task"]["category"], "today");

    let err = run_tf_err(tmp.path(), &["mv", "t2", "completed"]);
    assert!(err.contains("invalid move"));
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[test]
fn test_due_postponed_tasks_migrate_on_load() {
    let tmp = setup();
    let yesterday = Local::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap()
        .to_string();
    write_tasks(
        tmp.path(),
        "local",
        serde_json::json!({
            "next_id": 1,
            "tasks": {
                "t1": {
                    "id": "t1",
                    "text": "Dentist",
                    "timestamp": 0,
                    "order": 0.0,
                    "category": "postponed",
                    "dueDate": yesterday
                }
            }
        }),
    );

    let check = json(&run_tf_ok(tmp.path(), &["--json", "check"]));
    assert_eq!(check["warnings"][0]["type"], "stale_category");

    let out = run_tf_ok(tmp.path(), &["list", "today"]);
    assert!(out.contains("» moved 1 task to today"));
    assert!(out.contains("t1   Dentist  (overdue"));

    let out = run_tf_ok(tmp.path(), &["migrate"]);
    assert_eq!(out.trim(), "nothing to migrate");
}

// ---------------------------------------------------------------------------
// Check, tags, users
// ---------------------------------------------------------------------------

#[test]
fn test_check_reports_dangling_blocker() {
    let tmp = setup();
    write_tasks(
        tmp.path(),
        "local",
        serde_json::json!({
            "next_id": 1,
            "tasks": {
                "t1": {
                    "id": "t1",
                    "text": "Orphan",
                    "timestamp": 0,
                    "order": 0.0,
                    "category": "backlog",
                    "blockedBy": "t42"
                }
            }
        }),
    );
    let out = run_tf_ok(tmp.path(), &["check"]);
    assert!(out.contains("t1 is blocked by missing task t42"));
    assert!(out.contains("✗ tasks have errors"));

    // A dangling blocker degrades to standalone in listings
    let backlog = run_tf_ok(tmp.path(), &["list", "backlog"]);
    assert!(backlog.contains("[ ] t1   Orphan"));
}

#[test]
fn test_check_clean() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "fine"]);
    let out = run_tf_ok(tmp.path(), &["check"]);
    assert!(out.contains("✓ tasks are valid"));
}

#[test]
fn test_tags_and_tag_filter() {
    let tmp = setup();
    run_tf_ok(tmp.path(), &["add", "Fix sink #home"]);
    run_tf_ok(tmp.path(), &["add", "Mow lawn #home #garden"]);
    run_tf_ok(tmp.path(), &["add", "Write report"]);

    let out = run_tf_ok(tmp.path(), &["tags"]);
    let first = out.lines().next().unwrap();
    assert_eq!(first, "#home    2");

    let out = run_tf_ok(tmp.path(), &["list", "backlog", "--tag", "garden"]);
    assert!(out.contains("Mow lawn"));
    assert!(!out.contains("Fix sink"));
}

#[test]
fn test_user_switching() {
    let tmp = setup();
    assert_eq!(run_tf_ok(tmp.path(), &["user"]).trim(), "local");

    run_tf_ok(tmp.path(), &["user", "alice"]);
    assert_eq!(run_tf_ok(tmp.path(), &["user"]).trim(), "alice");
    let config = fs::read_to_string(tmp.path().join("config.toml")).unwrap();
    assert!(config.contains("id = \"alice\""));
    assert!(config.contains("# todo-flow configuration"));

    run_tf_ok(tmp.path(), &["add", "alice's task"]);
    run_tf_ok(tmp.path(), &["--user", "bob", "add", "bob's task"]);
    assert!(tmp.path().join("users/alice/tasks.json").exists());

    let bob = run_tf_ok(tmp.path(), &["--user", "bob", "list", "backlog"]);
    assert!(bob.contains("bob's task"));
    assert!(!bob.contains("alice's task"));

    let err = run_tf_err(tmp.path(), &["user", "../evil"]);
    assert!(err.contains("invalid user id"));
}

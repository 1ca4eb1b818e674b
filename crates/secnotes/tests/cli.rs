use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn secnotes(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("secnotes").expect("binary");
    cmd.current_dir(root)
        .env_remove("SECNOTES_LOG")
        .env_remove("SECNOTES_AUTHOR");
    cmd
}

/// Run with --json and return the `data` of a successful envelope
fn run_json(root: &Path, args: &[&str]) -> Value {
    let output = secnotes(root)
        .arg("--json")
        .args(args)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["ok"], true);
    assert_eq!(body["schema_version"], 1);
    body["data"].clone()
}

fn setup_workspace() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join("src/app.py"),
        "import os\nquery = \"SELECT * FROM users WHERE id=\" + uid\ncursor.execute(query)\n",
    )
    .unwrap();
    secnotes(root)
        .args(["init", "--name", "alice"])
        .assert()
        .success();
    temp
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let temp = setup_workspace();
    secnotes(temp.path())
        .args(["init", "--name", "bob"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("--force"));

    let data = run_json(temp.path(), &["init", "--name", "bob", "--force"]);
    assert_eq!(data["author_name"], "bob");
    assert_eq!(data["collab_enabled"], false);
}

#[test]
fn test_note_lifecycle() {
    let temp = setup_workspace();
    let root = temp.path();

    let added = run_json(
        root,
        &["note", "add", "src/app.py", "--lines", "2-3", "--body", "SQL built from input"],
    );
    let id = added["note_id"].as_str().unwrap().to_string();
    assert_eq!(added["status"], "TODO");

    let list = run_json(root, &["note", "list"]);
    assert_eq!(list["total"], 1);
    let note = &list["notes"][0];
    assert_eq!(note["path"], "src/app.py");
    assert_eq!(note["lines"], "L2-L3");
    assert_eq!(note["title"], "SQL built from input");

    run_json(root, &["note", "status", &id[..8], "vulnerable"]);
    let shown = run_json(root, &["note", "show", &id]);
    assert_eq!(shown["note"]["status"], "Vulnerable");
    let comments = shown["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["author"], "alice");
    assert!(comments[0]["body"]
        .as_str()
        .unwrap()
        .starts_with("[Vulnerable] "));
    assert!(comments[1]["body"].as_str().unwrap().contains("Vulnerable"));

    let filtered = run_json(root, &["note", "list", "--status", "todo"]);
    assert_eq!(filtered["total"], 0);

    run_json(root, &["note", "delete", &id]);
    let list = run_json(root, &["note", "list"]);
    assert_eq!(list["total"], 0);
}

#[test]
fn test_react_twice_takes_reaction_back() {
    let temp = setup_workspace();
    let root = temp.path();
    let added = run_json(
        root,
        &["note", "add", "src/app.py", "--lines", "1", "--body", "unused import"],
    );
    let id = added["note_id"].as_str().unwrap().to_string();
    let comment = added["comment_id"].as_str().unwrap().to_string();

    let first = run_json(root, &["note", "react", &id, &comment, "👍"]);
    assert_eq!(first["count"], 1);
    assert_eq!(first["reacted"], true);

    // each run reloads the notes file
    let second = run_json(root, &["note", "react", &id, &comment, "👍"]);
    assert_eq!(second["count"], 0);
    assert_eq!(second["reacted"], false);

    let other = run_json(
        root,
        &["--author", "bob", "note", "react", &id, &comment, "👍"],
    );
    assert_eq!(other["count"], 1);
    assert_eq!(other["reacted"], true);
}

#[test]
fn test_author_flag_overrides_config() {
    let temp = setup_workspace();
    let root = temp.path();
    let added = run_json(
        root,
        &["--author", "carol", "note", "add", "src/app.py", "--lines", "1", "--body", "check imports"],
    );
    let id = added["note_id"].as_str().unwrap();
    let shown = run_json(root, &["note", "show", id]);
    assert_eq!(shown["comments"][0]["author"], "carol");
}

#[test]
fn test_unknown_note_exits_not_found() {
    let temp = setup_workspace();
    let output = secnotes(temp.path())
        .args(["--json", "note", "show", "deadbeef"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let body: Value = serde_json::from_slice(&output.stderr).expect("json error on stderr");
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "not_found");
}

#[test]
fn test_bad_line_range_is_invalid_args() {
    let temp = setup_workspace();
    secnotes(temp.path())
        .args(["note", "add", "src/app.py", "--lines", "zero", "--body", "x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid line range"));
}

#[test]
fn test_trail_records_snippets() {
    let temp = setup_workspace();
    let root = temp.path();

    let created = run_json(root, &["trail", "create", "login flow"]);
    let trail_id = created["trail_id"].as_str().unwrap().to_string();
    assert_eq!(created["active_trail_id"].as_str(), Some(trail_id.as_str()));

    run_json(root, &["trail", "add", "src/app.py", "--lines", "2", "--note", "source"]);
    run_json(root, &["trail", "add", "src/app.py", "--lines", "3", "--tag", "sink"]);

    let shown = run_json(root, &["trail", "show"]);
    assert_eq!(shown["trail"]["name"], "login flow");
    let crumbs = shown["crumbs"].as_array().unwrap();
    assert_eq!(crumbs.len(), 2);
    assert!(crumbs[0]["snippet"].as_str().unwrap().starts_with("query ="));
    assert_eq!(crumbs[0]["note"], "source");
    assert_eq!(crumbs[1]["snippet"], "cursor.execute(query)");
    assert_eq!(crumbs[1]["tag"], "sink");

    let last = crumbs[1]["crumb_id"].as_str().unwrap().to_string();
    run_json(root, &["trail", "move", &last, "1"]);
    let shown = run_json(root, &["trail", "show", &trail_id]);
    assert_eq!(shown["crumbs"][0]["crumb_id"].as_str(), Some(last.as_str()));

    let list = run_json(root, &["trail", "list"]);
    assert_eq!(list["trails"][0]["crumb_count"], 2);
    assert_eq!(list["trails"][0]["active"], true);
}

#[test]
fn test_trail_add_without_active_trail_fails() {
    let temp = setup_workspace();
    secnotes(temp.path())
        .args(["trail", "add", "src/app.py", "--lines", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no active trail"));
}

#[test]
fn test_import_findings() {
    let temp = setup_workspace();
    let root = temp.path();
    fs::write(
        root.join("findings.json"),
        r#"[
            {"uri": "src/app.py", "startLine": 2, "endLine": 3, "text": "Possible SQL injection", "tool": "bandit"},
            {"uri": "src/app.py", "startLine": 1, "text": "os imported"}
        ]"#,
    )
    .unwrap();

    let imported = run_json(root, &["import", "findings.json", "--tool", "scanner"]);
    assert_eq!(imported["imported"], 2);

    let list = run_json(root, &["note", "list", "--status", "todo"]);
    assert_eq!(list["total"], 2);
    let id = imported["note_ids"][1].as_str().unwrap();
    let shown = run_json(root, &["note", "show", id]);
    assert_eq!(shown["comments"][0]["author"], "scanner");
}

#[test]
fn test_sync_requires_collab() {
    let temp = setup_workspace();
    secnotes(temp.path())
        .arg("sync")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("collaboration is disabled"));
}

#[test]
fn test_two_workspaces_share_notes() {
    let shared = tempdir().unwrap();
    let db = shared.path().join("shared.db");
    let db_arg = db.to_str().unwrap();

    let alice = tempdir().unwrap();
    let bob = tempdir().unwrap();
    for (ws, name) in [(&alice, "alice"), (&bob, "bob")] {
        fs::create_dir_all(ws.path().join("src")).unwrap();
        fs::write(ws.path().join("src/app.py"), "eval(data)\n").unwrap();
        run_json(
            ws.path(),
            &["init", "--name", name, "--collab", "--database", db_arg, "--project", "audit"],
        );
    }

    let added = run_json(
        alice.path(),
        &["note", "add", "src/app.py", "--lines", "1", "--body", "eval on request data"],
    );
    let id = added["note_id"].as_str().unwrap().to_string();

    let report = run_json(bob.path(), &["sync"]);
    assert_eq!(report["pulled"], 1);
    assert_eq!(report["total_notes"], 1);

    run_json(bob.path(), &["note", "reply", &id, "--body", "confirmed"]);

    // alice has nothing unpushed, so bob's newer copy is taken as-is
    let report = run_json(alice.path(), &["sync"]);
    assert_eq!(report["replaced"], 1);
    assert_eq!(report["merged"], 0);
    assert_eq!(report["pushed_updates"], 0);
    let shown = run_json(alice.path(), &["note", "show", &id]);
    let comments = shown["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[1]["author"], "bob");
    assert_eq!(shown["note"]["path"], "src/app.py");
}

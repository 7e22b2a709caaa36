//! End-to-end tests for the `tunesync` binary.

use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;
use tunesync::smart::{encode_smart, Condition, Conjunction, Field, LogicSign, Operator, Rule, RuleSet, Smart};

fn tunesync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tunesync").unwrap();
    cmd.env("TUNESYNC_DB", dir.path().join("lib.db"))
        .env("TUNESYNC_ACTOR", "test")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

const LIBRARY: &str = r#"{"type":"track","persistent_id":"0000000000000001","name":"One","genre":"Rock","location":"file:///1.mp3"}
{"type":"track","persistent_id":"0000000000000002","name":"Two","genre":"Jazz","location":"file:///2.mp3"}
{"type":"playlist","persistent_id":"0000000000000100","name":"Folder","folder":true}
{"type":"playlist","persistent_id":"0000000000000101","name":"Mix","parent_persistent_id":"0000000000000100","track_ids":["0000000000000002","0000000000000001"]}
"#;

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let json = stdout_json(tunesync(&dir).args(["version", "--json"]));
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_commands_require_init() {
    let dir = TempDir::new().unwrap();
    tunesync(&dir)
        .args(["track", "show", "0000000000000001", "--json"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_init_sync_and_read_back() {
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library.jsonl");
    fs::write(&library, LIBRARY).unwrap();

    tunesync(&dir).args(["init", "--json"]).assert().success();

    let json = stdout_json(tunesync(&dir).arg("sync").arg(&library).arg("--json"));
    assert_eq!(json["stats"]["tracks"]["created"], 2);
    assert_eq!(json["stats"]["playlists"]["created"], 2);

    // A second pass over the same file changes nothing.
    let json = stdout_json(tunesync(&dir).arg("sync").arg(&library).arg("--json"));
    assert_eq!(json["stats"]["tracks"]["unchanged"], 2);
    assert_eq!(json["stats"]["playlists"]["unchanged"], 2);

    let json = stdout_json(tunesync(&dir).args(["playlist", "tracks", "0000000000000101", "--json"]));
    assert_eq!(json["count"], 2);
    assert_eq!(json["tracks"][0]["name"], "Two");

    let json = stdout_json(tunesync(&dir).args(["playlist", "children", "0000000000000100", "--json"]));
    assert_eq!(json["playlists"][0]["name"], "Mix");

    // Folder with children cannot be deleted.
    tunesync(&dir)
        .args(["playlist", "delete", "0000000000000100", "--json"])
        .assert()
        .failure()
        .code(5);
}

#[test]
fn test_smart_decode_and_sql() {
    let dir = TempDir::new().unwrap();
    let smart = Smart {
        ruleset: RuleSet::new(
            Conjunction::And,
            vec![Rule::String(Condition::new(
                Field::Genre,
                LogicSign::StrPos,
                Operator::Is,
                vec!["Rock".to_string()],
            ))],
        ),
        ..Default::default()
    };
    let (info, criteria) = encode_smart(&smart);

    let json = stdout_json(tunesync(&dir).args(["smart", "decode", &info, &criteria, "--json"]));
    assert_eq!(json["ruleset"]["conjunction"], "AND");
    assert_eq!(json["ruleset"]["rules"][0]["field"], "genre");

    let json = stdout_json(tunesync(&dir).args(["smart", "sql", &info, &criteria, "--json"]));
    assert!(json["sql"].as_str().unwrap().contains("track.genre = ?"));
    assert_eq!(json["params"][0], "Rock");
}

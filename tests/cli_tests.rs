//! Tests for the `kvlite` binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn kvlite(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kvlite"))
        .arg("--dir")
        .arg(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_put_get_list_del() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();

    let out = kvlite(dir, &["put", "session:1", "alice", "--meta", "n=1"]);
    assert!(out.status.success(), "{out:?}");
    assert!(kvlite(dir, &["put", "session:2", "bob"]).status.success());

    let out = kvlite(dir, &["get", "session:1"]);
    assert!(out.status.success());
    let record: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(record["value"], "alice");
    assert_eq!(record["metadata"]["n"], 1);

    let out = kvlite(dir, &["list", "--prefix", "session:", "--limit", "1"]);
    assert_eq!(stdout(&out), "session:2\n");

    assert!(kvlite(dir, &["del", "session:1"]).status.success());
    assert_eq!(kvlite(dir, &["get", "session:1"]).status.code(), Some(2));
}

#[test]
fn test_table_flag_isolates_records() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();

    assert!(
        kvlite(dir, &["--table", "a", "put", "k", "in-a"])
            .status
            .success()
    );

    assert_eq!(
        kvlite(dir, &["--table", "b", "get", "k"]).status.code(),
        Some(2)
    );
    assert!(kvlite(dir, &["--table", "a", "get", "k"]).status.success());
}

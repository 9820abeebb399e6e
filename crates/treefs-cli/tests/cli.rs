use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn treefs(snapshot: &Path) -> Command {
    let mut cmd = Command::cargo_bin("treefs").unwrap();
    cmd.arg("--snapshot").arg(snapshot).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_mkdir_write_cat() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");

    treefs(&snap).args(["mkdir", "/docs"]).assert().success();
    treefs(&snap)
        .args(["write", "/docs/hello.txt", "hello"])
        .assert()
        .success();
    assert!(snap.exists());

    treefs(&snap)
        .args(["cat", "/docs/hello.txt"])
        .assert()
        .success()
        .stdout("hello");
    treefs(&snap)
        .args(["ls", "/"])
        .assert()
        .success()
        .stdout("docs/\n");
}

#[test]
fn test_write_from_stdin_and_offset() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");

    treefs(&snap)
        .args(["write", "/f"])
        .write_stdin("abcdef")
        .assert()
        .success();
    treefs(&snap)
        .args(["write", "/f", "--offset", "3", "XY"])
        .assert()
        .success();
    treefs(&snap)
        .args(["cat", "/f"])
        .assert()
        .success()
        .stdout("abcXYf");
}

#[test]
fn test_dry_run_does_not_save() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");

    treefs(&snap)
        .args(["--dry-run", "mkdir", "/tmp"])
        .assert()
        .success();
    assert!(!snap.exists());
}

#[test]
fn test_errors_exit_with_errno() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");

    treefs(&snap)
        .args(["cat", "/missing"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));

    treefs(&snap).args(["mkdir", "/a"]).assert().success();
    treefs(&snap).args(["touch", "/a/f"]).assert().success();
    treefs(&snap)
        .args(["rmdir", "/a"])
        .assert()
        .code(39)
        .stderr(predicate::str::contains("directory not empty"));

    treefs(&snap)
        .args(["write", "/a/f", "--offset", "5", "x"])
        .assert()
        .code(22);
    treefs(&snap)
        .args(["mkdir", "/a/"])
        .assert()
        .code(22)
        .stderr(predicate::str::contains("malformed path"));
}

#[test]
fn test_stat_json() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");

    treefs(&snap)
        .args(["touch", "/f", "--mode", "600"])
        .assert()
        .success();
    treefs(&snap)
        .args(["utimens", "/f", "100", "200"])
        .assert()
        .success();

    let output = treefs(&snap).args(["stat", "/f", "--json"]).output().unwrap();
    assert!(output.status.success());
    let attr: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(attr["kind"], "file");
    assert_eq!(attr["mode"], 0o100600);
    assert_eq!(attr["nlink"], 1);
    assert_eq!(attr["atime"], 100);
    assert_eq!(attr["mtime"], 200);
}

#[test]
fn test_tree_listing() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");

    treefs(&snap).args(["mkdir", "/a"]).assert().success();
    treefs(&snap).args(["mkdir", "/a/b"]).assert().success();
    treefs(&snap).args(["write", "/a/x", "12"]).assert().success();
    treefs(&snap).args(["write", "/top", "1"]).assert().success();

    treefs(&snap)
        .arg("tree")
        .assert()
        .success()
        .stdout("/\n  top (1 bytes)\n  a/\n    x (2 bytes)\n    b/\n");
}

#[test]
fn test_config_file_limits() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");
    let config = dir.path().join("treefs.toml");
    std::fs::write(&config, "[limits]\nmax_directories = 2\n").unwrap();

    let run = |path: &str| {
        let mut cmd = treefs(&snap);
        cmd.arg("--config").arg(&config).args(["mkdir", path]);
        cmd
    };
    run("/one").assert().success();
    run("/two")
        .assert()
        .code(28)
        .stderr(predicate::str::contains("resource exhausted"));
}

#[test]
fn test_bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("fs.treefs");
    let config = dir.path().join("treefs.toml");
    std::fs::write(&config, "persist = [").unwrap();

    treefs(&snap)
        .arg("--config")
        .arg(&config)
        .args(["ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

use std::fs::{self, create_dir_all};
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

/// A project with one module and a local store containing the `zips` bucket.
fn project_with_local_store() -> TempDir {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    create_dir_all(root.join("src/main/python")).unwrap();
    fs::write(root.join("src/main/python/handler.py"), "def handle(e, c): pass\n").unwrap();
    create_dir_all(root.join("buckets/zips")).unwrap();
    fs::write(
        root.join("build.yaml"),
        "name: palp\nversion: 7\nbucket_name: zips\nstore:\n  type: local\n  root: buckets\n",
    )
    .unwrap();
    tmp
}

fn cmd(root: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("lambda-packager").expect("Binary exists");
    cmd.args(args)
        .arg("--config")
        .arg(root.join("build.yaml"))
        .env_remove("LAMBDA_BUCKET_NAME");
    cmd
}

#[test]
fn package_writes_the_archive() {
    let tmp = project_with_local_store();

    cmd(tmp.path(), &["package"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Packaged"));

    assert!(tmp.path().join("target/palp.zip").is_file());
}

#[test]
fn deploy_publishes_both_keys() {
    let tmp = project_with_local_store();

    cmd(tmp.path(), &["deploy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v7/palp.zip").and(predicate::str::contains("latest/palp.zip")));

    let archive = fs::read(tmp.path().join("target/palp.zip")).unwrap();
    assert_eq!(fs::read(tmp.path().join("buckets/zips/v7/palp.zip")).unwrap(), archive);
    assert_eq!(fs::read(tmp.path().join("buckets/zips/latest/palp.zip")).unwrap(), archive);
}

#[test]
fn upload_to_missing_bucket_fails() {
    let tmp = project_with_local_store();
    fs::remove_dir(tmp.path().join("buckets/zips")).unwrap();

    cmd(tmp.path(), &["package"]).assert().success();
    cmd(tmp.path(), &["upload"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));

    assert!(!tmp.path().join("buckets/zips").exists());
}

#[test]
fn package_with_skip_install_requires_dependency_dir() {
    let tmp = project_with_local_store();

    cmd(tmp.path(), &["package", "--skip-install"]).assert().failure();
}

//! Integration tests for `KvSession` connect/close and scratch directory cleanup.

use dbwrap::{resources, DbError, Handler, KvConfig, KvSession, Querier, Refiner, DEFAULT_BUCKET};
use std::path::Path;
use tempfile::TempDir;

fn session_in(root: &Path) -> KvSession {
    KvSession::with_config(KvConfig::default().with_temp_root(root))
}

fn entries(root: &Path) -> usize {
    std::fs::read_dir(root).unwrap().count()
}

#[test]
fn test_close_removes_backing_directory() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["s", "A", "B"]).unwrap();

    let dir = session.storage_dir().unwrap();
    assert!(dir.is_dir());
    assert!(dir.starts_with(root.path()));
    assert!(dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with('s'));
    assert!(dir.join("s").is_dir());

    session.close();
    assert!(!dir.exists());
    assert!(!session.is_connected());
    assert_eq!(entries(root.path()), 0);
}

#[test]
fn test_drop_removes_backing_directory() {
    let root = TempDir::new().unwrap();
    let dir = {
        let mut session = session_in(root.path());
        session.connect(&resources!["dropped"]).unwrap();
        session.exec_on(&resources![]).insert("k", "v").unwrap();
        session.storage_dir().unwrap()
    };
    assert!(!dir.exists());
}

#[test]
fn test_close_twice_is_harmless() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["twice"]).unwrap();
    session.close();
    session.close();
    assert!(!session.is_connected());
}

#[test]
fn test_operations_after_close_fail() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["closed", "A"]).unwrap();
    session.exec_on(&resources!["A"]).insert("k", "v").unwrap();
    session.close();

    let err = session.exec_on(&resources!["A"]).insert("k", "v").unwrap_err();
    assert!(matches!(err, DbError::NotConnected));
    let err = session.exec_on(&resources!["A"]).scan().count().unwrap_err();
    assert!(matches!(err, DbError::NotConnected));
}

#[test]
fn test_reconnect_after_close_starts_empty() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["again", "A"]).unwrap();
    session.exec_on(&resources!["A"]).insert("k", "v").unwrap();
    session.close();

    session.connect(&resources!["again", "A"]).unwrap();
    assert_eq!(session.selected_bucket(), DEFAULT_BUCKET);
    assert_eq!(session.exec_on(&resources!["A"]).scan().count().unwrap(), 0);
    session.close();
}

#[test]
fn test_default_bucket_always_exists() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["only-name"]).unwrap();
    assert_eq!(session.bucket_names(), [DEFAULT_BUCKET]);

    session.exec_on(&resources![]).insert("k", "v").unwrap();
    assert_eq!(session.exec_on(&resources![]).scan().count().unwrap(), 1);
}

#[test]
fn test_bucket_names_are_idempotent() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session
        .connect(&resources!["dup", "A", "A", "default", 5, "B"])
        .unwrap();
    assert_eq!(session.bucket_names(), ["A", "B", "default"]);
}

#[test]
fn test_connect_rejects_unusable_names() {
    let root = TempDir::new().unwrap();
    for args in [
        resources![].to_vec(),
        resources![42].to_vec(),
        resources![""].to_vec(),
        resources!["../escape"].to_vec(),
        resources!["s", ""].to_vec(),
    ] {
        let mut session = session_in(root.path());
        let err = session.connect(&args).unwrap_err();
        assert!(
            matches!(err, DbError::Configuration { .. }),
            "{args:?} gave {err}"
        );
        assert!(!session.is_connected());
    }
    assert_eq!(entries(root.path()), 0);
}

#[test]
fn test_connect_fails_when_directory_cannot_be_created() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("no").join("such").join("root");
    let mut session = session_in(&missing);

    let err = session.connect(&resources!["s"]).unwrap_err();
    assert!(matches!(err, DbError::StorageOpen { .. }), "got {err}");
    assert!(!session.is_connected());
    assert!(matches!(
        session.exec_on(&resources![]).insert("k", "v"),
        Err(DbError::NotConnected)
    ));
}

#[test]
fn test_copy_is_same_storage() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["copied", "A"]).unwrap();

    let mut copy = session.copy();
    copy.exec_on(&resources!["A"]).insert("k", "from copy").unwrap();

    let mut dest = String::new();
    session
        .exec_on(&resources!["A"])
        .find("k")
        .unwrap()
        .one(&mut dest)
        .unwrap();
    assert_eq!(dest, "from copy");

    let dir = session.storage_dir().unwrap();
    copy.close();
    assert!(!dir.exists());
    assert!(!session.is_connected());
    assert!(matches!(
        session.exec_on(&resources!["A"]).insert("k", "v"),
        Err(DbError::NotConnected)
    ));

    session.close();
    assert_eq!(entries(root.path()), 0);
}

#[test]
fn test_last_dropped_copy_removes_directory() {
    let root = TempDir::new().unwrap();
    let mut session = session_in(root.path());
    session.connect(&resources!["dropped-copies"]).unwrap();
    let copy = session.copy();
    let dir = session.storage_dir().unwrap();

    drop(session);
    assert!(dir.exists());
    assert!(copy.is_connected());
    drop(copy);
    assert!(!dir.exists());
}

#[test]
fn test_durable_config_round_trip() {
    let root = TempDir::new().unwrap();
    let mut session = KvSession::with_config(KvConfig::durable().with_temp_root(root.path()));
    assert!(session.config().sync_writes);
    session.connect(&resources!["durable"]).unwrap();

    session.exec_on(&resources![]).insert(&1u64, &[1, 2, 3]).unwrap();
    let mut dest: Vec<i32> = Vec::new();
    session
        .exec_on(&resources![])
        .find(&1u64)
        .unwrap()
        .one(&mut dest)
        .unwrap();
    assert_eq!(dest, vec![1, 2, 3]);
}

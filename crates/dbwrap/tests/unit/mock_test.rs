//! Unit tests for the mock backend
//!
//! Tests cover:
//! - Handler markers (connect, copy, copy_with_settings, close, exec_on)
//! - Querier markers and fixed counts
//! - Refiner markers and fixed count
//! - Caller code generic over the contract runs against the mock

use dbwrap::{resources, DbError, Handler, MockHandler, Querier, Refiner, Resource};
use serde_json::json;

#[test]
fn test_connect_stores_dsn() {
    let mut handler = MockHandler::new();
    handler.connect(&resources!["test"]).unwrap();
    assert_eq!(handler.msg, "test");
    assert!(!handler.closed);
}

#[test]
fn test_connect_rejects_non_string_dsn() {
    let mut handler = MockHandler::new();
    for args in [resources![].to_vec(), resources![42].to_vec(), resources![()].to_vec()] {
        let err = handler.connect(&args).unwrap_err();
        assert!(matches!(err, DbError::Configuration { .. }), "{args:?} gave {err}");
    }
    assert!(handler.msg.is_empty());
}

#[test]
fn test_copy_markers() {
    let mut handler = MockHandler::new();
    handler.connect(&resources!["test"]).unwrap();

    let copy = handler.copy();
    assert_eq!(copy.msg, "session copied");

    let copy = handler
        .copy_with_settings(&resources!["settings", 1, true])
        .unwrap();
    assert_eq!(copy.msg, "session copied w settings");

    // The original is untouched.
    assert_eq!(handler.msg, "test");
}

#[test]
fn test_close_sets_flag() {
    let mut handler = MockHandler::new();
    handler.close();
    assert!(handler.closed);
    handler.close();
    assert!(handler.closed);
}

#[test]
fn test_exec_on_marks_collection() {
    let mut handler = MockHandler::new();
    let coll = handler.exec_on(&resources!["dbName", "collectionName"]);
    assert_eq!(coll.msg, "ExecOn called");
    assert_eq!(handler.collection.msg, "ExecOn called");
}

#[test]
fn test_exec_on_hands_out_fresh_collection() {
    let mut handler = MockHandler::new();
    handler.exec_on(&resources![]).remove(&1).unwrap();
    assert_eq!(handler.collection.selector, 111);

    let coll = handler.exec_on(&resources![]);
    assert_eq!(coll.selector, 0);
}

#[test]
fn test_insert_records_document_count() {
    let mut handler = MockHandler::new();
    let coll = handler.exec_on(&resources![]);

    coll.insert("k", "v").unwrap();
    assert_eq!(coll.docs_num, 1);

    coll.insert_many(&[(1, "a"), (2, "b")]).unwrap();
    assert_eq!(coll.docs_num, 2);

    let none: [(i32, i32); 0] = [];
    coll.insert_many(&none).unwrap();
    assert_eq!(coll.docs_num, 0);
}

#[test]
fn test_remove_and_update_markers() {
    let mut handler = MockHandler::new();
    let coll = handler.exec_on(&resources![]);

    coll.remove(&json!({"msg": 1})).unwrap();
    assert_eq!(coll.selector, 111);

    coll.update(&json!({"msg": 1}), &json!({"msg": 2})).unwrap();
    assert_eq!(coll.selector, 555);
    assert_eq!(coll.upd, 777);
}

#[test]
fn test_bulk_counts() {
    let mut handler = MockHandler::new();
    let coll = handler.exec_on(&resources![]);

    assert_eq!(coll.remove_all(&()).unwrap(), 333);
    assert_eq!(coll.update_all(&(), "v").unwrap(), 888);
    assert_eq!(coll.upsert("k", "v").unwrap(), 999);
}

#[test]
fn test_refiner_markers() {
    let mut handler = MockHandler::new();
    let coll = handler.exec_on(&resources![]);

    let mut one = String::from("untouched");
    coll.find("k").unwrap().one(&mut one).unwrap();
    assert_eq!(coll.query.res, "result");
    assert_eq!(one, "untouched");

    let mut all: Vec<String> = Vec::new();
    coll.find(&()).unwrap().all(&mut all).unwrap();
    assert_eq!(coll.query.res, "results");
    assert!(all.is_empty());

    let mut values: Vec<i32> = Vec::new();
    coll.scan().distinct("key", &mut values).unwrap();
    assert_eq!(coll.query.dist_key, "key");
    assert!(values.is_empty());

    assert_eq!(coll.scan().count().unwrap(), 999);
}

#[test]
fn test_find_resets_query_markers() {
    let mut handler = MockHandler::new();
    let coll = handler.exec_on(&resources![]);

    let mut one = 0;
    coll.find("k").unwrap().one(&mut one).unwrap();
    assert_eq!(coll.query.res, "result");

    coll.find("k").unwrap();
    assert!(coll.query.res.is_empty());
}

// Caller code written against the traits alone.
fn store_and_count<H: Handler>(handler: &mut H, dsn: &str) -> dbwrap::Result<usize> {
    handler.connect(&[Resource::from(dsn)])?;
    let coll = handler.exec_on(&resources!["items"]);
    coll.insert_many(&[("a", 1), ("b", 2)])?;
    let count = coll.scan().count()?;
    handler.close();
    Ok(count)
}

#[test]
fn test_generic_caller_runs_against_mock() {
    let mut handler = MockHandler::new();
    assert_eq!(store_and_count(&mut handler, "mock://").unwrap(), 999);
    assert_eq!(handler.msg, "mock://");
    assert_eq!(handler.collection.docs_num, 2);
    assert!(handler.closed);
}

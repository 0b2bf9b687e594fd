//! Deterministic test double for the storage contract.
//!
//! **Note**: This backend stores nothing. Every call returns a fixed result
//! and records a marker in a public field, so tests can check that caller
//! code drives the full [`Handler`]/[`Querier`]/[`Refiner`] surface without
//! a live backend.
//!
//! | Call | Recorded / returned |
//! |------|---------------------|
//! | `connect(dsn)` | `msg = dsn` |
//! | `copy()` | new mock, `msg = "session copied"` |
//! | `copy_with_settings(..)` | new mock, `msg = "session copied w settings"` |
//! | `close()` | `closed = true` |
//! | `exec_on(..)` | fresh collection, `msg = "ExecOn called"` |
//! | `insert` / `insert_many` | `docs_num` = number of records |
//! | `remove` | `selector = 111` |
//! | `remove_all` | returns 333 |
//! | `update` | `selector = 555`, `upd = 777` |
//! | `update_all` | returns 888 |
//! | `upsert` | returns 999 |
//! | `find` / `scan` | fresh query |
//! | `one` / `all` | `res = "result"` / `"results"` |
//! | `distinct(field, ..)` | `dist_key = field` |
//! | `count` | returns 999 |

use crate::error::{DbError, Result};
use crate::handler::{Handler, Querier, Refiner, Resource};
use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Handler double.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockHandler {
    /// Connection string, or the marker of how this mock was made
    pub msg: String,
    /// Read mode, unused by the mock itself
    pub mode: i32,
    /// Refresh flag, unused by the mock itself
    pub refresh: bool,
    /// Set by `close`
    pub closed: bool,
    /// Collection handed out by the last `exec_on`
    pub collection: MockCollection,
}

impl MockHandler {
    /// Create an unconnected mock.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_msg(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            ..Default::default()
        }
    }
}

impl Handler for MockHandler {
    type Querier = MockCollection;

    /// Stores the first resource, which must be a string.
    fn connect(&mut self, resources: &[Resource]) -> Result<()> {
        match resources.first() {
            Some(Resource::String(dsn)) => {
                self.msg = dsn.clone();
                Ok(())
            }
            _ => Err(DbError::configuration(
                "Unexpected resources set, want `dsn: string`",
            )),
        }
    }

    fn copy(&self) -> Self {
        Self::with_msg("session copied")
    }

    fn copy_with_settings(&self, _settings: &[Resource]) -> Result<Self> {
        Ok(Self::with_msg("session copied w settings"))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn exec_on(&mut self, resources: &[Resource]) -> &mut MockCollection {
        trace!("Mock exec_on with {} resources", resources.len());
        self.collection = MockCollection {
            msg: "ExecOn called".to_string(),
            ..Default::default()
        };
        &mut self.collection
    }
}

/// Querier double.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockCollection {
    /// Marker set by `exec_on`
    pub msg: String,
    /// Number of records passed to the last insert
    pub docs_num: usize,
    /// Marker set by `remove` and `update`
    pub selector: i32,
    /// Marker set by `update`
    pub upd: i32,
    /// Query handed out by the last `find`/`scan`
    pub query: MockQuery,
}

impl Querier for MockCollection {
    type Refiner = MockQuery;

    fn insert<K, V>(&mut self, _key: &K, _doc: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        self.docs_num = 1;
        Ok(())
    }

    fn insert_many<K, V>(&mut self, records: &[(K, V)]) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        self.docs_num = records.len();
        Ok(())
    }

    fn remove<S>(&mut self, _selector: &S) -> Result<()>
    where
        S: Serialize + ?Sized,
    {
        self.selector = 111;
        Ok(())
    }

    fn remove_all<S>(&mut self, _selector: &S) -> Result<usize>
    where
        S: Serialize + ?Sized,
    {
        Ok(333)
    }

    fn update<S, U>(&mut self, _selector: &S, _update: &U) -> Result<()>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        self.selector = 555;
        self.upd = 777;
        Ok(())
    }

    fn update_all<S, U>(&mut self, _selector: &S, _update: &U) -> Result<usize>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        Ok(888)
    }

    fn upsert<S, U>(&mut self, _selector: &S, _update: &U) -> Result<usize>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        Ok(999)
    }

    fn find<Q>(&mut self, _query: &Q) -> Result<&mut MockQuery>
    where
        Q: Serialize + ?Sized,
    {
        Ok(self.scan())
    }

    fn scan(&mut self) -> &mut MockQuery {
        self.query = MockQuery::default();
        &mut self.query
    }
}

/// Refiner double. Destinations are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockQuery {
    /// Marker set by `one` and `all`
    pub res: String,
    /// Field passed to the last `distinct`
    pub dist_key: String,
}

impl Refiner for MockQuery {
    fn one<T: DeserializeOwned>(&mut self, _dest: &mut T) -> Result<()> {
        self.res = "result".to_string();
        Ok(())
    }

    fn all<T: DeserializeOwned>(&mut self, _dest: &mut Vec<T>) -> Result<()> {
        self.res = "results".to_string();
        Ok(())
    }

    fn distinct<T: DeserializeOwned>(&mut self, field: &str, _dest: &mut Vec<T>) -> Result<()> {
        self.dist_key = field.to_string();
        Ok(())
    }

    fn count(&mut self) -> Result<usize> {
        Ok(999)
    }
}

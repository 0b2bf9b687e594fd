//! Embedded key-value backend.
//!
//! [`KvSession`] maps the document-style contract onto RocksDB: buckets are
//! column families, keys and values are [codec](crate::codec) output, and
//! every call runs in its own transaction or snapshot.
//!
//! The session is all three capability views at once: `exec_on` and `find`
//! mutate the session (selected bucket, staged key) and hand back the same
//! object. Those two fields are per-handle state, so concurrent use needs
//! separate handles (see [`Handler::copy`]); `&mut self` enforces this.
//! The store itself is shared by every copy, and closing any of them closes
//! it for all.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbwrap::{resources, Handler, KvSession, Querier, Refiner};
//!
//! let mut session = KvSession::new();
//! session.connect(&resources!["app", "users"]).unwrap();
//!
//! session.exec_on(&resources!["users"]).insert("alice", "admin").unwrap();
//!
//! let mut role = String::new();
//! session
//!     .exec_on(&resources!["users"])
//!     .find("alice")
//!     .unwrap()
//!     .one(&mut role)
//!     .unwrap();
//! assert_eq!(role, "admin");
//!
//! session.close();
//! ```

mod buckets;
mod cursor;
mod lifecycle;
mod store;

pub use buckets::DEFAULT_BUCKET;

use crate::codec;
use crate::config::KvConfig;
use crate::error::{DbError, Result};
use crate::handler::{Handler, Querier, Refiner, Resource};
use cursor::Cursor;
use lifecycle::Storage;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Store slot shared by a session and its copies. `None` once closed.
type SharedStorage = Arc<RwLock<Option<Storage>>>;

/// Session over one embedded store.
///
/// Copies made with [`Handler::copy`] are aliases of the same session: a
/// `close` on any of them closes the store and removes its directory, and
/// the others fail with [`DbError::NotConnected`] from then on. A store whose
/// handles are all dropped without `close` is torn down with the last one.
pub struct KvSession {
    config: KvConfig,
    storage: SharedStorage,
    bucket: String,
    cursor: Cursor,
}

impl KvSession {
    /// Create an unconnected session with the default configuration.
    pub fn new() -> Self {
        Self::with_config(KvConfig::default())
    }

    /// Create an unconnected session that will connect with `config`.
    pub fn with_config(config: KvConfig) -> Self {
        Self {
            config,
            storage: Arc::new(RwLock::new(None)),
            bucket: DEFAULT_BUCKET.to_string(),
            cursor: Cursor::default(),
        }
    }

    /// Configuration used when connecting.
    pub fn config(&self) -> &KvConfig {
        &self.config
    }

    /// Whether the session has an open store.
    pub fn is_connected(&self) -> bool {
        self.slot().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Scratch directory holding the store, while connected.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.with_storage(|storage| Ok(storage.dir_path().map(|p| p.to_path_buf())))
            .ok()
            .flatten()
    }

    /// Bucket names created at connect time, sorted. Empty when not connected.
    pub fn bucket_names(&self) -> Vec<String> {
        self.with_storage(|storage| Ok(storage.bucket_names().to_vec()))
            .unwrap_or_default()
    }

    /// Bucket the next operation will run against.
    pub fn selected_bucket(&self) -> &str {
        &self.bucket
    }

    fn slot(&self) -> Result<RwLockReadGuard<'_, Option<Storage>>> {
        self.storage
            .read()
            .map_err(|_| DbError::storage("Session lock poisoned", None::<std::io::Error>))
    }

    /// Run `op` against the open store, holding it open for the duration.
    fn with_storage<R>(&self, op: impl FnOnce(&Storage) -> Result<R>) -> Result<R> {
        let slot = self.slot()?;
        let storage = slot.as_ref().ok_or(DbError::NotConnected)?;
        op(storage)
    }
}

impl Default for KvSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KvSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvSession")
            .field("connected", &self.is_connected())
            .field("dir", &self.storage_dir())
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl Handler for KvSession {
    type Querier = Self;

    /// Resources: `storage_name, bucket_name...`.
    ///
    /// A connect that fails leaves the session unconnected and releases
    /// anything it had created.
    fn connect(&mut self, resources: &[Resource]) -> Result<()> {
        if self.is_connected() {
            return Err(DbError::configuration("Session is already connected"));
        }
        let (name, bucket_names) = buckets::parse_connect(resources)?;
        let storage = Storage::open(&name, &bucket_names, &self.config)?;

        // A fresh slot: copies of an earlier, closed connection stay closed.
        self.storage = Arc::new(RwLock::new(Some(storage)));
        self.bucket = DEFAULT_BUCKET.to_string();
        self.cursor.clear();
        Ok(())
    }

    /// An alias of this session: same store, starting from the same bucket
    /// and staged key.
    fn copy(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            bucket: self.bucket.clone(),
            cursor: self.cursor.clone(),
        }
    }

    /// There is no secondary connection mode, so settings are ignored and
    /// this never fails.
    fn copy_with_settings(&self, settings: &[Resource]) -> Result<Self> {
        if !settings.is_empty() {
            debug!("Ignoring {} copy settings", settings.len());
        }
        Ok(self.copy())
    }

    /// Closes the store for this session and every copy of it.
    fn close(&mut self) {
        let taken = match self.storage.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(storage) = taken {
            let others = Arc::strong_count(&self.storage) - 1;
            if others > 0 {
                info!("Closing store shared with {others} other handle(s)");
            }
            // Engine first, then the scratch directory.
            drop(storage);
        }
        self.cursor.clear();
    }

    fn exec_on(&mut self, resources: &[Resource]) -> &mut Self {
        let bucket = buckets::select(resources);
        if bucket != self.bucket {
            debug!("Selecting bucket '{bucket}'");
            self.bucket = bucket.to_string();
        }
        self
    }
}

impl Querier for KvSession {
    type Refiner = Self;

    fn insert<K, V>(&mut self, key: &K, doc: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = codec::encode_key(key)?;
        let value = codec::encode(doc)?;
        debug!("Inserting into bucket '{}'", self.bucket);
        self.with_storage(|storage| storage.put(&self.bucket, &key, &value))
    }

    /// All records are written in one transaction.
    fn insert_many<K, V>(&mut self, records: &[(K, V)]) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        let encoded = records
            .iter()
            .map(|(key, doc)| Ok((codec::encode_key(key)?, codec::encode(doc)?)))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Inserting {} records into bucket '{}'",
            encoded.len(),
            self.bucket
        );
        self.with_storage(|storage| storage.put_many(&self.bucket, &encoded))
    }

    fn remove<S>(&mut self, selector: &S) -> Result<()>
    where
        S: Serialize + ?Sized,
    {
        let key = codec::encode_key(selector)?;
        debug!("Removing from bucket '{}'", self.bucket);
        self.with_storage(|storage| storage.delete(&self.bucket, &key))
    }

    /// `selector` is an equality filter over stored values.
    fn remove_all<S>(&mut self, selector: &S) -> Result<usize>
    where
        S: Serialize + ?Sized,
    {
        let filter = codec::to_value(selector)?;
        let removed = self.with_storage(|storage| {
            storage.delete_matching(&self.bucket, |value| {
                Ok(codec::matches(&filter, &codec::decode_value(value)?))
            })
        })?;
        debug!("Removed {removed} records from bucket '{}'", self.bucket);
        Ok(removed)
    }

    /// Replaces the value stored under the exact key `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if there is nothing to update.
    fn update<S, U>(&mut self, selector: &S, update: &U) -> Result<()>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        let key = codec::encode_key(selector)?;
        let value = codec::encode(update)?;
        debug!("Updating record in bucket '{}'", self.bucket);
        self.with_storage(|storage| storage.replace(&self.bucket, &key, &value))
    }

    /// Replaces the value of every record matching the filter `selector`.
    fn update_all<S, U>(&mut self, selector: &S, update: &U) -> Result<usize>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        let filter = codec::to_value(selector)?;
        let value = codec::encode(update)?;
        let updated = self.with_storage(|storage| {
            storage.replace_matching(&self.bucket, &value, |stored| {
                Ok(codec::matches(&filter, &codec::decode_value(stored)?))
            })
        })?;
        debug!("Updated {updated} records in bucket '{}'", self.bucket);
        Ok(updated)
    }

    /// Returns 1 when an existing record was replaced, 0 when inserted.
    fn upsert<S, U>(&mut self, selector: &S, update: &U) -> Result<usize>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        let key = codec::encode_key(selector)?;
        let value = codec::encode(update)?;
        let existed =
            self.with_storage(|storage| storage.upsert(&self.bucket, &key, &value))?;
        debug!(
            "Upserted record in bucket '{}' (existed: {existed})",
            self.bucket
        );
        Ok(usize::from(existed))
    }

    /// An empty query (`null` or `{}`) keeps the previously staged key.
    fn find<Q>(&mut self, query: &Q) -> Result<&mut Self>
    where
        Q: Serialize + ?Sized,
    {
        self.cursor.stage(&codec::to_value(query)?)?;
        Ok(self)
    }

    fn scan(&mut self) -> &mut Self {
        self.cursor.clear();
        self
    }
}

impl Refiner for KvSession {
    fn one<T: DeserializeOwned>(&mut self, dest: &mut T) -> Result<()> {
        self.with_storage(|storage| self.cursor.one(storage, &self.bucket, dest))
    }

    fn all<T: DeserializeOwned>(&mut self, dest: &mut Vec<T>) -> Result<()> {
        self.with_storage(|storage| self.cursor.all(storage, &self.bucket, dest))
    }

    fn distinct<T: DeserializeOwned>(&mut self, field: &str, dest: &mut Vec<T>) -> Result<()> {
        self.with_storage(|storage| self.cursor.distinct(storage, &self.bucket, field, dest))
    }

    fn count(&mut self) -> Result<usize> {
        self.with_storage(|storage| self.cursor.count(storage, &self.bucket))
    }
}

//! Session storage lifecycle.
//!
//! A [`Storage`] owns one RocksDB store and the scratch directory it lives
//! in. Dropping it closes the engine first and then removes the directory,
//! so every exit path (explicit close, drop, or a connect that failed
//! half-way) releases both.

use super::buckets;
use crate::config::KvConfig;
use crate::error::{DbError, Result};
use log::{debug, info, warn};
use rocksdb::{Options, TransactionDB, TransactionDBOptions};
use std::path::Path;
use tempfile::TempDir;

/// Temporary directory removed on drop, with failures logged.
pub(crate) struct ScratchDir {
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create a fresh directory whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::StorageOpen`] if the directory cannot be created.
    pub(crate) fn create(prefix: &str, root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            DbError::storage_open(
                format!("Failed to create scratch directory for '{prefix}'"),
                Some(e),
            )
        })?;
        debug!("Created scratch directory {:?}", dir.path());
        Ok(Self { dir: Some(dir) })
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Remove the directory tree. Failures leak disk space, so they are
    /// logged, but there is nobody to return them to.
    pub(crate) fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed scratch directory {path:?}"),
                Err(e) => warn!("Failed to remove scratch directory {path:?}: {e}"),
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove();
    }
}

/// One connected RocksDB store plus its scratch directory.
///
/// Field order matters: fields drop in declaration order, and the engine
/// must release its files before the directory is deleted.
pub(crate) struct Storage {
    pub(super) db: TransactionDB,
    dir: ScratchDir,
    pub(super) sync_writes: bool,
    name: String,
    buckets: Vec<String>,
}

impl Storage {
    /// Create the scratch directory, open the store inside it and set up
    /// the requested buckets plus the default one.
    ///
    /// # Errors
    ///
    /// - [`DbError::StorageOpen`] if the directory or store cannot be created
    /// - [`DbError::BucketSetup`] if a bucket cannot be created
    pub(crate) fn open(name: &str, bucket_names: &[String], config: &KvConfig) -> Result<Self> {
        let dir = ScratchDir::create(name, config.temp_root.as_deref())?;
        let path = dir
            .path()
            .map(|root| root.join(name))
            .ok_or_else(|| DbError::storage_open("Scratch directory vanished", None::<std::io::Error>))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);

        let mut txn_opts = TransactionDBOptions::default();
        if let Some(timeout) = config.lock_timeout {
            txn_opts.set_txn_lock_timeout(i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX));
        }

        let mut db: TransactionDB = TransactionDB::open(&opts, &txn_opts, &path).map_err(|e| {
            DbError::storage_open(format!("Failed to open storage at {path:?}"), Some(e))
        })?;

        // On failure `db` drops before `dir`, so the files are closed first.
        let buckets = buckets::create_buckets(&mut db, bucket_names, &opts)?;

        info!("Opened storage '{name}' at {path:?} with buckets {buckets:?}");
        Ok(Self {
            db,
            dir,
            sync_writes: config.sync_writes,
            name: name.to_string(),
            buckets,
        })
    }

    /// Scratch directory holding the store.
    pub(crate) fn dir_path(&self) -> Option<&Path> {
        self.dir.path()
    }

    /// Buckets created at connect time, sorted.
    pub(crate) fn bucket_names(&self) -> &[String] {
        &self.buckets
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        info!("Closing storage '{}'", self.name);
    }
}

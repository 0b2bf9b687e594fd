//! Transactional record operations on one bucket.
//!
//! Writes run inside a pessimistic RocksDB transaction and are committed
//! before returning, so a returned `Ok` is visible to every later read.
//! Reads run against a snapshot taken at the start of the call and never
//! observe a partial write.

use super::lifecycle::Storage;
use crate::error::{DbError, Result};
use log::trace;
use rocksdb::{
    ColumnFamily, IteratorMode, Transaction, TransactionDB, TransactionOptions, WriteOptions,
};

/// Raw key-value pair as stored.
pub(crate) type KeyValue = (Vec<u8>, Vec<u8>);

type Txn<'db> = Transaction<'db, TransactionDB>;

impl Storage {
    fn bucket(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| DbError::NoSuchBucket {
            bucket: name.to_string(),
        })
    }

    /// Run `op` inside one write transaction on `bucket` and commit it.
    /// An error from `op` drops the transaction, rolling it back.
    fn write<R>(
        &self,
        bucket: &str,
        op: impl FnOnce(&Txn<'_>, &ColumnFamily) -> Result<R>,
    ) -> Result<R> {
        let cf = self.bucket(bucket)?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        let txn = self
            .db
            .transaction_opt(&write_opts, &TransactionOptions::default());

        let out = op(&txn, cf)?;

        txn.commit().map_err(|e| {
            DbError::storage(format!("Failed to commit write to bucket '{bucket}'"), Some(e))
        })?;
        Ok(out)
    }

    /// Upsert one pair.
    pub(crate) fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_many(bucket, &[(key.to_vec(), value.to_vec())])
    }

    /// Upsert several pairs atomically.
    pub(crate) fn put_many(&self, bucket: &str, records: &[KeyValue]) -> Result<()> {
        self.write(bucket, |txn, cf| {
            for (key, value) in records {
                txn.put_cf(cf, key, value)
                    .map_err(|e| DbError::storage("Failed to put key-value pair", Some(e)))?;
            }
            Ok(())
        })
    }

    /// Delete one key. Absent keys are not an error.
    pub(crate) fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        self.write(bucket, |txn, cf| {
            txn.delete_cf(cf, key)
                .map_err(|e| DbError::storage("Failed to delete key", Some(e)))
        })
    }

    /// Replace the value of an existing key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the key is absent.
    pub(crate) fn replace(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(bucket, |txn, cf| {
            if lock(txn, cf, key)?.is_none() {
                return Err(DbError::not_found(key));
            }
            txn.put_cf(cf, key, value)
                .map_err(|e| DbError::storage("Failed to replace value", Some(e)))
        })
    }

    /// Replace or insert. Returns whether the key existed before.
    pub(crate) fn upsert(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<bool> {
        self.write(bucket, |txn, cf| {
            let existed = lock(txn, cf, key)?.is_some();
            txn.put_cf(cf, key, value)
                .map_err(|e| DbError::storage("Failed to upsert value", Some(e)))?;
            Ok(existed)
        })
    }

    /// Delete every record whose value satisfies `predicate`.
    pub(crate) fn delete_matching(
        &self,
        bucket: &str,
        mut predicate: impl FnMut(&[u8]) -> Result<bool>,
    ) -> Result<usize> {
        self.write(bucket, |txn, cf| {
            let keys = locked_matches(txn, cf, &mut predicate)?;
            for key in &keys {
                txn.delete_cf(cf, key)
                    .map_err(|e| DbError::storage("Failed to delete key", Some(e)))?;
            }
            Ok(keys.len())
        })
    }

    /// Overwrite every record whose value satisfies `predicate` with `value`.
    pub(crate) fn replace_matching(
        &self,
        bucket: &str,
        value: &[u8],
        mut predicate: impl FnMut(&[u8]) -> Result<bool>,
    ) -> Result<usize> {
        self.write(bucket, |txn, cf| {
            let keys = locked_matches(txn, cf, &mut predicate)?;
            for key in &keys {
                txn.put_cf(cf, key, value)
                    .map_err(|e| DbError::storage("Failed to replace value", Some(e)))?;
            }
            Ok(keys.len())
        })
    }

    /// Read one key from a fresh snapshot.
    pub(crate) fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.bucket(bucket)?;
        self.db
            .snapshot()
            .get_cf(cf, key)
            .map_err(|e| DbError::storage("Failed to get value", Some(e)))
    }

    /// First record in key order, if any.
    pub(crate) fn first(&self, bucket: &str) -> Result<Option<KeyValue>> {
        let cf = self.bucket(bucket)?;
        let snapshot = self.db.snapshot();
        let mut iter = snapshot.iterator_cf(cf, IteratorMode::Start);
        iter.next()
            .transpose()
            .map(|item| item.map(|(k, v)| (k.into_vec(), v.into_vec())))
            .map_err(|e| DbError::storage("Failed to read first record", Some(e)))
    }

    /// Visit records in key order under one snapshot.
    ///
    /// With `key` set only that record (if present) is visited; otherwise
    /// the whole bucket is.
    pub(crate) fn visit(
        &self,
        bucket: &str,
        key: Option<&[u8]>,
        mut visitor: impl FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        let cf = self.bucket(bucket)?;
        let snapshot = self.db.snapshot();

        if let Some(key) = key {
            let value = snapshot
                .get_cf(cf, key)
                .map_err(|e| DbError::storage("Failed to get value", Some(e)))?;
            if let Some(value) = value {
                visitor(key, &value)?;
            }
            return Ok(());
        }

        let mut visited = 0usize;
        for item in snapshot.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item
                .map_err(|e| DbError::storage("Failed to iterate over bucket", Some(e)))?;
            visitor(&key, &value)?;
            visited += 1;
        }
        trace!("Visited {visited} records in bucket '{bucket}'");
        Ok(())
    }
}

/// Read a key for update, taking its write lock.
fn lock(txn: &Txn<'_>, cf: &ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>> {
    txn.get_for_update_cf(cf, key, true)
        .map_err(|e| DbError::storage("Failed to lock key", Some(e)))
}

/// Keys whose values satisfy `predicate`, each locked and re-checked so a
/// concurrent writer cannot change it between the scan and the write.
fn locked_matches(
    txn: &Txn<'_>,
    cf: &ColumnFamily,
    predicate: &mut impl FnMut(&[u8]) -> Result<bool>,
) -> Result<Vec<Vec<u8>>> {
    let mut candidates = Vec::new();
    for item in txn.iterator_cf(cf, IteratorMode::Start) {
        let (key, value) =
            item.map_err(|e| DbError::storage("Failed to iterate over bucket", Some(e)))?;
        if predicate(&value)? {
            candidates.push(key.into_vec());
        }
    }

    let mut keys = Vec::with_capacity(candidates.len());
    for key in candidates {
        if let Some(current) = lock(txn, cf, &key)? {
            if predicate(&current)? {
                keys.push(key);
            }
        }
    }
    trace!("{} records matched", keys.len());
    Ok(keys)
}

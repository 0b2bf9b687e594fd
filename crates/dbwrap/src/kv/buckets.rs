//! Bucket namespace management.
//!
//! Buckets are RocksDB column families. The engine's built-in column family
//! is named `"default"`, which is also the adapter's default bucket, so it
//! exists in every store from the moment it is opened.

use crate::error::{DbError, Result};
use crate::handler::Resource;
use log::{debug, warn};
use rocksdb::{Options, TransactionDB};
use std::collections::BTreeSet;

/// Bucket used when `exec_on` gets no usable bucket name.
pub const DEFAULT_BUCKET: &str = "default";

/// Split connect resources into the storage name and requested buckets.
///
/// Non-string bucket names are skipped with a warning.
///
/// # Errors
///
/// Returns [`DbError::Configuration`] if the storage name is missing or
/// unusable, or a bucket name is empty.
pub(crate) fn parse_connect(resources: &[Resource]) -> Result<(String, Vec<String>)> {
    let name = match resources.first() {
        Some(Resource::String(name)) => name,
        _ => {
            return Err(DbError::configuration(
                "Unexpected resources set, want `storage_name: string` first",
            ))
        }
    };
    validate_storage_name(name)?;

    let mut buckets = Vec::new();
    for (position, resource) in resources.iter().enumerate().skip(1) {
        match resource {
            Resource::String(bucket) if bucket.is_empty() => {
                return Err(DbError::configuration(format!(
                    "Bucket name at position {position} is empty"
                )))
            }
            Resource::String(bucket) => buckets.push(bucket.clone()),
            other => warn!("Skipping non-string bucket name at position {position}: {other}"),
        }
    }

    Ok((name.clone(), buckets))
}

/// The storage name becomes a directory prefix and a file name.
fn validate_storage_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::configuration("Storage name is empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(DbError::configuration(format!(
            "Storage name '{name}' is not usable as a file name"
        )));
    }
    Ok(())
}

/// Create every requested bucket plus the default one, skipping any that
/// already exist. Returns the full sorted set of bucket names.
///
/// # Errors
///
/// Returns [`DbError::BucketSetup`] naming the first bucket that failed.
pub(crate) fn create_buckets(
    db: &mut TransactionDB,
    requested: &[String],
    opts: &Options,
) -> Result<Vec<String>> {
    ensure_buckets(requested, |name| {
        if db.cf_handle(name).is_some() {
            return Ok(false);
        }
        db.create_cf(name, opts).map(|()| true)
    })
}

// `create` returns whether the bucket was missing and has been created.
fn ensure_buckets<E>(
    requested: &[String],
    mut create: impl FnMut(&str) -> std::result::Result<bool, E>,
) -> Result<Vec<String>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut names: BTreeSet<String> = requested.iter().cloned().collect();
    names.insert(DEFAULT_BUCKET.to_string());

    for name in &names {
        let created = create(name).map_err(|e| DbError::BucketSetup {
            bucket: name.clone(),
            source: Box::new(e),
        })?;
        if created {
            debug!("Created bucket '{name}'");
        }
    }

    Ok(names.into_iter().collect())
}

/// Resolve `exec_on` arguments to a bucket name.
///
/// No argument, `null`, or a non-string argument all fall back to
/// [`DEFAULT_BUCKET`]. Bucket selection is addressing, not acquisition, so
/// a bad argument is not an error.
pub(crate) fn select(resources: &[Resource]) -> &str {
    match resources.first() {
        Some(Resource::String(name)) => name,
        _ => DEFAULT_BUCKET,
    }
}

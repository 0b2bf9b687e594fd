//! Staged lookups and their terminal reads.

use super::lifecycle::Storage;
use crate::codec;
use crate::error::{DbError, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;

/// Lookup key staged by `find`, resolved against whichever bucket is
/// selected when a terminal call runs.
///
/// With no key staged, terminal calls range over the whole bucket.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cursor {
    key: Option<Vec<u8>>,
}

impl Cursor {
    /// Stage `selector` as the lookup key. An empty selector keeps the
    /// previously staged key.
    pub(crate) fn stage(&mut self, selector: &Value) -> Result<()> {
        if codec::is_empty_selector(selector) {
            debug!("Empty selector, keeping staged key");
            return Ok(());
        }
        self.key = Some(codec::encode_value(selector)?);
        Ok(())
    }

    /// Drop the staged key.
    pub(crate) fn clear(&mut self) {
        self.key = None;
    }

    pub(crate) fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub(crate) fn one<T: DeserializeOwned>(
        &self,
        storage: &Storage,
        bucket: &str,
        dest: &mut T,
    ) -> Result<()> {
        let bytes = match self.key() {
            Some(key) => storage
                .get(bucket, key)?
                .ok_or_else(|| DbError::not_found(key))?,
            None => storage
                .first(bucket)?
                .map(|(_, value)| value)
                .ok_or_else(|| DbError::NotFound {
                    key: format!("<any record in bucket '{bucket}'>"),
                })?,
        };
        *dest = codec::decode(&bytes)?;
        Ok(())
    }

    pub(crate) fn all<T: DeserializeOwned>(
        &self,
        storage: &Storage,
        bucket: &str,
        dest: &mut Vec<T>,
    ) -> Result<()> {
        // Decode into a scratch buffer so a bad record leaves `dest` untouched.
        let mut decoded = Vec::new();
        storage.visit(bucket, self.key(), |_, value| {
            decoded.push(codec::decode(value)?);
            Ok(())
        })?;
        dest.append(&mut decoded);
        Ok(())
    }

    pub(crate) fn distinct<T: DeserializeOwned>(
        &self,
        storage: &Storage,
        bucket: &str,
        field: &str,
        dest: &mut Vec<T>,
    ) -> Result<()> {
        if field.is_empty() {
            return Err(DbError::configuration("Distinct needs a field name"));
        }

        let mut seen = BTreeSet::new();
        let mut unique = Vec::new();
        storage.visit(bucket, self.key(), |_, value| {
            let doc = codec::decode_value(value)?;
            if let Some(found) = codec::field(&doc, field) {
                if seen.insert(codec::encode_value(found)?) {
                    unique.push(found.clone());
                }
            }
            Ok(())
        })?;

        let mut decoded = unique
            .into_iter()
            .map(codec::from_value)
            .collect::<Result<Vec<T>>>()?;
        dest.append(&mut decoded);
        Ok(())
    }

    pub(crate) fn count(&self, storage: &Storage, bucket: &str) -> Result<usize> {
        let mut count = 0;
        storage.visit(bucket, self.key(), |_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }
}

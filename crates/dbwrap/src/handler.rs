//! The storage-access contract shared by every backend.
//!
//! Three capability traits, each a narrower view of a session:
//! - [`Handler`]: connect, copy, close, select a partition
//! - [`Querier`]: mutations and query entry on the selected partition
//! - [`Refiner`]: terminal reads for a staged query
//!
//! Backends are independent implementations of all three. Positional
//! connect/settings/partition arguments are [`Resource`] values so each
//! backend can interpret its own list (a storage name plus bucket names, a
//! connection string, ...). The [`resources!`](crate::resources) macro
//! builds such lists.
//!
//! ## Selectors
//!
//! What a selector means is a per-backend decision, fixed here:
//!
//! - The embedded key-value backend treats selectors of single-record
//!   operations (`insert`, `remove`, `update`, `upsert`, `find`) as an
//!   **exact key**: the canonical encoding of the selector is the record key.
//!   Its bulk operations (`remove_all`, `update_all`) treat the selector as an
//!   **equality filter** over stored values (see [`codec::matches`]).
//! - A document-store backend treats every selector as a **predicate**
//!   evaluated by the server.
//!
//! [`codec::matches`]: crate::codec::matches

use crate::error::{DbError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A positional argument to `connect`, `copy_with_settings` or `exec_on`.
pub type Resource = serde_json::Value;

/// Top-level session: connection lifecycle and partition selection.
pub trait Handler {
    /// Per-partition view returned by [`Handler::exec_on`].
    type Querier: Querier;

    /// Connect the session using backend-specific resources.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] for malformed resources, or a
    /// backend-specific open/setup error.
    fn connect(&mut self, resources: &[Resource]) -> Result<()>;

    /// Handle onto a copy of this session.
    ///
    /// Whether the copy is an independent connection is a per-backend
    /// property: the embedded backend shares one storage, a network backend
    /// would dial its own socket.
    fn copy(&self) -> Self
    where
        Self: Sized;

    /// Like [`Handler::copy`], applying backend-specific settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] if the backend rejects the settings.
    fn copy_with_settings(&self, settings: &[Resource]) -> Result<Self>
    where
        Self: Sized;

    /// Release the session. Never fails; teardown problems are logged.
    fn close(&mut self);

    /// Select the partition subsequent operations run against.
    fn exec_on(&mut self, resources: &[Resource]) -> &mut Self::Querier;
}

/// Mutations and query entry on one partition.
///
/// The bulk operations have default implementations returning
/// [`DbError::NotImplemented`], for backends that cannot support them.
pub trait Querier {
    /// Staged query returned by [`Querier::find`].
    type Refiner: Refiner;

    /// Store `doc` under `key`. Last write wins.
    ///
    /// # Errors
    ///
    /// - [`DbError::Encode`] if either side cannot be serialized, or the key
    ///   is empty (`null` / `{}`) or holds a non-finite float
    /// - [`DbError::NoSuchBucket`] if the selected partition does not exist
    /// - [`DbError::NotConnected`] if the session is not connected
    /// - [`DbError::Storage`] if the backend fails to write
    fn insert<K, V>(&mut self, key: &K, doc: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized;

    /// Store several records. The default inserts them one at a time.
    ///
    /// # Errors
    ///
    /// Stops at the first record that fails to insert.
    fn insert_many<K, V>(&mut self, records: &[(K, V)]) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        for (key, doc) in records {
            self.insert(key, doc)?;
        }
        Ok(())
    }

    /// Remove the record identified by `selector`. Removing an absent
    /// record is not an error on the embedded backend.
    ///
    /// # Errors
    ///
    /// - [`DbError::Encode`] if the selector cannot be serialized or is empty
    /// - [`DbError::NoSuchBucket`] if the selected partition does not exist
    /// - [`DbError::NotConnected`] if the session is not connected
    /// - [`DbError::Storage`] if the backend fails to write
    fn remove<S>(&mut self, selector: &S) -> Result<()>
    where
        S: Serialize + ?Sized;

    /// Remove every matching record, returning how many were removed.
    ///
    /// # Errors
    ///
    /// [`DbError::NotImplemented`] unless the backend overrides it.
    fn remove_all<S>(&mut self, _selector: &S) -> Result<usize>
    where
        S: Serialize + ?Sized,
    {
        Err(DbError::NotImplemented {
            operation: "remove_all".to_string(),
        })
    }

    /// Replace the record identified by `selector`.
    ///
    /// # Errors
    ///
    /// [`DbError::NotImplemented`] unless the backend overrides it.
    fn update<S, U>(&mut self, _selector: &S, _update: &U) -> Result<()>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        Err(DbError::NotImplemented {
            operation: "update".to_string(),
        })
    }

    /// Replace every matching record, returning how many were updated.
    ///
    /// # Errors
    ///
    /// [`DbError::NotImplemented`] unless the backend overrides it.
    fn update_all<S, U>(&mut self, _selector: &S, _update: &U) -> Result<usize>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        Err(DbError::NotImplemented {
            operation: "update_all".to_string(),
        })
    }

    /// Replace the record identified by `selector`, inserting it if absent.
    /// Returns how many existing records were updated.
    ///
    /// # Errors
    ///
    /// [`DbError::NotImplemented`] unless the backend overrides it.
    fn upsert<S, U>(&mut self, _selector: &S, _update: &U) -> Result<usize>
    where
        S: Serialize + ?Sized,
        U: Serialize + ?Sized,
    {
        Err(DbError::NotImplemented {
            operation: "upsert".to_string(),
        })
    }

    /// Stage a query and return the refiner that resolves it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encode`] if the query cannot be serialized.
    fn find<Q>(&mut self, query: &Q) -> Result<&mut Self::Refiner>
    where
        Q: Serialize + ?Sized;

    /// Stage a query over the whole partition.
    fn scan(&mut self) -> &mut Self::Refiner;
}

/// Terminal reads of a staged query.
///
/// A staged query is resolved against the partition selected at the time
/// of the terminal call: do not call `exec_on` between `find` and the
/// terminal call unless that is intended.
pub trait Refiner {
    /// Decode the first matching record into `dest`.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] when nothing matches, [`DbError::Decode`] when
    /// the record does not fit `T`.
    fn one<T: DeserializeOwned>(&mut self, dest: &mut T) -> Result<()>;

    /// Append every matching record to `dest`, in key order.
    ///
    /// # Errors
    ///
    /// [`DbError::Decode`] when a record does not fit `T`.
    fn all<T: DeserializeOwned>(&mut self, dest: &mut Vec<T>) -> Result<()>;

    /// Append the unique values found at `field` across matching records.
    ///
    /// # Errors
    ///
    /// [`DbError::Decode`] when a value does not fit `T`.
    fn distinct<T: DeserializeOwned>(&mut self, field: &str, dest: &mut Vec<T>) -> Result<()>;

    /// Number of matching records.
    ///
    /// # Errors
    ///
    /// Backend-specific read failures.
    fn count(&mut self) -> Result<usize>;
}

/// Build a `[Resource; N]` from anything convertible into a JSON value.
///
/// ```
/// use dbwrap::{resources, Resource};
///
/// let args = resources!["storage", "bucket", 42];
/// assert_eq!(args[0], Resource::from("storage"));
/// assert_eq!(args[2], Resource::from(42));
/// ```
#[macro_export]
macro_rules! resources {
    () => {{
        let empty: [$crate::Resource; 0] = [];
        empty
    }};
    ($($resource:expr),+ $(,)?) => {
        [$($crate::Resource::from($resource)),+]
    };
}

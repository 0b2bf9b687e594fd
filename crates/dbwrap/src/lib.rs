//! # dbwrap
//!
//! One storage-access contract, several interchangeable backends.
//!
//! Application code talks to a [`Handler`] (session), asks it for a
//! [`Querier`] bound to a partition, and resolves lookups through a
//! [`Refiner`]. Backends implement all three:
//!
//! - [`KvSession`]: embedded RocksDB store with named buckets, living in a
//!   temporary directory owned by the session
//! - [`MockHandler`]: deterministic test double, no storage at all
//!
//! ## Architecture
//!
//! ```text
//! Handler (connect / copy / close / exec_on)
//!     ↓
//! Querier (insert / remove / update / find)
//!     ↓
//! Refiner (one / all / distinct / count)
//!     ↓
//! Codec (canonical bytes) → Transactional store (RocksDB buckets)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbwrap::{resources, Handler, KvSession, Querier, Refiner};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Default)]
//! struct Note {
//!     text: String,
//! }
//!
//! let mut session = KvSession::new();
//! session.connect(&resources!["notes", "inbox"]).unwrap();
//!
//! let note = Note { text: "hello".into() };
//! session.exec_on(&resources!["inbox"]).insert(&1, &note).unwrap();
//!
//! let mut found = Note::default();
//! session.exec_on(&resources!["inbox"]).find(&1).unwrap().one(&mut found).unwrap();
//! assert_eq!(found.text, "hello");
//!
//! session.close();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
#[cfg(feature = "rocksdb-backend")]
pub mod kv;
pub mod mock;

// Re-export main types
pub use config::KvConfig;
pub use error::{DbError, Result};
pub use handler::{Handler, Querier, Refiner, Resource};
#[cfg(feature = "rocksdb-backend")]
pub use kv::{KvSession, DEFAULT_BUCKET};
pub use mock::{MockCollection, MockHandler, MockQuery};

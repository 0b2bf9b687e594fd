//! Error types for dbwrap operations.
//!
//! Every backend reports failures through [`DbError`]. Engine failures are
//! wrapped with the operation that hit them, never swallowed.

use thiserror::Error;

/// Result type alias for dbwrap operations.
pub type Result<T> = std::result::Result<T, DbError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error taxonomy shared by all backends.
#[derive(Error, Debug)]
pub enum DbError {
    /// Malformed connect or settings arguments
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was wrong with the arguments
        message: String,
    },

    /// The scratch directory or the storage file could not be created/opened
    #[error("Storage open error: {message}")]
    StorageOpen {
        /// Detailed error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// A bucket requested at connect time could not be created
    #[error("Failed to set up bucket '{bucket}'")]
    BucketSetup {
        /// Bucket that failed
        bucket: String,
        /// Underlying engine error
        #[source]
        source: BoxedSource,
    },

    /// The operation targets a bucket that was never created
    #[error("No such bucket: {bucket}")]
    NoSuchBucket {
        /// Name of the missing bucket
        bucket: String,
    },

    /// A value could not be serialized
    #[error("Encode error: {message}")]
    Encode {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Stored bytes could not be decoded into the requested shape
    #[error("Decode error: {message}")]
    Decode {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// The lookup key is absent
    #[error("Not found: {key}")]
    NotFound {
        /// Printable form of the key
        key: String,
    },

    /// The backend does not support this operation
    #[error("Operation not implemented by this backend: {operation}")]
    NotImplemented {
        /// Name of the operation
        operation: String,
    },

    /// The session was never connected, failed to connect, or is closed
    #[error("Session is not connected")]
    NotConnected,

    /// Storage engine failure inside a transaction
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },
}

fn boxed<E>(source: Option<E>) -> Option<BoxedSource>
where
    E: std::error::Error + Send + Sync + 'static,
{
    source.map(|e| Box::new(e) as BoxedSource)
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a storage-open error from a message and optional source.
    pub fn storage_open<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StorageOpen {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Create a storage error from a message and optional source.
    pub fn storage<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Create an encode error from a message and optional source.
    pub fn encode<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Encode {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Create a decode error from a message and optional source.
    pub fn decode<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Decode {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Create a not-found error for a raw key.
    ///
    /// Keys are codec output, so they are shown lossily as UTF-8.
    pub fn not_found(key: &[u8]) -> Self {
        Self::NotFound {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    /// Whether this is a [`DbError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a [`DbError::NoSuchBucket`].
    pub fn is_no_such_bucket(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. })
    }
}

//! Configuration for the embedded key-value backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tuning knobs applied when a [`KvSession`](crate::KvSession) connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Directory under which per-session scratch directories are created
    /// (None = the system temp directory)
    pub temp_root: Option<PathBuf>,

    /// Sync the write-ahead log on every committed write transaction
    pub sync_writes: bool,

    /// How long a write transaction waits for a key lock
    /// (None = engine default)
    #[serde(with = "duration_millis_option")]
    pub lock_timeout: Option<Duration>,

    /// Maximum number of files the engine keeps open (-1 = unlimited)
    pub max_open_files: i32,
}

// Durations are stored as whole milliseconds
mod duration_millis_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => u64::try_from(d.as_millis())
                .unwrap_or(u64::MAX)
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            temp_root: None,
            sync_writes: false,
            lock_timeout: Some(Duration::from_secs(1)),
            max_open_files: -1,
        }
    }
}

impl KvConfig {
    /// Config that fsyncs every commit
    pub fn durable() -> Self {
        Self {
            sync_writes: true,
            ..Default::default()
        }
    }

    /// Create scratch directories under `root`
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Enable or disable synced writes
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Set the write-lock wait
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Cap the number of open engine files
    pub fn with_max_open_files(mut self, max: i32) -> Self {
        self.max_open_files = max;
        self
    }
}

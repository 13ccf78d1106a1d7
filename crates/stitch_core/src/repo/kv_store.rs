//! Durable key-value contract and its SQLite implementation.
//!
//! # Responsibility
//! - Store overlay values as JSON text under string keys.
//! - Enforce an optional total-size quota so capacity failures are
//!   observable the way a browser storage quota would be.
//!
//! # Invariants
//! - `apply_batch` is all-or-nothing.
//! - Quota accounting counts value bytes only, across every key.

use crate::repo::outcome::{PersistenceWriteError, StoreError, StoreResult, WriteAck};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type KvResult<T> = Result<T, KvError>;

/// Key-value transport failure.
#[derive(Debug)]
pub enum KvError {
    Sqlite(rusqlite::Error),
    QuotaExceeded {
        key: String,
        required_bytes: u64,
        quota_bytes: u64,
    },
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::QuotaExceeded {
                key,
                required_bytes,
                quota_bytes,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: {required_bytes} bytes needed, {quota_bytes} allowed"
            ),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// One pending mutation of the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Set { key: String, value: String },
    Remove { key: String },
}

impl KvWrite {
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }
}

/// Durable storage the overlay is persisted through.
pub trait KvStore {
    fn get(&self, key: &str) -> KvResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> KvResult<()>;
    /// Removing an absent key succeeds.
    fn remove(&self, key: &str) -> KvResult<()>;
    /// Applies every write or none of them.
    fn apply_batch(&self, writes: &[KvWrite]) -> KvResult<()>;
}

/// SQLite-backed key-value store over the `kv_entries` table.
pub struct SqliteKvStore<'conn> {
    conn: &'conn Connection,
    quota_bytes: Option<u64>,
}

impl<'conn> SqliteKvStore<'conn> {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            quota_bytes: None,
        }
    }

    /// Caps the total stored value size in bytes.
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }

    /// Total bytes currently stored across all values.
    pub fn usage_bytes(&self) -> KvResult<u64> {
        usage_excluding(self.conn, "")
    }

    /// Lists stored keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> KvResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key;")?;
        let keys = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

impl KvStore for SqliteKvStore<'_> {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        set_on(self.conn, self.quota_bytes, key, value)
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn apply_batch(&self, writes: &[KvWrite]) -> KvResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for write in writes {
            match write {
                KvWrite::Set { key, value } => set_on(&tx, self.quota_bytes, key, value)?,
                KvWrite::Remove { key } => {
                    tx.execute("DELETE FROM kv_entries WHERE key = ?1;", [key.as_str()])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn set_on(conn: &Connection, quota_bytes: Option<u64>, key: &str, value: &str) -> KvResult<()> {
    if let Some(quota_bytes) = quota_bytes {
        let required_bytes = usage_excluding(conn, key)? + value.len() as u64;
        if required_bytes > quota_bytes {
            return Err(KvError::QuotaExceeded {
                key: key.to_string(),
                required_bytes,
                quota_bytes,
            });
        }
    }

    conn.execute(
        "INSERT INTO kv_entries (key, value, updated_at)
         VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at;",
        params![key, value],
    )?;
    Ok(())
}

fn usage_excluding(conn: &Connection, key: &str) -> KvResult<u64> {
    let used = conn.query_row(
        "SELECT COALESCE(SUM(length(CAST(value AS BLOB))), 0) FROM kv_entries WHERE key <> ?1;",
        [key],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(u64::try_from(used).unwrap_or(0))
}

/// Reads and decodes a JSON value; an absent key yields `T::default()`.
pub(crate) fn read_json<T>(kv: &dyn KvStore, key: &str) -> StoreResult<T>
where
    T: DeserializeOwned + Default,
{
    match kv.get(key)? {
        Some(text) => serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

/// Encodes `value` as a pending `Set` write for `key`.
pub(crate) fn encode_write<T: Serialize>(key: &str, value: &T) -> StoreResult<KvWrite> {
    let text = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    Ok(KvWrite::Set {
        key: key.to_string(),
        value: text,
    })
}

/// Applies writes one by one, continuing past failures.
///
/// Returns the acknowledgement of the first failed write, if any.
pub(crate) fn persist_writes(kv: &dyn KvStore, writes: Vec<KvWrite>) -> WriteAck {
    let mut ack = WriteAck::Durable;
    for write in writes {
        let result = match &write {
            KvWrite::Set { key, value } => kv.set(key, value),
            KvWrite::Remove { key } => kv.remove(key),
        };
        ack = ack.and(acknowledge(write.key(), result));
    }
    ack
}

/// Applies writes as one all-or-nothing batch.
pub(crate) fn commit_writes(kv: &dyn KvStore, writes: &[KvWrite]) -> WriteAck {
    if writes.is_empty() {
        return WriteAck::Durable;
    }
    let batch_label = writes
        .iter()
        .map(KvWrite::key)
        .collect::<Vec<_>>()
        .join(",");
    acknowledge(&batch_label, kv.apply_batch(writes))
}

fn acknowledge(key: &str, result: KvResult<()>) -> WriteAck {
    match result {
        Ok(()) => {
            debug!("event=kv_write module=repo status=ok key={key}");
            WriteAck::Durable
        }
        Err(source) => {
            warn!(
                "event=kv_write module=repo status=error key={key} error_code={} error={source}",
                kv_error_code(&source)
            );
            WriteAck::NotDurable(PersistenceWriteError {
                key: key.to_string(),
                source,
            })
        }
    }
}

fn kv_error_code(err: &KvError) -> &'static str {
    match err {
        KvError::Sqlite(_) => "kv_sqlite_failed",
        KvError::QuotaExceeded { .. } => "kv_quota_exceeded",
    }
}

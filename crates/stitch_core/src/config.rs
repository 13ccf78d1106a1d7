//! Runtime configuration for embedding the overlay core.
//!
//! # Responsibility
//! - Describe where base documents live and where the overlay persists.
//! - Validate values before any storage is opened.
//!
//! # Invariants
//! - A missing `db_path` means an in-memory overlay that dies with the
//!   process.
//! - `storage_namespace`, when set, is a plain `[A-Za-z0-9_]+` token.

use crate::catalog::DirCatalogSource;
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::default_log_level;
use crate::repo::kv_store::SqliteKvStore;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = "./data";

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid namespace regex"));

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Core settings, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Directory holding the base dataset documents.
    pub data_dir: PathBuf,
    /// Overlay database file; `None` keeps the overlay in memory.
    pub db_path: Option<PathBuf>,
    /// Prefix for every overlay key (`<namespace>_characters_created`).
    pub storage_namespace: Option<String>,
    /// Total overlay value size allowed, in bytes.
    pub storage_quota_bytes: Option<u64>,
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_path: None,
            storage_namespace: None,
            storage_quota_bytes: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config; absent fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(namespace) = &self.storage_namespace {
            if !NAMESPACE_RE.is_match(namespace) {
                return Err(ConfigError::Invalid(format!(
                    "storage_namespace must match [A-Za-z0-9_]+, got `{namespace}`"
                )));
            }
        }
        if self.storage_quota_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "storage_quota_bytes must be positive".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.storage_namespace.as_deref()
    }

    pub fn catalog_source(&self) -> DirCatalogSource {
        DirCatalogSource::new(&self.data_dir)
    }

    /// Opens the configured overlay database with migrations applied.
    pub fn open_db(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Wraps `conn` in a key-value store carrying the configured quota.
    pub fn kv_store<'conn>(&self, conn: &'conn Connection) -> SqliteKvStore<'conn> {
        let store = SqliteKvStore::new(conn);
        match self.storage_quota_bytes {
            Some(quota_bytes) => store.with_quota(quota_bytes),
            None => store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_object_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.db_path.is_none());
    }

    #[test]
    fn fields_override_defaults() {
        let config = CoreConfig::from_json_str(
            r#"{"data_dir": "/srv/stitch/data", "storage_namespace": "stitch", "storage_quota_bytes": 5242880}"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/stitch/data"));
        assert_eq!(config.namespace(), Some("stitch"));
        assert_eq!(config.storage_quota_bytes, Some(5_242_880));
    }

    #[test]
    fn rejects_bad_namespace_and_zero_quota() {
        let namespace = CoreConfig::from_json_str(r#"{"storage_namespace": "a-b"}"#).unwrap_err();
        assert!(matches!(namespace, ConfigError::Invalid(_)));

        let quota = CoreConfig::from_json_str(r#"{"storage_quota_bytes": 0}"#).unwrap_err();
        assert!(matches!(quota, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = CoreConfig::from_json_str(r#"{"dataDir": "x"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn kv_store_carries_configured_quota() {
        let config = CoreConfig::from_json_str(r#"{"storage_quota_bytes": 1024}"#).unwrap();
        let conn = config.open_db().unwrap();

        assert_eq!(config.kv_store(&conn).quota_bytes(), Some(1024));
        assert_eq!(CoreConfig::default().kv_store(&conn).quota_bytes(), None);
    }
}

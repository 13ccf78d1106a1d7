//! Error and acknowledgement types shared by overlay stores.

use crate::repo::kv_store::KvError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure to read or encode persisted overlay state.
#[derive(Debug)]
pub enum StoreError {
    Kv(KvError),
    /// A persisted value is not the JSON shape its key requires.
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kv(err) => write!(f, "{err}"),
            Self::Corrupt { key, source } => {
                write!(f, "corrupt overlay value at `{key}`: {source}")
            }
            Self::Encode { key, source } => {
                write!(f, "failed to encode overlay value for `{key}`: {source}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kv(err) => Some(err),
            Self::Corrupt { source, .. } | Self::Encode { source, .. } => Some(source),
        }
    }
}

impl From<KvError> for StoreError {
    fn from(value: KvError) -> Self {
        Self::Kv(value)
    }
}

/// The durable store rejected an overlay write.
#[derive(Debug)]
pub struct PersistenceWriteError {
    pub key: String,
    pub source: KvError,
}

impl Display for PersistenceWriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "overlay write to `{}` was not persisted: {}", self.key, self.source)
    }
}

impl Error for PersistenceWriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Whether a mutation reached the durable store.
#[derive(Debug)]
pub enum WriteAck {
    Durable,
    /// The in-memory result is valid but was not recorded; the next read
    /// from the store will not reflect it.
    NotDurable(PersistenceWriteError),
}

impl WriteAck {
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable)
    }

    pub fn error(&self) -> Option<&PersistenceWriteError> {
        match self {
            Self::Durable => None,
            Self::NotDurable(err) => Some(err),
        }
    }

    /// Combines two acknowledgements, keeping the first failure.
    pub fn and(self, other: WriteAck) -> WriteAck {
        match self {
            Self::Durable => other,
            failed @ Self::NotDurable(_) => failed,
        }
    }

    pub fn into_result(self) -> Result<(), PersistenceWriteError> {
        match self {
            Self::Durable => Ok(()),
            Self::NotDurable(err) => Err(err),
        }
    }
}

/// Result of a write operation plus its durability acknowledgement.
#[derive(Debug)]
pub struct WriteOutcome<T> {
    pub value: T,
    pub ack: WriteAck,
}

impl<T> WriteOutcome<T> {
    pub fn new(value: T, ack: WriteAck) -> Self {
        Self { value, ack }
    }

    pub fn is_durable(&self) -> bool {
        self.ack.is_durable()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WriteOutcome<U> {
        WriteOutcome {
            value: f(self.value),
            ack: self.ack,
        }
    }

    /// Returns the value only when the write was durable.
    pub fn into_durable(self) -> Result<T, PersistenceWriteError> {
        self.ack.into_result().map(|()| self.value)
    }
}

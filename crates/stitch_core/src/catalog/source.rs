//! Document sources for the base catalog.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Base dataset retrieval or parse failure.
#[derive(Debug)]
pub enum LoadError {
    /// The document could not be read.
    Io {
        document: String,
        source: std::io::Error,
    },
    /// The source has no document with this name.
    Missing { document: String },
    /// The document is not valid JSON.
    Parse {
        document: String,
        source: serde_json::Error,
    },
}

impl LoadError {
    pub fn document(&self) -> &str {
        match self {
            Self::Io { document, .. } | Self::Missing { document } | Self::Parse { document, .. } => {
                document
            }
        }
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { document, source } => write!(f, "failed to read `{document}`: {source}"),
            Self::Missing { document } => write!(f, "base document not found: `{document}`"),
            Self::Parse { document, source } => {
                write!(f, "failed to parse `{document}`: {source}")
            }
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Missing { .. } => None,
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Provider of raw base dataset documents by name.
pub trait CatalogSource {
    /// Returns the raw text of `document`.
    fn fetch(&self, document: &str) -> Result<String, LoadError>;

    /// Short label used in log events.
    fn describe(&self) -> String;
}

/// Reads documents from files under one data directory.
#[derive(Debug, Clone)]
pub struct DirCatalogSource {
    root: PathBuf,
}

impl DirCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CatalogSource for DirCatalogSource {
    fn fetch(&self, document: &str) -> Result<String, LoadError> {
        let path = self.root.join(document);
        std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::Missing {
                    document: document.to_string(),
                }
            } else {
                LoadError::Io {
                    document: document.to_string(),
                    source,
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

/// In-memory documents keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogSource {
    documents: BTreeMap<String, String>,
}

impl MemoryCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one document, builder style.
    pub fn with_document(mut self, document: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(document, text);
        self
    }

    pub fn insert(&mut self, document: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(document.into(), text.into());
    }
}

impl CatalogSource for MemoryCatalogSource {
    fn fetch(&self, document: &str) -> Result<String, LoadError> {
        self.documents
            .get(document)
            .cloned()
            .ok_or_else(|| LoadError::Missing {
                document: document.to_string(),
            })
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.documents.len())
    }
}

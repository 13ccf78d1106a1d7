//! Overlay-merge persistence core for Stitch story projects.
//!
//! Gives characters, events, timeline entries, synopses, foreshadowing
//! threads and relationships uniform create/update/delete semantics over an
//! immutable base dataset, without ever writing to that dataset.

pub mod catalog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use catalog::{BaseCatalogLoader, CatalogSource, DirCatalogSource, LoadError, MemoryCatalogSource};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{EntityKind, Fields, Record};
pub use model::id::IdentifierIssuer;
pub use model::image::ImageRef;
pub use repo::blob_table::BlobSideTable;
pub use repo::delta_store::{DeltaStore, Overlay, OverlayKeys};
pub use repo::kv_store::{KvError, KvResult, KvStore, KvWrite, SqliteKvStore};
pub use repo::order_override::{apply_saved_order, OrderOverride};
pub use repo::outcome::{PersistenceWriteError, StoreError, StoreResult, WriteAck, WriteOutcome};
pub use service::cascade::CascadeCoordinator;
pub use service::context::{NarrativeContext, Snapshot};
pub use service::stats::{ForeshadowingStats, ProjectStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

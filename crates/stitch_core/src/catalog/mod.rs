//! Immutable base dataset access.
//!
//! # Responsibility
//! - Fetch named JSON documents once per process and cache them.
//! - Expose scoped entity collections and display-only taxonomies.
//!
//! # Invariants
//! - Base records are never mutated; callers receive clones.
//! - A failed load never poisons merge: scoped accessors fall back to an
//!   empty collection and log the failure.

mod loader;
mod source;

pub use loader::BaseCatalogLoader;
pub use source::{CatalogSource, DirCatalogSource, LoadError, MemoryCatalogSource};

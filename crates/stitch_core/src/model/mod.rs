//! Domain model shared by every overlay store.
//!
//! # Responsibility
//! - Describe the entity kinds and their storage/base-document layout.
//! - Represent entities as schemaless JSON records so kind-specific fields
//!   survive merges untouched.
//!
//! # Invariants
//! - Every locally authored record carries a string `id`.
//! - Image indirection is parsed once into `ImageRef`; callers never
//!   inspect the `local:` marker themselves.

pub mod entity;
pub mod id;
pub mod image;

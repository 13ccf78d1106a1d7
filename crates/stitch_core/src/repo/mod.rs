//! Overlay persistence: durable key-value storage and per-kind delta stores.
//!
//! # Responsibility
//! - Define the key-value contract the overlay is persisted through.
//! - Hold created/updated/deleted overlays and compute merged views.
//! - Keep image blobs and the timeline order override beside the records.
//!
//! # Invariants
//! - Base records are never written; only overlay keys are.
//! - Write failures never discard the in-memory result; they surface as
//!   `WriteAck::NotDurable` on the returned outcome.
//! - Read failures on corrupt overlay values are errors, not empty defaults.

pub mod blob_table;
pub mod delta_store;
pub mod kv_store;
pub mod order_override;
pub mod outcome;

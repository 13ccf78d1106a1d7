//! Use-case services over the overlay stores.
//!
//! # Responsibility
//! - Wire per-kind stores into one injectable context.
//! - Own cross-kind behavior (cascading delete) and read-only aggregates.

pub mod cascade;
pub mod context;
pub mod stats;

//! `inventory-core` - Relational integrity and transactional writes for an inventory store
//!
//! This crate models a small e-commerce catalog (categories, products, promotion events,
//! stock, users and orders) and guards every write to it: lifecycle hooks normalize the
//! row, the constraint set validates it, registry-driven checks enforce uniqueness and
//! references, and a unit of work commits all staged writes or none of them.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
// Entity derives generate undocumented items, so missing docs only warn
#![warn(
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::clone_on_ref_ptr,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

/// Configuration management for settings, database connection and provisioning
pub mod config;
/// Write core - schema registry, constraints, hooks and unit of work
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;

#[cfg(test)]
pub mod test_utils;

//! Shared test utilities for the inventory core.
//!
//! This module provides helpers for setting up in-memory databases and creating test
//! rows with sensible defaults. Factories write directly through [`Record`], bypassing
//! the unit of work, so tests can arrange state without going through hooks and rules.

use crate::{
    core::{record::Record, schema::SchemaRegistry, unit_of_work::Store},
    entities::{category, product, promotion_event, user},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, prelude::Decimal};
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all database tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_all(&db, &SchemaRegistry::inventory()?).await?;
    Ok(db)
}

/// Creates a [`Store`] over a fresh in-memory database.
pub async fn setup_test_store() -> Result<Store> {
    Store::new(setup_test_db().await?)
}

/// Default product price: 19.99
pub fn test_price() -> Decimal {
    Decimal::new(1999, 2)
}

/// A date in 2024.
///
/// # Panics
/// Panics if `month`/`day` is not a valid calendar date.
#[allow(clippy::unwrap_used)]
pub fn test_date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

/// Creates a top-level category whose name and slug are both `slug`.
pub async fn create_test_category(db: &DatabaseConnection, slug: &str) -> Result<category::Model> {
    category::Model::new(slug, slug).insert_row(db).await
}

/// Creates an inactive physical product named after `slug`.
///
/// # Defaults
/// * price: 19.99
pub async fn create_test_product(
    db: &DatabaseConnection,
    category: &category::Model,
    slug: &str,
) -> Result<product::Model> {
    product::Model::new(category.id, slug, slug, test_price())
        .insert_row(db)
        .await
}

/// Creates a ten percent promotion event running through June 2024.
pub async fn create_test_event(
    db: &DatabaseConnection,
    name: &str,
) -> Result<promotion_event::Model> {
    promotion_event::Model::new(name, test_date(6, 1), test_date(6, 30), 10)
        .insert_row(db)
        .await
}

/// Creates a user with an `example.com` address derived from `username`.
pub async fn create_test_user(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    user::Model::new(username, format!("{username}@example.com"), "argon2-hash")
        .insert_row(db)
        .await
}

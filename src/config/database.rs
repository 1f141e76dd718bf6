//! Database connection and schema provisioning.
//!
//! Tables are generated from the SeaORM entity definitions with
//! `Schema::create_table_from_entity`, in the dependency order resolved by the
//! [`SchemaRegistry`], so every referenced table exists before the tables pointing at
//! it. On top of the entity-derived DDL this adds the registry's composite unique
//! indexes and native `CHECK` constraints mirroring the numeric-range rules.

use crate::config::settings::Settings;
use crate::core::schema::{EntityDef, SchemaRegistry};
use crate::entities::{
    Category, Order, OrderProduct, Product, ProductPromotionEvent, PromotionEvent,
    StockManagement, User, order_product, product, stock_management,
};
use crate::errors::{Error, Result};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema,
    sea_query::{Alias, Expr, Index, Table, TableCreateStatement},
};
use tracing::{debug, info};

/// Opens a connection to the database named in `settings`.
pub async fn create_connection(settings: &Settings) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(settings.database_url.clone());
    options.sqlx_logging(settings.sqlx_logging);

    let db = Database::connect(options).await?;
    info!("Connected to {}", settings.database_url);
    Ok(db)
}

/// Creates every table, composite unique index and check constraint of `registry`.
/// Existing tables are left alone.
pub async fn create_all<C: ConnectionTrait>(db: &C, registry: &SchemaRegistry) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    for entity in registry.creation_order()? {
        let table = table_statement(&schema, entity)?;
        db.execute(backend.build(&table)).await?;

        for unique in entity.uniques.iter().filter(|u| u.fields.len() > 1) {
            let mut index = Index::create();
            index
                .name(unique.name)
                .table(Alias::new(entity.table))
                .unique()
                .if_not_exists();
            for field in &unique.fields {
                index.col(Alias::new(*field));
            }
            db.execute(backend.build(&index)).await?;
        }
        debug!("Created table {}", entity.table);
    }

    info!("Created {} tables", registry.entities().len());
    Ok(())
}

/// Drops every table of `registry`, referencing tables first.
pub async fn drop_all<C: ConnectionTrait>(db: &C, registry: &SchemaRegistry) -> Result<()> {
    let backend = db.get_database_backend();

    for entity in registry.creation_order()?.into_iter().rev() {
        let statement = Table::drop()
            .table(Alias::new(entity.table))
            .if_exists()
            .to_owned();
        db.execute(backend.build(&statement)).await?;
        debug!("Dropped table {}", entity.table);
    }

    info!("Dropped {} tables", registry.entities().len());
    Ok(())
}

/// Drops and recreates every table of `registry`.
pub async fn reset<C: ConnectionTrait>(db: &C, registry: &SchemaRegistry) -> Result<()> {
    drop_all(db, registry).await?;
    create_all(db, registry).await
}

fn table_statement(schema: &Schema, entity: &EntityDef) -> Result<TableCreateStatement> {
    let mut table = match entity.name {
        "Category" => schema.create_table_from_entity(Category),
        "PromotionEvent" => schema.create_table_from_entity(PromotionEvent),
        "Product" => schema.create_table_from_entity(Product),
        "ProductPromotionEvent" => schema.create_table_from_entity(ProductPromotionEvent),
        "StockManagement" => schema.create_table_from_entity(StockManagement),
        "User" => schema.create_table_from_entity(User),
        "Order" => schema.create_table_from_entity(Order),
        "OrderProduct" => schema.create_table_from_entity(OrderProduct),
        other => {
            return Err(Error::Schema {
                message: format!("no table definition for entity {other}"),
            });
        }
    };

    // Native counterparts of the numeric-range rules
    match entity.name {
        "Product" => {
            table.check(Expr::col(product::Column::Price).gte(0));
        }
        "StockManagement" => {
            table.check(Expr::col(stock_management::Column::Quantity).gte(0));
        }
        "OrderProduct" => {
            table.check(Expr::col(order_product::Column::Quantity).gte(0));
        }
        _ => {}
    }

    table.if_not_exists();
    Ok(table)
}

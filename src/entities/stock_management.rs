//! Stock record - Quantity on hand for one product.
//!
//! `product_id` is unique, which makes the product/stock relation one-to-one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stock database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_management")]
pub struct Model {
    /// Unique identifier for the stock record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning product
    #[sea_orm(unique)]
    pub product_id: i64,
    /// Units on hand
    pub quantity: i32,
    /// When the quantity was last written
    pub last_checked_at: DateTimeUtc,
}

/// Defines relationships between `StockManagement` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each stock record belongs to exactly one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Restrict"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Draft stock record for `product_id`.
    #[must_use]
    pub fn new(product_id: i64, quantity: i32) -> Self {
        Self {
            id: 0,
            product_id,
            quantity,
            last_checked_at: DateTimeUtc::default(),
        }
    }
}

//! Product entity - Sellable catalog item.
//!
//! Each product belongs to exactly one category, owns at most one stock record, and
//! takes part in promotion events through the `product_promotion_event` junction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the category this product is listed under
    pub category_id: i64,
    /// Product name (e.g., "Red Shoe")
    #[sea_orm(unique)]
    pub name: String,
    /// URL slug (e.g., "red-shoe")
    #[sea_orm(unique)]
    pub slug: String,
    /// Free-form description, no length limit
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Digital products carry no stock
    pub is_digital: bool,
    /// Active physical products must be in stock
    pub is_active: bool,
    /// Unit price, two decimal places
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    /// One product has at most one stock record
    #[sea_orm(has_one = "super::stock_management::Entity")]
    Stock,
    /// Links to promotion events
    #[sea_orm(has_many = "super::product_promotion_event::Entity")]
    PromotionLinks,
    /// Order lines referencing this product
    #[sea_orm(has_many = "super::order_product::Entity")]
    OrderLines,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::stock_management::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl Related<super::product_promotion_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromotionLinks.def()
    }
}

impl Related<super::order_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLines.def()
    }
}

// Many-to-many through the junction table
impl Related<super::promotion_event::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_promotion_event::Relation::PromotionEvent.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_promotion_event::Relation::Product.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Draft of an inactive physical product. Timestamps are stamped on insert.
    #[must_use]
    pub fn new(
        category_id: i64,
        name: impl Into<String>,
        slug: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: 0,
            category_id,
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            is_digital: false,
            is_active: false,
            price,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }
}

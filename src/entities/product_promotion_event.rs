//! Junction between products and promotion events.
//!
//! The `(product_id, promotion_event_id)` pair is unique (`unique_product_event`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product/promotion link database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_promotion_event")]
pub struct Model {
    /// Unique identifier for the link
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Linked product
    pub product_id: i64,
    /// Linked promotion event
    pub promotion_event_id: i64,
}

/// Defines relationships between the junction and its participants
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each link references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Restrict"
    )]
    Product,
    /// Each link references one promotion event
    #[sea_orm(
        belongs_to = "super::promotion_event::Entity",
        from = "Column::PromotionEventId",
        to = "super::promotion_event::Column::Id",
        on_delete = "Restrict"
    )]
    PromotionEvent,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::promotion_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromotionEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Draft link between a product and an event.
    #[must_use]
    pub const fn new(product_id: i64, promotion_event_id: i64) -> Self {
        Self {
            id: 0,
            product_id,
            promotion_event_id,
        }
    }
}

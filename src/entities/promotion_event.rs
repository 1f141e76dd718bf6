//! Promotion event entity - A time-boxed price reduction.
//!
//! `price_reduction` is read according to `reduction_unit`: a percentage for
//! `"percent"`, an absolute amount for `"amount"`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reduction expressed as a percentage of the price
pub const UNIT_PERCENT: &str = "percent";
/// Reduction expressed as an absolute amount
pub const UNIT_AMOUNT: &str = "amount";

/// Promotion event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotion_event")]
pub struct Model {
    /// Unique identifier for the event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Event name (e.g., "Summer Sale")
    #[sea_orm(unique)]
    pub name: String,
    /// First day of the event
    pub start_date: Date,
    /// Day the event ends, strictly after `start_date`
    pub end_date: Date,
    /// Size of the reduction
    pub price_reduction: i32,
    /// `"percent"` or `"amount"`
    pub reduction_unit: String,
}

/// Defines relationships between `PromotionEvent` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Links to products
    #[sea_orm(has_many = "super::product_promotion_event::Entity")]
    ProductLinks,
}

impl Related<super::product_promotion_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductLinks.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_promotion_event::Relation::Product.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_promotion_event::Relation::PromotionEvent.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Draft of a percentage promotion.
    #[must_use]
    pub fn new(name: impl Into<String>, start_date: Date, end_date: Date, percent: i32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            start_date,
            end_date,
            price_reduction: percent,
            reduction_unit: UNIT_PERCENT.to_string(),
        }
    }

    /// Switches the draft to an absolute reduction of `amount`.
    #[must_use]
    pub fn absolute(mut self, amount: i32) -> Self {
        self.price_reduction = amount;
        self.reduction_unit = UNIT_AMOUNT.to_string();
        self
    }
}

//! Order entity - A purchase placed by one user.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order awaiting payment
pub const STATUS_PENDING: &str = "pending";
/// Order paid in full
pub const STATUS_PAID: &str = "paid";
/// Order canceled before payment
pub const STATUS_CANCELED: &str = "canceled";

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who placed the order
    pub user_id: i64,
    /// One of `"pending"`, `"paid"`, `"canceled"`
    pub status: String,
    /// When the order was created
    pub created_at: DateTime,
    /// When the order was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Restrict"
    )]
    User,
    /// One order has many lines
    #[sea_orm(has_many = "super::order_product::Entity")]
    Lines,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Draft pending order for `user_id`. Timestamps are stamped on insert.
    #[must_use]
    pub fn new(user_id: i64) -> Self {
        Self {
            id: 0,
            user_id,
            status: STATUS_PENDING.to_string(),
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }
}

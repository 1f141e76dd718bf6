//! Category entity - Node of the catalog hierarchy.
//!
//! Categories may nest under a parent category. `name` and `slug` are unique and are
//! lowercased by the lifecycle hooks before every write.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "category")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent category, None for a root category
    pub parent_id: Option<i64>,
    /// Display name (e.g., "shoes")
    #[sea_orm(unique)]
    pub name: String,
    /// URL slug (e.g., "running-shoes")
    #[sea_orm(unique)]
    pub slug: String,
    /// Whether the category is visible in the catalog
    pub is_active: bool,
    /// Depth in the hierarchy, 0 for roots
    pub level: i16,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each category may belong to a parent category
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Restrict"
    )]
    Parent,
    /// One category has many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Draft of a root category. The id is assigned by the store on insert.
    #[must_use]
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: 0,
            parent_id: None,
            name: name.into(),
            slug: slug.into(),
            is_active: false,
            level: 0,
        }
    }

    /// Places the draft under `parent`, one level below it. The unit of work recomputes
    /// `level` from the stored parent on every write.
    #[must_use]
    pub fn under(mut self, parent: &Self) -> Self {
        self.parent_id = Some(parent.id);
        self.level = parent.level.saturating_add(1);
        self
    }
}

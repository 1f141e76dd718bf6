//! Uniform access to the eight inventory entity types.
//!
//! The unit of work and the integrity pre-checks are written once over [`Record`];
//! each entity model implements it through `impl_record!`.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, Iterable, ModelTrait,
    QueryFilter, Value, sea_query::Expr,
};
use std::collections::BTreeSet;
use std::{fmt, future::Future, str::FromStr};

use super::constraints::ConstraintSet;
use super::hooks::{HookChain, LifecycleHooks};
use super::rules::RuleSet;
use crate::entities::{
    category, order, order_product, product, product_promotion_event, promotion_event,
    stock_management, user,
};
use crate::errors::Result;

/// Rows whose deferred rules must be re-checked after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    /// No deferred rule reads this row
    Nothing,
    /// The product with this id
    Product(i64),
    /// Every product linked to the promotion event with this id
    PromotionEvent(i64),
}

/// An entity model the unit of work can stage.
pub trait Record: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// Registry name of the entity
    const ENTITY: &'static str;

    /// Primary key; 0 on a draft.
    fn id(&self) -> i64;

    /// Value of the column named `name`, or `None` if the entity has no such column.
    fn field(&self, name: &str) -> Option<Value>;

    /// Which deferred checks a write of this row affects.
    fn touches(&self) -> Touch;

    /// The hook chain for this entity type.
    fn hooks(hooks: &LifecycleHooks) -> &HookChain<Self>;

    /// The rule set for this entity type.
    fn rules(rules: &ConstraintSet) -> &RuleSet<Self>;

    /// Recomputes columns derived from other rows. Runs before hooks and validation.
    fn resolve_derived<C: ConnectionTrait>(
        &mut self,
        _db: &C,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Brings rows derived from this one up to date after it was overwritten.
    fn propagate<C: ConnectionTrait>(&self, _db: &C) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Loads a row by primary key.
    fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> impl Future<Output = Result<Option<Self>>> + Send;

    /// Inserts the row, letting the engine assign the primary key.
    fn insert_row<C: ConnectionTrait>(self, db: &C) -> impl Future<Output = Result<Self>> + Send;

    /// Overwrites every column of the row with this primary key.
    fn update_row<C: ConnectionTrait>(self, db: &C) -> impl Future<Output = Result<Self>> + Send;

    /// Deletes a row by primary key, returning the number of rows removed.
    fn delete_by_id<C: ConnectionTrait>(db: &C, id: i64) -> impl Future<Output = Result<u64>> + Send;
}

macro_rules! impl_record {
    (
        $module:ident, $entity:literal, |$row:ident| $touch:expr
        $(, resolve = $resolve:path, propagate = $propagate:path)?
    ) => {
        impl Record for $module::Model {
            const ENTITY: &'static str = $entity;

            fn id(&self) -> i64 {
                self.id
            }

            fn field(&self, name: &str) -> Option<Value> {
                $module::Column::from_str(name)
                    .ok()
                    .map(|column| self.get(column))
            }

            fn touches(&self) -> Touch {
                let $row = self;
                $touch
            }

            fn hooks(hooks: &LifecycleHooks) -> &HookChain<Self> {
                &hooks.$module
            }

            fn rules(rules: &ConstraintSet) -> &RuleSet<Self> {
                &rules.$module
            }

            $(
                fn resolve_derived<C: ConnectionTrait>(
                    &mut self,
                    db: &C,
                ) -> impl Future<Output = Result<()>> + Send {
                    $resolve(self, db)
                }

                fn propagate<C: ConnectionTrait>(
                    &self,
                    db: &C,
                ) -> impl Future<Output = Result<()>> + Send {
                    $propagate(self, db)
                }
            )?

            fn find_by_id<C: ConnectionTrait>(
                db: &C,
                id: i64,
            ) -> impl Future<Output = Result<Option<Self>>> + Send {
                async move { Ok($module::Entity::find_by_id(id).one(db).await?) }
            }

            fn insert_row<C: ConnectionTrait>(
                self,
                db: &C,
            ) -> impl Future<Output = Result<Self>> + Send {
                async move {
                    let mut active = staged::<$module::ActiveModel>(&self);
                    active.not_set($module::Column::Id);
                    Ok(active.insert(db).await?)
                }
            }

            fn update_row<C: ConnectionTrait>(
                self,
                db: &C,
            ) -> impl Future<Output = Result<Self>> + Send {
                async move { Ok(staged::<$module::ActiveModel>(&self).update(db).await?) }
            }

            fn delete_by_id<C: ConnectionTrait>(
                db: &C,
                id: i64,
            ) -> impl Future<Output = Result<u64>> + Send {
                async move {
                    let result = $module::Entity::delete_by_id(id).exec(db).await?;
                    Ok(result.rows_affected)
                }
            }
        }
    };
}

/// Active model with every column marked as set to the model's value.
fn staged<A>(model: &<A::Entity as EntityTrait>::Model) -> A
where
    A: ActiveModelTrait + Default,
{
    let mut active = <A as Default>::default();
    for column in <A::Entity as EntityTrait>::Column::iter() {
        active.set(column, model.get(column));
    }
    active
}

/// A category sits one level below its stored parent; roots are level 0.
async fn category_level<C: ConnectionTrait>(row: &mut category::Model, db: &C) -> Result<()> {
    row.level = match row.parent_id {
        Some(parent_id) => category::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .map_or(0, |parent| parent.level.saturating_add(1)),
        None => 0,
    };
    Ok(())
}

/// Re-levels every descendant of a category whose level may have moved.
async fn relevel_descendants<C: ConnectionTrait>(row: &category::Model, db: &C) -> Result<()> {
    let mut visited = BTreeSet::from([row.id]);
    let mut frontier = vec![(row.id, row.level)];
    while let Some((parent_id, level)) = frontier.pop() {
        let level = level.saturating_add(1);
        let children = category::Entity::find()
            .filter(category::Column::ParentId.eq(parent_id))
            .all(db)
            .await?;
        if children.iter().any(|child| child.level != level) {
            category::Entity::update_many()
                .col_expr(category::Column::Level, Expr::value(level))
                .filter(category::Column::ParentId.eq(parent_id))
                .exec(db)
                .await?;
        }
        frontier.extend(
            children
                .into_iter()
                .filter(|child| visited.insert(child.id))
                .map(|child| (child.id, level)),
        );
    }
    Ok(())
}

impl_record!(
    category,
    "Category",
    |_row| Touch::Nothing,
    resolve = category_level,
    propagate = relevel_descendants
);
impl_record!(product, "Product", |row| Touch::Product(row.id));
impl_record!(promotion_event, "PromotionEvent", |row| Touch::PromotionEvent(row.id));
impl_record!(product_promotion_event, "ProductPromotionEvent", |row| Touch::Product(
    row.product_id
));
impl_record!(stock_management, "StockManagement", |row| Touch::Product(row.product_id));
impl_record!(user, "User", |_row| Touch::Nothing);
impl_record!(order, "Order", |_row| Touch::Nothing);
impl_record!(order_product, "OrderProduct", |_row| Touch::Nothing);

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::prelude::Decimal;

    #[test]
    fn test_field_lookup_by_column_name() {
        let line = order_product::Model::new(4, 9, 2);

        assert_eq!(line.field("product_id"), Some(Value::BigInt(Some(9))));
        assert_eq!(line.field("quantity"), Some(Value::Int(Some(2))));
        assert_eq!(line.field("colour"), None);
    }

    #[test]
    fn test_touches() {
        let mut shoe = product::Model::new(1, "Shoe", "shoe", Decimal::ONE);
        shoe.id = 5;

        assert_eq!(shoe.touches(), Touch::Product(5));
        assert_eq!(stock_management::Model::new(5, 1).touches(), Touch::Product(5));
        assert_eq!(product_promotion_event::Model::new(5, 2).touches(), Touch::Product(5));
        assert_eq!(user::Model::new("bob", "b@x.io", "h").touches(), Touch::Nothing);
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_update_overwrites() -> Result<()> {
        let db = setup_test_db().await?;

        let created = category::Model::new("shoes", "shoes").insert_row(&db).await?;
        assert!(created.id > 0);

        let mut renamed = created.clone();
        renamed.name = "boots".to_string();
        renamed.is_active = true;
        let updated = renamed.update_row(&db).await?;
        assert_eq!(updated.name, "boots");
        assert!(updated.is_active);

        let found = category::Model::find_by_id(&db, created.id).await?.unwrap();
        assert_eq!(found, updated);

        assert_eq!(category::Model::delete_by_id(&db, created.id).await?, 1);
        assert!(category::Model::find_by_id(&db, created.id).await?.is_none());
        assert_eq!(category::Model::delete_by_id(&db, created.id).await?, 0);
        Ok(())
    }
}

//! Registry-driven integrity checks run before a write is staged.
//!
//! The storage engine enforces the same constraints natively; these checks exist so the
//! common violations surface as typed [`IntegrityError`]s naming the registry constraint
//! instead of an engine message.

use sea_orm::{
    ConnectionTrait, Value,
    sea_query::{Alias, Asterisk, Expr, Func, Query},
};
use std::collections::BTreeSet;
use tracing::debug;

use super::constraints::ids;
use super::record::Record;
use super::schema::{PRIMARY_KEY, SchemaRegistry};
use crate::errors::{Error, IntegrityError, Result};

/// Counts rows of `table` matching every `(column, value)` pair, skipping the row whose
/// primary key is `exclude`.
pub async fn count_where<C: ConnectionTrait>(
    db: &C,
    table: &str,
    conditions: Vec<(&str, Value)>,
    exclude: Option<i64>,
) -> Result<i64> {
    let mut query = Query::select();
    query
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Alias::new(table));
    for (column, value) in conditions {
        query.and_where(Expr::col(Alias::new(column)).eq(value));
    }
    if let Some(id) = exclude {
        query.and_where(Expr::col(Alias::new(PRIMARY_KEY)).ne(id));
    }

    let backend = db.get_database_backend();
    let Some(row) = db.query_one(backend.build(&query)).await? else {
        return Ok(0);
    };
    Ok(row.try_get::<i64>("", "count")?)
}

/// Rejects `record` if another row already holds its values for any unique constraint.
pub async fn check_unique<M: Record, C: ConnectionTrait>(
    db: &C,
    schema: &SchemaRegistry,
    record: &M,
) -> Result<()> {
    let entity = schema.entity(M::ENTITY)?;
    let exclude = (record.id() != 0).then(|| record.id());

    for unique in &entity.uniques {
        let mut conditions = Vec::with_capacity(unique.fields.len());
        for field in &unique.fields {
            conditions.push((*field, column_value(record, field)?));
        }
        if count_where(db, entity.table, conditions, exclude).await? > 0 {
            debug!(entity = M::ENTITY, constraint = unique.name, "unique pre-check failed");
            return Err(IntegrityError::Unique {
                entity: M::ENTITY,
                constraint: unique.name,
            }
            .into());
        }
    }
    Ok(())
}

/// Rejects `record` if any reference it holds points at a missing row.
pub async fn check_references<M: Record, C: ConnectionTrait>(
    db: &C,
    schema: &SchemaRegistry,
    record: &M,
) -> Result<()> {
    for relation in schema.owned_by(M::ENTITY) {
        for link in &relation.links {
            let Some(id) = reference(record, link.field)? else {
                continue;
            };
            let target = schema.entity(link.target)?;
            let found = count_where(db, target.table, vec![(PRIMARY_KEY, id.into())], None).await?;
            if found == 0 {
                debug!(relation = relation.name, field = link.field, id, "reference pre-check failed");
                return Err(IntegrityError::ForeignKey {
                    relation: relation.name,
                    entity: M::ENTITY,
                    field: link.field,
                    target: link.target,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Refuses to delete row `id` of `M` while any row references it.
pub async fn check_restrict<M: Record, C: ConnectionTrait>(
    db: &C,
    schema: &SchemaRegistry,
    id: i64,
) -> Result<()> {
    for (relation, link) in schema.referencing(M::ENTITY) {
        let owner = schema.entity(relation.owner)?;
        let count = count_where(db, owner.table, vec![(link.field, id.into())], None).await?;
        if count > 0 {
            return Err(IntegrityError::RestrictDelete {
                relation: relation.name,
                entity: M::ENTITY,
                id,
                referencing_entity: owner.name,
                count,
            }
            .into());
        }
    }
    Ok(())
}

/// Rejects an update that would make `record` its own ancestor through a
/// self-referencing relation.
pub async fn check_acyclic<M: Record, C: ConnectionTrait>(
    db: &C,
    schema: &SchemaRegistry,
    record: &M,
) -> Result<()> {
    if record.id() == 0 {
        return Ok(());
    }
    let entity = schema.entity(M::ENTITY)?;

    for relation in schema.owned_by(M::ENTITY).filter(|r| r.is_self_referencing()) {
        for link in &relation.links {
            let mut visited = BTreeSet::new();
            let mut next = reference(record, link.field)?;
            while let Some(current) = next {
                if current == record.id() {
                    return Err(Error::Validation {
                        entity: M::ENTITY,
                        violations: vec![ids::HIERARCHY_ACYCLIC],
                    });
                }
                if !visited.insert(current) {
                    break;
                }
                next = parent_of(db, entity.table, link.field, current).await?;
            }
        }
    }
    Ok(())
}

async fn parent_of<C: ConnectionTrait>(
    db: &C,
    table: &str,
    field: &str,
    id: i64,
) -> Result<Option<i64>> {
    let mut query = Query::select();
    query
        .column(Alias::new(field))
        .from(Alias::new(table))
        .and_where(Expr::col(Alias::new(PRIMARY_KEY)).eq(id));

    let backend = db.get_database_backend();
    match db.query_one(backend.build(&query)).await? {
        Some(row) => Ok(row.try_get::<Option<i64>>("", field)?),
        None => Ok(None),
    }
}

fn column_value<M: Record>(record: &M, field: &str) -> Result<Value> {
    record.field(field).ok_or_else(|| Error::Schema {
        message: format!("{} has no column `{field}`", M::ENTITY),
    })
}

/// The referenced primary key, `None` for an unset optional reference.
fn reference<M: Record>(record: &M, field: &str) -> Result<Option<i64>> {
    match column_value(record, field)? {
        Value::BigInt(id) => Ok(id),
        other => Err(Error::Schema {
            message: format!("{}.{field} is not a reference column: {other:?}", M::ENTITY),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{category, product, stock_management};
    use crate::errors::NativeKind;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_count_where_excludes_own_row() -> Result<()> {
        let db = setup_test_db().await?;
        let shoes = create_test_category(&db, "shoes").await?;

        let by_slug = || vec![("slug", Value::from("shoes"))];
        assert_eq!(count_where(&db, "category", by_slug(), None).await?, 1);
        assert_eq!(count_where(&db, "category", by_slug(), Some(shoes.id)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_precheck_names_constraint() -> Result<()> {
        let db = setup_test_db().await?;
        let schema = SchemaRegistry::inventory()?;
        let shoes = create_test_category(&db, "shoes").await?;

        let duplicate = category::Model::new("other", "shoes");
        let err = check_unique(&db, &schema, &duplicate).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::Unique { constraint: "uq_category_slug", .. })
        ));

        // Re-saving the existing row does not collide with itself.
        check_unique(&db, &schema, &shoes).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_one_to_one_second_stock_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let schema = SchemaRegistry::inventory()?;
        let shoes = create_test_category(&db, "shoes").await?;
        let shoe = create_test_product(&db, &shoes, "red-shoe").await?;
        stock_management::Model::new(shoe.id, 3).insert_row(&db).await?;

        let second = stock_management::Model::new(shoe.id, 1);
        let err = check_unique(&db, &schema, &second).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::Unique {
                constraint: "uq_stock_management_product_id",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_reference_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let schema = SchemaRegistry::inventory()?;

        let orphan = product::Model::new(42, "Shoe", "shoe", test_price());
        let err = check_references(&db, &schema, &orphan).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::ForeignKey {
                relation: "product_category",
                target: "Category",
                ..
            })
        ));

        // An unset optional parent is not a reference.
        check_references(&db, &schema, &category::Model::new("shoes", "shoes")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_restrict_counts_referencing_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let schema = SchemaRegistry::inventory()?;
        let shoes = create_test_category(&db, "shoes").await?;
        create_test_product(&db, &shoes, "red-shoe").await?;
        create_test_product(&db, &shoes, "blue-shoe").await?;

        let err = check_restrict::<category::Model, _>(&db, &schema, shoes.id)
            .await
            .unwrap_err();
        match err {
            Error::Integrity(IntegrityError::RestrictDelete {
                relation,
                referencing_entity,
                count,
                ..
            }) => {
                assert_eq!(relation, "product_category");
                assert_eq!(referencing_entity, "Product");
                assert_eq!(count, 2);
            }
            other => panic!("expected restrict violation, got {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_hierarchy_cycle_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let schema = SchemaRegistry::inventory()?;
        let root = create_test_category(&db, "apparel").await?;
        let child = category::Model::new("shoes", "shoes")
            .under(&root)
            .insert_row(&db)
            .await?;

        let mut looped = root.clone();
        looped.parent_id = Some(child.id);
        let err = check_acyclic(&db, &schema, &looped).await.unwrap_err();
        assert_eq!(err.violations(), Some(&[ids::HIERARCHY_ACYCLIC][..]));

        let mut moved = child.clone();
        moved.parent_id = None;
        check_acyclic(&db, &schema, &moved).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_unique_violation_is_native_integrity() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_category(&db, "shoes").await?;

        let err = category::Model::new("other", "shoes")
            .insert_row(&db)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::Native { kind: NativeKind::Unique, .. })
        ));
        Ok(())
    }
}

//! Error taxonomy for the inventory write core.
//!
//! Three kinds matter to callers: [`Error::Validation`] (business rules failed before
//! anything reached the storage engine), [`Error::Integrity`] (a uniqueness or
//! referential rule was violated, either by an in-process pre-check or natively by
//! the engine) and [`Error::Transaction`] (the scope itself could not begin, commit or
//! roll back). All three mean the transaction committed nothing.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::core::rules::RuleId;

/// Which native engine constraint rejected a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    /// Unique index or `UNIQUE` column.
    Unique,
    /// Foreign key reference or `ON DELETE RESTRICT`.
    ForeignKey,
    /// Native `CHECK` constraint.
    Check,
}

/// A uniqueness or referential violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Another row already holds the same value(s) for a unique constraint.
    #[error("unique constraint `{constraint}` violated on {entity}")]
    Unique {
        /// Entity being written
        entity: &'static str,
        /// Registry name of the unique constraint
        constraint: &'static str,
    },

    /// A reference points at a row that does not exist.
    #[error("relation `{relation}`: {entity}.{field} references a missing {target}")]
    ForeignKey {
        /// Registry name of the relation
        relation: &'static str,
        /// Entity holding the reference
        entity: &'static str,
        /// Reference field
        field: &'static str,
        /// Referenced entity
        target: &'static str,
    },

    /// Delete refused because other rows still reference the target.
    #[error(
        "cannot delete {entity} {id}: still referenced by {count} {referencing_entity} row(s) via `{relation}`"
    )]
    RestrictDelete {
        /// Registry name of the relation
        relation: &'static str,
        /// Entity being deleted
        entity: &'static str,
        /// Primary key of the row being deleted
        id: i64,
        /// Entity holding the references
        referencing_entity: &'static str,
        /// Number of referencing rows
        count: i64,
    },

    /// The storage engine rejected a statement or a commit.
    #[error("storage engine rejected the write ({kind:?}): {message}")]
    Native {
        /// Constraint family reported by the engine
        kind: NativeKind,
        /// Engine message
        message: String,
    },
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more business rules failed for a write.
    #[error("Validation failed for {entity}: {}", violations.join(", "))]
    Validation {
        /// Entity being written
        entity: &'static str,
        /// Violated rule identifiers, in rule declaration order
        violations: Vec<RuleId>,
    },

    /// Uniqueness or referential integrity violation.
    #[error("Integrity error: {0}")]
    Integrity(IntegrityError),

    /// The transaction scope could not begin, commit or roll back, or was misused.
    #[error("Transaction error: {message}")]
    Transaction {
        /// What went wrong
        message: String,
    },

    /// Update or delete target does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity looked up
        entity: &'static str,
        /// Primary key looked up
        id: i64,
    },

    /// No junction row links the two rows.
    #[error("{entity} linking product {product_id} and promotion event {promotion_event_id} not found")]
    LinkNotFound {
        /// Junction entity looked up
        entity: &'static str,
        /// Product side of the link
        product_id: i64,
        /// Promotion event side of the link
        promotion_event_id: i64,
    },

    /// The declared schema does not resolve.
    #[error("Schema error: {message}")]
    Schema {
        /// What failed to resolve
        message: String,
    },

    /// Settings could not be loaded.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Any other storage failure.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl Error {
    /// Classifies a failed commit. Integrity rejections keep their kind; anything
    /// else means the commit call itself failed.
    pub(crate) fn from_commit(err: DbErr) -> Self {
        match Self::from(err) {
            Self::Database(err) => Self::Transaction {
                message: format!("commit failed: {err}"),
            },
            classified => classified,
        }
    }

    /// True for [`Error::Integrity`].
    #[must_use]
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    /// Violated rule identifiers if this is a validation error.
    #[must_use]
    pub fn violations(&self) -> Option<&[RuleId]> {
        match self {
            Self::Validation { violations, .. } => Some(violations),
            _ => None,
        }
    }
}

impl From<IntegrityError> for Error {
    fn from(value: IntegrityError) -> Self {
        Self::Integrity(value)
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        let kind = match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Some(NativeKind::Unique),
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => Some(NativeKind::ForeignKey),
            _ if err.to_string().contains("CHECK constraint failed") => Some(NativeKind::Check),
            _ => None,
        };

        match kind {
            Some(kind) => Self::Integrity(IntegrityError::Native {
                kind,
                message: err.to_string(),
            }),
            None => Self::Database(err),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_rules() {
        let err = Error::Validation {
            entity: "Product",
            violations: vec!["chk_price_positive", "chk_slug_format_seo"],
        };
        assert_eq!(
            err.to_string(),
            "Validation failed for Product: chk_price_positive, chk_slug_format_seo"
        );
        assert_eq!(
            err.violations(),
            Some(&["chk_price_positive", "chk_slug_format_seo"][..])
        );
    }

    #[test]
    fn test_plain_db_error_stays_database() {
        let err = Error::from(DbErr::Custom("disk on fire".to_string()));
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_integrity());
    }

    #[test]
    fn test_commit_failure_becomes_transaction_error() {
        let err = Error::from_commit(DbErr::Custom("connection reset".to_string()));
        assert!(matches!(err, Error::Transaction { .. }));
    }
}

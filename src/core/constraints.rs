//! The inventory constraint set.
//!
//! Row rules are checked on every write, after the lifecycle hooks ran. Product rules
//! that depend on related rows (stock on hand, promotion reductions) are checked over a
//! [`ProductState`] when the unit of work commits, because the related rows are usually
//! written in the same transaction as the product itself.

use chrono::NaiveDate;
use regex::Regex;
use sea_orm::{ConnectionTrait, ModelTrait, prelude::Decimal};

use super::record::Record;
use super::rules::{
    Rule, RuleId, RuleKind, RuleSet, at_least, before, implies, matches, max_chars, not_after,
    not_blank, not_empty, one_of, within,
};
use crate::entities::{
    PromotionEvent, StockManagement, category, order, order_product, product,
    product_promotion_event, promotion_event, stock_management, user,
};
use crate::errors::{Error, Result};

/// Lowercase words joined by single hyphens.
pub const SLUG_PATTERN: &str = r"^[a-z0-9]+(-[a-z0-9]+)*$";
/// Letters, digits and underscores.
pub const USERNAME_PATTERN: &str = r"^[A-Za-z0-9_]+$";
/// Local part, `@`, domain with a top-level label of two or more letters.
pub const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

/// Longest promotion event, in days.
pub const MAX_EVENT_DAYS: i64 = 30;
/// Largest price that fits `Numeric(10, 2)`.
const MAX_PRICE_UNITS: i64 = 100_000_000;

/// Rule identifiers.
pub mod ids {
    use crate::core::rules::RuleId;

    /// Name is the empty string
    pub const NAME_NOT_EMPTY: RuleId = "chk_name_not_empty";
    /// Name is only whitespace
    pub const NAME_NOT_WHITESPACE: RuleId = "chk_name_not_whitespace";
    /// Name exceeds 50 characters
    pub const NAME_LENGTH: RuleId = "chk_name_length";
    /// Slug is the empty string
    pub const SLUG_NOT_EMPTY: RuleId = "chk_slug_not_empty";
    /// Slug is not lowercase words joined by hyphens
    pub const SLUG_FORMAT: RuleId = "chk_slug_format_seo";
    /// Slug exceeds 55 characters
    pub const SLUG_LENGTH: RuleId = "chk_slug_length";
    /// Hierarchy level is negative
    pub const LEVEL_NON_NEGATIVE: RuleId = "chk_level_non_negative";
    /// Category is its own parent, or an ancestor of its parent
    pub const HIERARCHY_ACYCLIC: RuleId = "chk_hierarchy_acyclic";
    /// Price is negative
    pub const PRICE_POSITIVE: RuleId = "chk_price_positive";
    /// Price has more than two decimals or eight integral digits
    pub const PRICE_PRECISION: RuleId = "chk_price_precision";
    /// `created_at` is after `updated_at`
    pub const TIMESTAMP_ORDER: RuleId = "chk_timestamp_order";
    /// Event does not start before it ends
    pub const EVENT_DATES: RuleId = "chk_event_dates";
    /// Event lasts longer than 30 days
    pub const EVENT_DURATION: RuleId = "chk_event_duration";
    /// Reduction unit is not `percent` or `amount`
    pub const REDUCTION_UNIT_ENUM: RuleId = "chk_reduction_unit_enum";
    /// Percentage reduction is outside `[0, 100]`
    pub const DISCOUNT_RANGE: RuleId = "chk_discount_range";
    /// Reduction is negative
    pub const REDUCTION_NON_NEGATIVE: RuleId = "chk_reduction_non_negative";
    /// Quantity is negative
    pub const QUANTITY_VALID: RuleId = "chk_quantity_valid";
    /// Username is the empty string
    pub const USERNAME_NOT_EMPTY: RuleId = "chk_username_not_empty";
    /// Username has characters other than letters, digits, underscore
    pub const USERNAME_FORMAT: RuleId = "chk_username";
    /// Username exceeds 50 characters
    pub const USERNAME_LENGTH: RuleId = "chk_username_length";
    /// Email is the empty string
    pub const EMAIL_NOT_EMPTY: RuleId = "chk_email_not_empty";
    /// Email is not an address
    pub const EMAIL_FORMAT: RuleId = "chk_email_format";
    /// Email exceeds 255 characters
    pub const EMAIL_LENGTH: RuleId = "chk_email_length";
    /// Password hash is the empty string
    pub const PASSWORD_NOT_EMPTY: RuleId = "chk_password_not_empty";
    /// Password hash exceeds 100 characters
    pub const PASSWORD_LENGTH: RuleId = "chk_password_length";
    /// Order status is not `pending`, `paid` or `canceled`
    pub const STATUS_ENUM: RuleId = "chk_status_enum";
    /// Active physical product has no stock
    pub const ACTIVE_NEEDS_STOCK: RuleId = "chk_active_needs_stock_full";
    /// Digital product has stock
    pub const DIGITAL_NO_STOCK: RuleId = "chk_digital_no_stock";
    /// An absolute reduction exceeds the product price
    pub const DISCOUNT_LE_PRICE: RuleId = "chk_discount_le_price";
}

/// A product together with the related rows its cross-entity rules read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductState {
    /// The product as staged
    pub product: product::Model,
    /// Stock on hand, 0 when the product owns no stock record
    pub stock_quantity: i32,
    /// Absolute reductions of every linked promotion event
    pub absolute_reductions: Vec<i32>,
}

impl ProductState {
    /// Reads the stock record and linked promotion events of `product`.
    pub async fn load<C: ConnectionTrait>(db: &C, product: product::Model) -> Result<Self> {
        let stock: Option<stock_management::Model> =
            product.find_related(StockManagement).one(db).await?;
        let events: Vec<promotion_event::Model> =
            product.find_related(PromotionEvent).all(db).await?;

        Ok(Self {
            stock_quantity: stock.map_or(0, |s| s.quantity),
            absolute_reductions: events
                .into_iter()
                .filter(|e| e.reduction_unit == promotion_event::UNIT_AMOUNT)
                .map(|e| e.price_reduction)
                .collect(),
            product,
        })
    }
}

/// Rule sets for every entity type plus the deferred product rules.
#[derive(Debug)]
pub struct ConstraintSet {
    /// Category rules
    pub category: RuleSet<category::Model>,
    /// Product row rules
    pub product: RuleSet<product::Model>,
    /// Promotion event rules
    pub promotion_event: RuleSet<promotion_event::Model>,
    /// Product/promotion link rules
    pub product_promotion_event: RuleSet<product_promotion_event::Model>,
    /// Stock rules
    pub stock_management: RuleSet<stock_management::Model>,
    /// User rules
    pub user: RuleSet<user::Model>,
    /// Order rules
    pub order: RuleSet<order::Model>,
    /// Order line rules
    pub order_product: RuleSet<order_product::Model>,
    /// Product rules over related rows, checked at commit
    pub product_state: RuleSet<ProductState>,
}

impl ConstraintSet {
    /// The canonical inventory rules.
    pub fn standard() -> Result<Self> {
        let slug = compile(SLUG_PATTERN)?;
        let username = compile(USERNAME_PATTERN)?;
        let email = compile(EMAIL_PATTERN)?;

        Ok(Self {
            category: RuleSet::new()
                .with(not_empty(ids::NAME_NOT_EMPTY, |c: &category::Model| c.name.as_str()))
                .with(not_blank(ids::NAME_NOT_WHITESPACE, |c: &category::Model| c.name.as_str()))
                .with(max_chars(ids::NAME_LENGTH, |c: &category::Model| c.name.as_str(), 50))
                .with(not_empty(ids::SLUG_NOT_EMPTY, |c: &category::Model| c.slug.as_str()))
                .with(matches(ids::SLUG_FORMAT, slug.clone(), |c: &category::Model| c.slug.as_str()))
                .with(max_chars(ids::SLUG_LENGTH, |c: &category::Model| c.slug.as_str(), 55))
                .with(at_least(ids::LEVEL_NON_NEGATIVE, |c: &category::Model| c.level, 0))
                .with(Rule::new(
                    ids::HIERARCHY_ACYCLIC,
                    RuleKind::CrossField,
                    |c: &category::Model| c.parent_id != Some(c.id) || c.id == 0,
                )),
            product: RuleSet::new()
                .with(not_empty(ids::NAME_NOT_EMPTY, |p: &product::Model| p.name.as_str()))
                .with(not_blank(ids::NAME_NOT_WHITESPACE, |p: &product::Model| p.name.as_str()))
                .with(max_chars(ids::NAME_LENGTH, |p: &product::Model| p.name.as_str(), 50))
                .with(not_empty(ids::SLUG_NOT_EMPTY, |p: &product::Model| p.slug.as_str()))
                .with(matches(ids::SLUG_FORMAT, slug, |p: &product::Model| p.slug.as_str()))
                .with(max_chars(ids::SLUG_LENGTH, |p: &product::Model| p.slug.as_str(), 55))
                .with(at_least(ids::PRICE_POSITIVE, |p: &product::Model| p.price, Decimal::ZERO))
                .with(Rule::new(
                    ids::PRICE_PRECISION,
                    RuleKind::NumericRange,
                    |p: &product::Model| {
                        p.price.round_dp(2) == p.price
                            && p.price.abs() < Decimal::from(MAX_PRICE_UNITS)
                    },
                ))
                .with(not_after(
                    ids::TIMESTAMP_ORDER,
                    |p: &product::Model| p.created_at,
                    |p: &product::Model| p.updated_at,
                )),
            promotion_event: RuleSet::new()
                .with(not_empty(ids::NAME_NOT_EMPTY, |e: &promotion_event::Model| e.name.as_str()))
                .with(not_blank(ids::NAME_NOT_WHITESPACE, |e: &promotion_event::Model| e.name.as_str()))
                .with(max_chars(ids::NAME_LENGTH, |e: &promotion_event::Model| e.name.as_str(), 50))
                .with(before(
                    ids::EVENT_DATES,
                    |e: &promotion_event::Model| e.start_date,
                    |e: &promotion_event::Model| e.end_date,
                ))
                .with(Rule::new(
                    ids::EVENT_DURATION,
                    RuleKind::Temporal,
                    |e: &promotion_event::Model| {
                        event_days(e.start_date, e.end_date) <= MAX_EVENT_DAYS
                    },
                ))
                .with(one_of(
                    ids::REDUCTION_UNIT_ENUM,
                    |e: &promotion_event::Model| e.reduction_unit.as_str(),
                    &[promotion_event::UNIT_PERCENT, promotion_event::UNIT_AMOUNT],
                ))
                .with(at_least(
                    ids::REDUCTION_NON_NEGATIVE,
                    |e: &promotion_event::Model| e.price_reduction,
                    0,
                ))
                .with(
                    within(ids::DISCOUNT_RANGE, |e: &promotion_event::Model| e.price_reduction, 0, 100)
                        .when(|e: &promotion_event::Model| e.reduction_unit == promotion_event::UNIT_PERCENT),
                ),
            product_promotion_event: RuleSet::new(),
            stock_management: RuleSet::new().with(at_least(
                ids::QUANTITY_VALID,
                |s: &stock_management::Model| s.quantity,
                0,
            )),
            user: RuleSet::new()
                .with(not_empty(ids::USERNAME_NOT_EMPTY, |u: &user::Model| u.username.as_str()))
                .with(matches(ids::USERNAME_FORMAT, username, |u: &user::Model| u.username.as_str()))
                .with(max_chars(ids::USERNAME_LENGTH, |u: &user::Model| u.username.as_str(), 50))
                .with(not_empty(ids::EMAIL_NOT_EMPTY, |u: &user::Model| u.email.as_str()))
                .with(matches(ids::EMAIL_FORMAT, email, |u: &user::Model| u.email.as_str()))
                .with(max_chars(ids::EMAIL_LENGTH, |u: &user::Model| u.email.as_str(), 255))
                .with(not_empty(ids::PASSWORD_NOT_EMPTY, |u: &user::Model| u.password.as_str()))
                .with(max_chars(ids::PASSWORD_LENGTH, |u: &user::Model| u.password.as_str(), 100)),
            order: RuleSet::new()
                .with(not_after(
                    ids::TIMESTAMP_ORDER,
                    |o: &order::Model| o.created_at,
                    |o: &order::Model| o.updated_at,
                ))
                .with(one_of(
                    ids::STATUS_ENUM,
                    |o: &order::Model| o.status.as_str(),
                    &[order::STATUS_PENDING, order::STATUS_PAID, order::STATUS_CANCELED],
                )),
            order_product: RuleSet::new().with(at_least(
                ids::QUANTITY_VALID,
                |l: &order_product::Model| l.quantity,
                0,
            )),
            product_state: RuleSet::new()
                .with(implies(
                    ids::ACTIVE_NEEDS_STOCK,
                    |s: &ProductState| s.product.is_active,
                    |s: &ProductState| s.stock_quantity > 0,
                ))
                .with(implies(
                    ids::DIGITAL_NO_STOCK,
                    |s: &ProductState| s.product.is_digital,
                    |s: &ProductState| s.stock_quantity == 0,
                ))
                .with(Rule::new(
                    ids::DISCOUNT_LE_PRICE,
                    RuleKind::CrossField,
                    |s: &ProductState| {
                        s.absolute_reductions
                            .iter()
                            .all(|r| Decimal::from(*r) <= s.product.price)
                    },
                )),
        })
    }

    /// Checks every row rule of `record`'s entity type.
    pub fn validate<M: Record>(&self, record: &M) -> Result<()> {
        reject(M::ENTITY, M::rules(self).violations(record))
    }

    /// Checks the deferred rules of one product.
    pub fn validate_product_state(&self, state: &ProductState) -> Result<()> {
        reject(product::Model::ENTITY, self.product_state.violations(state))
    }
}

fn reject(entity: &'static str, violations: Vec<RuleId>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { entity, violations })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Schema {
        message: format!("invalid rule pattern {pattern}: {e}"),
    })
}

fn event_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::NaiveDateTime;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn at(hour: u32) -> NaiveDateTime {
        date(1, 1).and_hms_opt(hour, 0, 0).unwrap()
    }

    fn rules() -> ConstraintSet {
        ConstraintSet::standard().unwrap()
    }

    fn violations<M: Record>(record: &M) -> Vec<&'static str> {
        M::rules(&rules()).violations(record)
    }

    fn shoe() -> product::Model {
        product::Model::new(1, "Red Shoe", "red-shoe", Decimal::new(1999, 2))
    }

    #[test]
    fn test_valid_records_pass() {
        assert!(violations(&category::Model::new("shoes", "shoes")).is_empty());
        assert!(violations(&shoe()).is_empty());
        assert!(violations(&promotion_event::Model::new("Summer Sale", date(6, 1), date(6, 30), 15)).is_empty());
        assert!(violations(&stock_management::Model::new(1, 0)).is_empty());
        assert!(violations(&user::Model::new("alice_01", "alice@example.com", "hash")).is_empty());
        assert!(violations(&order::Model::new(1)).is_empty());
        assert!(violations(&order_product::Model::new(1, 1, 0)).is_empty());
    }

    #[test]
    fn test_slug_rules() {
        for bad in ["Red-Shoe", "red--shoe", "-red", "red-", "red shoe", "red_shoe"] {
            let mut product = shoe();
            product.slug = bad.to_string();
            assert_eq!(violations(&product), vec![ids::SLUG_FORMAT], "{bad}");
        }

        let mut empty = shoe();
        empty.slug = String::new();
        assert_eq!(violations(&empty), vec![ids::SLUG_NOT_EMPTY, ids::SLUG_FORMAT]);

        let mut digits = shoe();
        digits.slug = "size-42".to_string();
        assert!(violations(&digits).is_empty());
    }

    #[test]
    fn test_union_of_violations_reported() {
        let mut product = shoe();
        product.name = "   ".to_string();
        product.price = Decimal::new(-1, 0);
        product.created_at = at(10);
        product.updated_at = at(9);

        assert_eq!(
            violations(&product),
            vec![ids::NAME_NOT_WHITESPACE, ids::PRICE_POSITIVE, ids::TIMESTAMP_ORDER]
        );
    }

    #[test]
    fn test_price_precision() {
        let mut product = shoe();
        product.price = Decimal::new(19_999, 3);
        assert_eq!(violations(&product), vec![ids::PRICE_PRECISION]);

        product.price = Decimal::new(1_000_000_000, 1);
        assert_eq!(violations(&product), vec![ids::PRICE_PRECISION]);

        product.price = Decimal::new(1_500, 2);
        assert!(violations(&product).is_empty());
    }

    #[test]
    fn test_event_temporal_rules() {
        let backwards = promotion_event::Model::new("Sale", date(6, 10), date(6, 1), 10);
        assert_eq!(violations(&backwards), vec![ids::EVENT_DATES]);

        let same_day = promotion_event::Model::new("Sale", date(6, 1), date(6, 1), 10);
        assert_eq!(violations(&same_day), vec![ids::EVENT_DATES]);

        let thirty = promotion_event::Model::new("Sale", date(6, 1), date(7, 1), 10);
        assert!(violations(&thirty).is_empty());

        let long = promotion_event::Model::new("Sale", date(6, 1), date(7, 2), 10);
        assert_eq!(violations(&long), vec![ids::EVENT_DURATION]);
    }

    #[test]
    fn test_reduction_rules_depend_on_unit() {
        let over = promotion_event::Model::new("Sale", date(6, 1), date(6, 2), 101);
        assert_eq!(violations(&over), vec![ids::DISCOUNT_RANGE]);

        let absolute = promotion_event::Model::new("Sale", date(6, 1), date(6, 2), 0).absolute(250);
        assert!(violations(&absolute).is_empty());

        let negative = promotion_event::Model::new("Sale", date(6, 1), date(6, 2), 0).absolute(-5);
        assert_eq!(violations(&negative), vec![ids::REDUCTION_NON_NEGATIVE]);

        let mut unknown = promotion_event::Model::new("Sale", date(6, 1), date(6, 2), 5);
        unknown.reduction_unit = "bogof".to_string();
        assert_eq!(violations(&unknown), vec![ids::REDUCTION_UNIT_ENUM]);
    }

    #[test]
    fn test_user_rules() {
        let bad = user::Model::new("alice smith", "not-an-email", "");
        assert_eq!(
            violations(&bad),
            vec![ids::USERNAME_FORMAT, ids::EMAIL_FORMAT, ids::PASSWORD_NOT_EMPTY]
        );

        let long = user::Model::new("a".repeat(51), "a@example.com", "hash");
        assert_eq!(violations(&long), vec![ids::USERNAME_LENGTH]);
    }

    #[test]
    fn test_order_status_enum() {
        let mut order = order::Model::new(1);
        order.status = "shipped".to_string();
        assert_eq!(violations(&order), vec![ids::STATUS_ENUM]);
    }

    #[test]
    fn test_negative_quantities() {
        assert_eq!(violations(&stock_management::Model::new(1, -1)), vec![ids::QUANTITY_VALID]);
        assert_eq!(violations(&order_product::Model::new(1, 1, -1)), vec![ids::QUANTITY_VALID]);
    }

    #[test]
    fn test_category_cannot_parent_itself() {
        let mut category = category::Model::new("shoes", "shoes");
        category.id = 7;
        category.parent_id = Some(7);
        assert_eq!(violations(&category), vec![ids::HIERARCHY_ACYCLIC]);
    }

    #[test]
    fn test_product_state_rules() {
        let rules = rules();
        let state = |active: bool, digital: bool, stock: i32| {
            let mut product = shoe();
            product.is_active = active;
            product.is_digital = digital;
            ProductState {
                product,
                stock_quantity: stock,
                absolute_reductions: Vec::new(),
            }
        };

        assert_eq!(
            rules.product_state.violations(&state(true, false, 0)),
            vec![ids::ACTIVE_NEEDS_STOCK]
        );
        assert!(rules.product_state.violations(&state(true, false, 1)).is_empty());
        assert_eq!(
            rules.product_state.violations(&state(false, true, 3)),
            vec![ids::DIGITAL_NO_STOCK]
        );
        // An active digital product can never satisfy both stock rules.
        assert_eq!(
            rules.product_state.violations(&state(true, true, 0)),
            vec![ids::ACTIVE_NEEDS_STOCK]
        );
        assert_eq!(
            rules.product_state.violations(&state(true, true, 2)),
            vec![ids::DIGITAL_NO_STOCK]
        );
        assert!(rules.product_state.violations(&state(false, true, 0)).is_empty());

        let mut discounted = state(false, false, 0);
        discounted.absolute_reductions = vec![5, 25];
        assert_eq!(
            rules.product_state.violations(&discounted),
            vec![ids::DISCOUNT_LE_PRICE]
        );
    }

    #[test]
    fn test_validate_wraps_violations() {
        let err = rules().validate(&stock_management::Model::new(1, -3)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation { entity: "StockManagement", ref violations } if violations == &vec![ids::QUANTITY_VALID]
        ));
    }
}

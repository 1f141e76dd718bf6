//! Mutation lifecycle hooks.
//!
//! Hooks are plain functions run by the unit of work on every insert and update, in the
//! order they were declared, immediately before validation. They only transform fields;
//! they never reject a write. Each hook is idempotent for a given [`HookContext`], so
//! running a chain twice leaves the record as running it once does.

use chrono::NaiveDateTime;
use std::fmt;

use crate::entities::{
    category, order, order_product, product, product_promotion_event, promotion_event,
    stock_management, user,
};

/// Kind of write a hook runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// New row
    Insert,
    /// Existing row
    Update,
}

/// Inputs a hook may read besides the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookContext {
    /// Kind of write
    pub mutation: Mutation,
    /// Clock reading taken once per write
    pub now: NaiveDateTime,
}

impl HookContext {
    /// Context for an insert at `now`.
    #[must_use]
    pub const fn insert(now: NaiveDateTime) -> Self {
        Self {
            mutation: Mutation::Insert,
            now,
        }
    }

    /// Context for an update at `now`.
    #[must_use]
    pub const fn update(now: NaiveDateTime) -> Self {
        Self {
            mutation: Mutation::Update,
            now,
        }
    }
}

/// Signature of a hook body.
pub type HookFn<M> = fn(&mut M, &HookContext);

/// A named field transform.
pub struct Hook<M> {
    name: &'static str,
    run: HookFn<M>,
}

impl<M> Hook<M> {
    /// Hook name, used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Ordered hooks for one entity type.
pub struct HookChain<M> {
    hooks: Vec<Hook<M>>,
}

impl<M> HookChain<M> {
    /// Chain with no hooks.
    #[must_use]
    pub const fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Appends a hook; it runs after every hook declared before it.
    #[must_use]
    pub fn then(mut self, name: &'static str, run: HookFn<M>) -> Self {
        self.hooks.push(Hook { name, run });
        self
    }

    /// Runs every hook once, in declaration order.
    pub fn apply(&self, record: &mut M, context: &HookContext) {
        for hook in &self.hooks {
            (hook.run)(record, context);
        }
    }

    /// Hook names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hooks.iter().map(Hook::name)
    }
}

impl<M> Default for HookChain<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for HookChain<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Hook chains for every entity type.
#[derive(Debug, Default)]
pub struct LifecycleHooks {
    /// Category hooks
    pub category: HookChain<category::Model>,
    /// Product hooks
    pub product: HookChain<product::Model>,
    /// Promotion event hooks
    pub promotion_event: HookChain<promotion_event::Model>,
    /// Product/promotion link hooks
    pub product_promotion_event: HookChain<product_promotion_event::Model>,
    /// Stock hooks
    pub stock_management: HookChain<stock_management::Model>,
    /// User hooks
    pub user: HookChain<user::Model>,
    /// Order hooks
    pub order: HookChain<order::Model>,
    /// Order line hooks
    pub order_product: HookChain<order_product::Model>,
}

impl LifecycleHooks {
    /// The inventory normalization hooks.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            category: HookChain::<category::Model>::new()
                .then("lowercase_name", |c, _| lowercase(&mut c.name))
                .then("lowercase_slug", |c, _| lowercase(&mut c.slug)),
            product: HookChain::<product::Model>::new()
                .then("trim_name", |p, _| trim(&mut p.name))
                .then("lowercase_slug", |p, _| lowercase(&mut p.slug))
                .then("stamp_timestamps", |p, ctx| {
                    stamp(&mut p.created_at, &mut p.updated_at, ctx);
                }),
            promotion_event: HookChain::<promotion_event::Model>::new()
                .then("trim_name", |e, _| trim(&mut e.name))
                .then("lowercase_reduction_unit", |e, _| lowercase(&mut e.reduction_unit)),
            product_promotion_event: HookChain::<product_promotion_event::Model>::new(),
            stock_management: HookChain::<stock_management::Model>::new().then(
                "stamp_last_checked",
                |s, ctx| s.last_checked_at = ctx.now.and_utc(),
            ),
            user: HookChain::<user::Model>::new()
                .then("trim_username", |u, _| trim(&mut u.username))
                .then("lowercase_email", |u, _| lowercase(&mut u.email)),
            order: HookChain::<order::Model>::new()
                .then("lowercase_status", |o, _| lowercase(&mut o.status))
                .then("stamp_timestamps", |o, ctx| {
                    stamp(&mut o.created_at, &mut o.updated_at, ctx);
                }),
            order_product: HookChain::<order_product::Model>::new(),
        }
    }
}

fn lowercase(value: &mut String) {
    if value.chars().any(char::is_uppercase) {
        *value = value.to_lowercase();
    }
}

fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn stamp(created_at: &mut NaiveDateTime, updated_at: &mut NaiveDateTime, context: &HookContext) {
    if context.mutation == Mutation::Insert {
        *created_at = context.now;
    }
    *updated_at = context.now;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::NaiveDate;
    use sea_orm::prelude::Decimal;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_category_name_and_slug_lowercased() {
        let hooks = LifecycleHooks::standard();
        let mut category = category::Model::new("Running Shoes", "Running-Shoes");

        hooks.category.apply(&mut category, &HookContext::insert(at(9)));

        assert_eq!(category.name, "running shoes");
        assert_eq!(category.slug, "running-shoes");
    }

    #[test]
    fn test_lowercase_slug_unchanged() {
        let hooks = LifecycleHooks::standard();
        let mut category = category::Model::new("shoes", "red-shoe");
        let before = category.clone();

        hooks.category.apply(&mut category, &HookContext::update(at(9)));

        assert_eq!(category, before);
    }

    #[test]
    fn test_normalizing_twice_equals_once() {
        let hooks = LifecycleHooks::standard();
        let context = HookContext::insert(at(9));
        let mut once = product::Model::new(1, "  Red Shoe ", "RED-Shoe", Decimal::new(1999, 2));
        hooks.product.apply(&mut once, &context);
        let mut twice = once.clone();
        hooks.product.apply(&mut twice, &context);

        assert_eq!(once, twice);
        assert_eq!(once.name, "Red Shoe");
        assert_eq!(once.slug, "red-shoe");
    }

    #[test]
    fn test_timestamps_stamped_per_mutation() {
        let hooks = LifecycleHooks::standard();
        let mut order = order::Model::new(1);

        hooks.order.apply(&mut order, &HookContext::insert(at(9)));
        assert_eq!(order.created_at, at(9));
        assert_eq!(order.updated_at, at(9));

        hooks.order.apply(&mut order, &HookContext::update(at(11)));
        assert_eq!(order.created_at, at(9));
        assert_eq!(order.updated_at, at(11));
    }

    #[test]
    fn test_hooks_run_in_declared_order() {
        let chain = HookChain::<String>::new()
            .then("append_a", |s, _| s.push('a'))
            .then("append_b", |s, _| s.push('b'));
        let mut value = String::new();

        chain.apply(&mut value, &HookContext::insert(at(9)));

        assert_eq!(value, "ab");
        assert_eq!(chain.names().collect::<Vec<_>>(), vec!["append_a", "append_b"]);
    }

    #[test]
    fn test_email_lowercased_username_kept() {
        let hooks = LifecycleHooks::standard();
        let mut user = user::Model::new(" Alice_01 ", "Alice@Example.COM", "hash");

        hooks.user.apply(&mut user, &HookContext::insert(at(9)));

        assert_eq!(user.username, "Alice_01");
        assert_eq!(user.email, "alice@example.com");
    }
}

//! Declarative rule primitives.
//!
//! A [`Rule`] is a named, side-effect-free predicate over one entity instance. Rules are
//! grouped into a [`RuleSet`], which evaluates every rule and reports the identifiers of
//! all that failed, in declaration order. The constructor functions below cover the rule
//! categories used by the inventory constraint set: field shape, numeric range,
//! cross-field, temporal and enum membership.

use regex::Regex;
use std::fmt;

/// Identifier of a business rule, e.g. `"chk_slug_format_seo"`.
pub type RuleId = &'static str;

/// Category a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Non-empty, trimmed, length and pattern checks on strings
    FieldShape,
    /// Bounds on numeric fields
    NumericRange,
    /// Boolean relationships between fields
    CrossField,
    /// Ordering and duration of dates and timestamps
    Temporal,
    /// Membership in a fixed literal set
    EnumMembership,
}

type Predicate<M> = Box<dyn Fn(&M) -> bool + Send + Sync>;

/// A named predicate that must hold for every written instance of `M`.
pub struct Rule<M> {
    id: RuleId,
    kind: RuleKind,
    check: Predicate<M>,
}

impl<M> Rule<M> {
    /// Builds a rule from an arbitrary predicate.
    pub fn new(id: RuleId, kind: RuleKind, check: impl Fn(&M) -> bool + Send + Sync + 'static) -> Self {
        Self {
            id,
            kind,
            check: Box::new(check),
        }
    }

    /// Rule identifier
    #[must_use]
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Rule category
    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Restricts the rule to instances where `premise` holds; it passes on all others.
    #[must_use]
    pub fn when(self, premise: fn(&M) -> bool) -> Self
    where
        M: 'static,
    {
        let check = self.check;
        Self {
            check: Box::new(move |m| !premise(m) || check(m)),
            ..self
        }
    }

    /// Whether the rule holds for `record`.
    pub fn holds(&self, record: &M) -> bool {
        (self.check)(record)
    }
}

impl<M> fmt::Debug for Rule<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of rules for one entity type.
pub struct RuleSet<M> {
    rules: Vec<Rule<M>>,
}

impl<M> RuleSet<M> {
    /// Empty rule set; every instance is valid.
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule.
    #[must_use]
    pub fn with(mut self, rule: Rule<M>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluates every rule and returns the identifiers of those that failed.
    pub fn violations(&self, record: &M) -> Vec<RuleId> {
        self.rules
            .iter()
            .filter(|rule| !rule.holds(record))
            .map(Rule::id)
            .collect()
    }

    /// Identifiers of all rules in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.iter().map(Rule::id)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule<M>] {
        &self.rules
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the set holds no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<M> Default for RuleSet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for RuleSet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// The string field is not the empty string.
pub fn not_empty<M: 'static>(id: RuleId, field: fn(&M) -> &str) -> Rule<M> {
    Rule::new(id, RuleKind::FieldShape, move |m| !field(m).is_empty())
}

/// The string field holds something other than whitespace.
pub fn not_blank<M: 'static>(id: RuleId, field: fn(&M) -> &str) -> Rule<M> {
    Rule::new(id, RuleKind::FieldShape, move |m| !field(m).trim().is_empty())
}

/// The string field is at most `max` characters long.
pub fn max_chars<M: 'static>(id: RuleId, field: fn(&M) -> &str, max: usize) -> Rule<M> {
    Rule::new(id, RuleKind::FieldShape, move |m| field(m).chars().count() <= max)
}

/// The string field matches `pattern`.
pub fn matches<M: 'static>(id: RuleId, pattern: Regex, field: fn(&M) -> &str) -> Rule<M> {
    Rule::new(id, RuleKind::FieldShape, move |m| pattern.is_match(field(m)))
}

/// The numeric field is at least `min`.
pub fn at_least<M: 'static, T>(id: RuleId, field: fn(&M) -> T, min: T) -> Rule<M>
where
    T: PartialOrd + Send + Sync + 'static,
{
    Rule::new(id, RuleKind::NumericRange, move |m| field(m) >= min)
}

/// The numeric field lies in `[low, high]`.
pub fn within<M: 'static, T>(id: RuleId, field: fn(&M) -> T, low: T, high: T) -> Rule<M>
where
    T: PartialOrd + Send + Sync + 'static,
{
    Rule::new(id, RuleKind::NumericRange, move |m| {
        let value = field(m);
        value >= low && value <= high
    })
}

/// The string field is one of `allowed`.
pub fn one_of<M: 'static>(
    id: RuleId,
    field: fn(&M) -> &str,
    allowed: &'static [&'static str],
) -> Rule<M> {
    Rule::new(id, RuleKind::EnumMembership, move |m| {
        let value = field(m);
        allowed.iter().any(|candidate| *candidate == value)
    })
}

/// `earlier` comes strictly before `later`.
pub fn before<M: 'static, T>(id: RuleId, earlier: fn(&M) -> T, later: fn(&M) -> T) -> Rule<M>
where
    T: PartialOrd + 'static,
{
    Rule::new(id, RuleKind::Temporal, move |m| earlier(m) < later(m))
}

/// `earlier` is not after `later`.
pub fn not_after<M: 'static, T>(id: RuleId, earlier: fn(&M) -> T, later: fn(&M) -> T) -> Rule<M>
where
    T: PartialOrd + 'static,
{
    Rule::new(id, RuleKind::Temporal, move |m| earlier(m) <= later(m))
}

/// Whenever `premise` holds, `conclusion` holds too.
pub fn implies<M: 'static>(id: RuleId, premise: fn(&M) -> bool, conclusion: fn(&M) -> bool) -> Rule<M> {
    Rule::new(id, RuleKind::CrossField, move |m| !premise(m) || conclusion(m))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[derive(Debug)]
    struct Item {
        name: String,
        code: String,
        amount: i32,
        opens: u32,
        closes: u32,
        featured: bool,
        stock: i32,
        status: String,
    }

    fn item() -> Item {
        Item {
            name: "Widget".to_string(),
            code: "abc-1".to_string(),
            amount: 5,
            opens: 1,
            closes: 2,
            featured: true,
            stock: 3,
            status: "paid".to_string(),
        }
    }

    fn rules() -> RuleSet<Item> {
        RuleSet::new()
            .with(not_empty("chk_name_not_empty", |i: &Item| i.name.as_str()))
            .with(not_blank("chk_name_not_whitespace", |i: &Item| i.name.as_str()))
            .with(max_chars("chk_name_length", |i: &Item| i.name.as_str(), 10))
            .with(matches(
                "chk_code_format",
                Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap(),
                |i: &Item| i.code.as_str(),
            ))
            .with(at_least("chk_amount_positive", |i: &Item| i.amount, 0))
            .with(within("chk_amount_range", |i: &Item| i.amount, 0, 100))
            .with(before("chk_window", |i: &Item| i.opens, |i: &Item| i.closes))
            .with(implies(
                "chk_featured_requires_stock",
                |i: &Item| i.featured,
                |i: &Item| i.stock > 0,
            ))
            .with(one_of(
                "chk_status_enum",
                |i: &Item| i.status.as_str(),
                &["pending", "paid", "canceled"],
            ))
    }

    #[test]
    fn test_valid_item_has_no_violations() {
        assert!(rules().violations(&item()).is_empty());
    }

    #[test]
    fn test_all_failures_reported_in_declaration_order() {
        let mut bad = item();
        bad.name = "   ".to_string();
        bad.amount = 101;
        bad.status = "shipped".to_string();

        assert_eq!(
            rules().violations(&bad),
            vec!["chk_name_not_whitespace", "chk_amount_range", "chk_status_enum"]
        );
    }

    #[test]
    fn test_order_of_evaluation_does_not_change_outcome() {
        let mut bad = item();
        bad.code = "-abc".to_string();
        bad.featured = true;
        bad.stock = 0;

        let forward = rules();
        let mut reversed = RuleSet::new();
        for rule in rules().rules.into_iter().rev() {
            reversed = reversed.with(rule);
        }

        let mut a = forward.violations(&bad);
        let mut b = reversed.violations(&bad);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_eq!(a, vec!["chk_code_format", "chk_featured_requires_stock"]);
    }

    #[test]
    fn test_temporal_rules() {
        let strict = before("chk_window", |i: &Item| i.opens, |i: &Item| i.closes);
        let loose = not_after("chk_window_loose", |i: &Item| i.opens, |i: &Item| i.closes);
        let mut same = item();
        same.closes = same.opens;

        assert!(!strict.holds(&same));
        assert!(loose.holds(&same));
        assert_eq!(strict.kind(), RuleKind::Temporal);
    }

    #[test]
    fn test_implication_is_vacuous_when_premise_false() {
        let rule = implies(
            "chk_featured_requires_stock",
            |i: &Item| i.featured,
            |i: &Item| i.stock > 0,
        );
        let mut plain = item();
        plain.featured = false;
        plain.stock = 0;

        assert!(rule.holds(&plain));
        assert_eq!(rule.kind(), RuleKind::CrossField);
    }

    #[test]
    fn test_max_chars_counts_characters_not_bytes() {
        let rule = max_chars("chk_name_length", |i: &Item| i.name.as_str(), 3);
        let mut accented = item();
        accented.name = "été".to_string();
        assert!(rule.holds(&accented));
    }

    #[test]
    fn test_guarded_rule_only_applies_under_premise() {
        let rule = within("chk_featured_stock_cap", |i: &Item| i.stock, 0, 50)
            .when(|i: &Item| i.featured);
        let mut bulk = item();
        bulk.stock = 80;
        assert!(!rule.holds(&bulk));
        assert_eq!(rule.kind(), RuleKind::NumericRange);

        bulk.featured = false;
        assert!(rule.holds(&bulk));
    }
}

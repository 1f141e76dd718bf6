//! Schema registry - Authoritative description of entities, fields and relations.
//!
//! Relations are declared explicitly in a table keyed by the entity that holds the
//! foreign key (the *owner*). The cardinality tag decides which uniqueness the owner
//! must carry:
//!
//! - one-to-many: one link, no extra uniqueness;
//! - one-to-one: one link plus a unique constraint on exactly that field;
//! - many-to-many: the owner is a junction entity with two links plus a composite unique
//!   constraint over both fields.
//!
//! Every relation deletes restrictively: a referenced row cannot be deleted while any
//! owner row still points at it. Nothing cascades. [`SchemaRegistry::new`] checks all of
//! this once at startup and refuses a schema that does not resolve.

use crate::errors::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Synthetic 64-bit key or reference
    BigInteger,
    /// 32-bit integer
    Integer,
    /// 16-bit integer
    SmallInteger,
    /// Boolean flag
    Boolean,
    /// Bounded string
    Varchar(u32),
    /// Unbounded string
    Text,
    /// Fixed-point number
    Decimal {
        /// Total significant digits
        precision: u32,
        /// Digits after the decimal point
        scale: u32,
    },
    /// Calendar date
    Date,
    /// Timestamp without time zone
    DateTime,
    /// Timestamp with time zone
    TimestampTz,
}

/// Value a field takes when the caller does not provide one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// String literal
    Text(&'static str),
    /// Current time at write
    Now,
}

/// One column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Column name
    pub name: &'static str,
    /// Storage type
    pub kind: FieldKind,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Default applied on insert
    pub default: Option<FieldDefault>,
}

impl FieldDef {
    /// Non-nullable field without default.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            default: None,
        }
    }

    /// Nullable field without default.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
            default: None,
        }
    }

    /// Sets the insert default.
    #[must_use]
    pub const fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// Named uniqueness over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueDef {
    /// Constraint name
    pub name: &'static str,
    /// Fields that are unique together
    pub fields: Vec<&'static str>,
}

impl UniqueDef {
    /// True when this constraint covers exactly `fields`, in any order.
    #[must_use]
    pub fn covers_exactly(&self, fields: &[&str]) -> bool {
        self.fields.len() == fields.len() && fields.iter().all(|f| self.fields.contains(f))
    }
}

/// An entity type and its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    /// Entity name (e.g. `"Product"`)
    pub name: &'static str,
    /// Table name (e.g. `"product"`)
    pub table: &'static str,
    /// Fields in declaration order, starting with the synthetic `id`
    pub fields: Vec<FieldDef>,
    /// Unique constraints
    pub uniques: Vec<UniqueDef>,
}

impl EntityDef {
    /// New entity with its synthetic `id` key already declared.
    #[must_use]
    pub fn new(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            table,
            fields: vec![FieldDef::required(PRIMARY_KEY, FieldKind::BigInteger)],
            uniques: Vec::new(),
        }
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares a unique constraint.
    #[must_use]
    pub fn unique(mut self, name: &'static str, fields: &[&'static str]) -> Self {
        self.uniques.push(UniqueDef {
            name,
            fields: fields.to_vec(),
        });
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Name of the synthetic primary key every entity carries.
pub const PRIMARY_KEY: &str = "id";

/// Cardinality tag of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Foreign key on the "many" side.
    OneToMany,
    /// Foreign key on the owned side, made single-valued by a unique constraint.
    OneToOne,
    /// Realized by a junction entity with a composite unique constraint.
    ManyToMany,
}

/// One foreign key held by a relation owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Foreign key field on the owner
    pub field: &'static str,
    /// Referenced entity (by its `id`)
    pub target: &'static str,
}

/// A relation between entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Relation name (unique within the schema)
    pub name: &'static str,
    /// Cardinality tag
    pub cardinality: Cardinality,
    /// Entity holding the foreign key(s); the junction for many-to-many
    pub owner: &'static str,
    /// Foreign keys held by the owner
    pub links: Vec<Link>,
}

impl RelationDef {
    /// `owner.field` references one `target`; a target has many owners.
    #[must_use]
    pub fn one_to_many(
        name: &'static str,
        owner: &'static str,
        field: &'static str,
        target: &'static str,
    ) -> Self {
        Self {
            name,
            cardinality: Cardinality::OneToMany,
            owner,
            links: vec![Link { field, target }],
        }
    }

    /// `owner.field` references one `target`; a target has at most one owner.
    #[must_use]
    pub fn one_to_one(
        name: &'static str,
        owner: &'static str,
        field: &'static str,
        target: &'static str,
    ) -> Self {
        Self {
            name,
            cardinality: Cardinality::OneToOne,
            owner,
            links: vec![Link { field, target }],
        }
    }

    /// `junction` links `left` and `right` participants.
    #[must_use]
    pub fn many_to_many(
        name: &'static str,
        junction: &'static str,
        left: (&'static str, &'static str),
        right: (&'static str, &'static str),
    ) -> Self {
        Self {
            name,
            cardinality: Cardinality::ManyToMany,
            owner: junction,
            links: vec![
                Link {
                    field: left.0,
                    target: left.1,
                },
                Link {
                    field: right.0,
                    target: right.1,
                },
            ],
        }
    }

    /// True when the owner references its own entity (a hierarchy).
    #[must_use]
    pub fn is_self_referencing(&self) -> bool {
        self.links.iter().any(|link| link.target == self.owner)
    }

    fn link_fields(&self) -> Vec<&'static str> {
        self.links.iter().map(|link| link.field).collect()
    }
}

/// Resolved set of entities and relations.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entities: Vec<EntityDef>,
    relations: Vec<RelationDef>,
}

impl SchemaRegistry {
    /// Resolves a schema, checking that every relation is well formed for its
    /// cardinality and that the reference graph has a creation order.
    pub fn new(entities: Vec<EntityDef>, relations: Vec<RelationDef>) -> Result<Self> {
        let registry = Self {
            entities,
            relations,
        };
        registry.resolve()?;
        registry.creation_order()?;
        Ok(registry)
    }

    /// The inventory schema: catalog, promotions, stock, users and orders.
    pub fn inventory() -> Result<Self> {
        use FieldKind::{
            BigInteger, Boolean, Date, DateTime, Integer, SmallInteger, Text, TimestampTz, Varchar,
        };

        let entities = vec![
            EntityDef::new("Category", "category")
                .field(FieldDef::optional("parent_id", BigInteger))
                .field(FieldDef::required("name", Varchar(50)))
                .field(FieldDef::required("slug", Varchar(55)))
                .field(FieldDef::required("is_active", Boolean).default_to(FieldDefault::Bool(false)))
                .field(FieldDef::required("level", SmallInteger).default_to(FieldDefault::Int(0)))
                .unique("uq_category_name", &["name"])
                .unique("uq_category_slug", &["slug"]),
            EntityDef::new("PromotionEvent", "promotion_event")
                .field(FieldDef::required("name", Varchar(50)))
                .field(FieldDef::required("start_date", Date))
                .field(FieldDef::required("end_date", Date))
                .field(FieldDef::required("price_reduction", Integer))
                .field(
                    FieldDef::required("reduction_unit", Varchar(10))
                        .default_to(FieldDefault::Text("percent")),
                )
                .unique("uq_promotion_event_name", &["name"]),
            EntityDef::new("Product", "product")
                .field(FieldDef::required("category_id", BigInteger))
                .field(FieldDef::required("name", Varchar(50)))
                .field(FieldDef::required("slug", Varchar(55)))
                .field(FieldDef::required("description", Text))
                .field(FieldDef::required("is_digital", Boolean).default_to(FieldDefault::Bool(false)))
                .field(FieldDef::required("is_active", Boolean).default_to(FieldDefault::Bool(false)))
                .field(FieldDef::required(
                    "price",
                    FieldKind::Decimal {
                        precision: 10,
                        scale: 2,
                    },
                ))
                .field(FieldDef::required("created_at", DateTime).default_to(FieldDefault::Now))
                .field(FieldDef::required("updated_at", DateTime).default_to(FieldDefault::Now))
                .unique("uq_product_name", &["name"])
                .unique("uq_product_slug", &["slug"]),
            EntityDef::new("ProductPromotionEvent", "product_promotion_event")
                .field(FieldDef::required("product_id", BigInteger))
                .field(FieldDef::required("promotion_event_id", BigInteger))
                .unique("unique_product_event", &["product_id", "promotion_event_id"]),
            EntityDef::new("StockManagement", "stock_management")
                .field(FieldDef::required("product_id", BigInteger))
                .field(FieldDef::required("quantity", Integer).default_to(FieldDefault::Int(0)))
                .field(FieldDef::required("last_checked_at", TimestampTz).default_to(FieldDefault::Now))
                .unique("uq_stock_management_product_id", &["product_id"]),
            EntityDef::new("User", "user")
                .field(FieldDef::required("username", Varchar(50)))
                .field(FieldDef::required("email", Varchar(255)))
                .field(FieldDef::required("password", Varchar(100)))
                .unique("uq_user_username", &["username"])
                .unique("uq_user_email", &["email"]),
            EntityDef::new("Order", "order")
                .field(FieldDef::required("user_id", BigInteger))
                .field(FieldDef::required("status", Varchar(20)).default_to(FieldDefault::Text("pending")))
                .field(FieldDef::required("created_at", DateTime).default_to(FieldDefault::Now))
                .field(FieldDef::required("updated_at", DateTime).default_to(FieldDefault::Now)),
            EntityDef::new("OrderProduct", "order_product")
                .field(FieldDef::required("order_id", BigInteger))
                .field(FieldDef::required("product_id", BigInteger))
                .field(FieldDef::required("quantity", Integer))
                .unique("unique_order_product", &["order_id", "product_id"]),
        ];

        let relations = vec![
            RelationDef::one_to_many("category_parent", "Category", "parent_id", "Category"),
            RelationDef::one_to_many("product_category", "Product", "category_id", "Category"),
            RelationDef::one_to_one("product_stock", "StockManagement", "product_id", "Product"),
            RelationDef::many_to_many(
                "product_promotion_events",
                "ProductPromotionEvent",
                ("product_id", "Product"),
                ("promotion_event_id", "PromotionEvent"),
            ),
            RelationDef::one_to_many("user_orders", "Order", "user_id", "User"),
            RelationDef::many_to_many(
                "order_lines",
                "OrderProduct",
                ("order_id", "Order"),
                ("product_id", "Product"),
            ),
        ];

        Self::new(entities, relations)
    }

    /// Looks up an entity by name.
    pub fn entity(&self, name: &str) -> Result<&EntityDef> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::Schema {
                message: format!("unknown entity `{name}`"),
            })
    }

    /// All entities in declaration order.
    #[must_use]
    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    /// All relations in declaration order.
    #[must_use]
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Relations whose foreign keys live on `entity`.
    pub fn owned_by<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RelationDef> + 'a {
        self.relations.iter().filter(move |r| r.owner == entity)
    }

    /// Every foreign key that points at `entity`, with the relation it belongs to.
    pub fn referencing<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = (&'a RelationDef, &'a Link)> + 'a {
        self.relations.iter().flat_map(move |relation| {
            relation
                .links
                .iter()
                .filter(move |link| link.target == entity)
                .map(move |link| (relation, link))
        })
    }

    /// Entities ordered so that every referenced entity precedes the entities
    /// referencing it. Self references are ignored. Ties keep declaration order.
    pub fn creation_order(&self) -> Result<Vec<&EntityDef>> {
        let mut depends_on: BTreeMap<&str, BTreeSet<&str>> = self
            .entities
            .iter()
            .map(|e| (e.name, BTreeSet::new()))
            .collect();
        for relation in &self.relations {
            for link in &relation.links {
                if link.target != relation.owner {
                    depends_on
                        .entry(relation.owner)
                        .or_default()
                        .insert(link.target);
                }
            }
        }

        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.entities.len());
        while order.len() < self.entities.len() {
            let next = self.entities.iter().find(|e| {
                !placed.contains(e.name)
                    && depends_on
                        .get(e.name)
                        .is_none_or(|deps| deps.iter().all(|d| placed.contains(d)))
            });
            let Some(entity) = next else {
                return Err(Error::Schema {
                    message: "relations form a reference cycle; no creation order exists"
                        .to_string(),
                });
            };
            placed.insert(entity.name);
            order.push(entity);
        }
        Ok(order)
    }

    fn resolve(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.name) {
                return Err(schema_error(format!("entity `{}` declared twice", entity.name)));
            }
            for unique in &entity.uniques {
                if unique.fields.is_empty() {
                    return Err(schema_error(format!(
                        "unique constraint `{}` covers no fields",
                        unique.name
                    )));
                }
                for field in &unique.fields {
                    if entity.get_field(field).is_none() {
                        return Err(schema_error(format!(
                            "unique constraint `{}` names unknown field {}.{field}",
                            unique.name, entity.name
                        )));
                    }
                }
            }
        }

        let mut names = BTreeSet::new();
        for relation in &self.relations {
            if !names.insert(relation.name) {
                return Err(schema_error(format!(
                    "relation `{}` declared twice",
                    relation.name
                )));
            }
            self.resolve_relation(relation)?;
        }
        Ok(())
    }

    fn resolve_relation(&self, relation: &RelationDef) -> Result<()> {
        let owner = self.entity(relation.owner).map_err(|_| {
            schema_error(format!(
                "relation `{}` is owned by unknown entity `{}`",
                relation.name, relation.owner
            ))
        })?;

        for link in &relation.links {
            let Some(field) = owner.get_field(link.field) else {
                return Err(schema_error(format!(
                    "relation `{}` uses unknown field {}.{}",
                    relation.name, owner.name, link.field
                )));
            };
            if field.kind != FieldKind::BigInteger {
                return Err(schema_error(format!(
                    "relation `{}`: {}.{} must be a BigInteger reference",
                    relation.name, owner.name, link.field
                )));
            }
            let target = self.entity(link.target).map_err(|_| {
                schema_error(format!(
                    "relation `{}` targets unknown entity `{}`",
                    relation.name, link.target
                ))
            })?;
            if target.get_field(PRIMARY_KEY).is_none() {
                return Err(schema_error(format!(
                    "relation `{}` targets `{}`, which has no `{PRIMARY_KEY}`",
                    relation.name, target.name
                )));
            }
        }

        let fields = relation.link_fields();
        let has_unique = owner.uniques.iter().any(|u| u.covers_exactly(&fields));
        match relation.cardinality {
            Cardinality::OneToMany if fields.len() != 1 => Err(schema_error(format!(
                "one-to-many relation `{}` must hold exactly one link",
                relation.name
            ))),
            Cardinality::OneToOne if fields.len() != 1 || !has_unique => {
                Err(schema_error(format!(
                    "one-to-one relation `{}` needs one link with a unique constraint on it",
                    relation.name
                )))
            }
            Cardinality::ManyToMany
                if fields.len() != 2 || fields[0] == fields[1] || !has_unique =>
            {
                Err(schema_error(format!(
                    "many-to-many relation `{}` needs a junction with two links and a composite unique constraint",
                    relation.name
                )))
            }
            _ => Ok(()),
        }
    }
}

fn schema_error(message: String) -> Error {
    Error::Schema { message }
}

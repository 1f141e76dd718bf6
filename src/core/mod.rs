/// Declarative rule primitives
pub mod rules;
/// Schema Registry: entities, fields, unique constraints and relations
pub mod schema;
/// The canonical inventory rule set
pub mod constraints;
/// Mutation lifecycle hooks
pub mod hooks;
/// Uniform access to entity models
pub mod record;
/// Registry-driven integrity pre-checks
pub mod integrity;
/// Unit-of-work and transaction scopes
pub mod unit_of_work;

use crate::errors::Result;
use constraints::ConstraintSet;
use hooks::LifecycleHooks;
use schema::SchemaRegistry;

/// Everything the write core needs besides a connection: the resolved schema, the hook
/// chains and the rule sets. Built once at startup and shared by every unit of work.
#[derive(Debug)]
pub struct Domain {
    /// Resolved Schema Registry
    pub schema: SchemaRegistry,
    /// Normalization hooks per entity
    pub hooks: LifecycleHooks,
    /// Business rules per entity
    pub constraints: ConstraintSet,
}

impl Domain {
    /// The inventory domain with the standard hooks and rules.
    pub fn inventory() -> Result<Self> {
        Ok(Self {
            schema: SchemaRegistry::inventory()?,
            hooks: LifecycleHooks::standard(),
            constraints: ConstraintSet::standard()?,
        })
    }
}

//! Schema registry describing entities, tables and relations.
//!
//! The registry is consumed read-only by the mapper and the relation
//! resolver. It carries no field-access logic of its own; extraction and
//! hydration stay behind the [`Entity`](crate::entity::Entity) trait.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default fan-in guard for relations.
///
/// A relation re-linked past this many live references is treated as
/// redundant and no longer re-persisted. Policy, not contract; override per
/// relation with [`RelationSchema::fan_in`].
pub const DEFAULT_FAN_IN_LIMIT: u32 = 2;

/// The kind of a declared relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// The parent owns a single related entity; the related row carries the
    /// foreign key.
    #[default]
    HasOne,
}

/// Declaration of a single relation on an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSchema {
    /// Relation name, as exposed by `Entity::related`.
    pub name: String,
    /// Relation kind.
    pub kind: RelationKind,
    /// Role of the related entity type.
    pub target: String,
    /// Whether store/delete operations cascade to the related entity.
    pub cascade: bool,
    /// Column on the parent side that identifies it (usually its primary key).
    pub inner_key: String,
    /// Column on the related side that receives the parent's key.
    pub outer_key: String,
    /// Fan-in guard: past this many live references a re-link is suppressed.
    pub fan_in_limit: u32,
}

impl RelationSchema {
    /// Declare a has-one relation.
    #[must_use]
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::HasOne,
            target: target.into(),
            cascade: true,
            inner_key: inner_key.into(),
            outer_key: outer_key.into(),
            fan_in_limit: DEFAULT_FAN_IN_LIMIT,
        }
    }

    /// Set the cascade flag.
    #[must_use]
    pub fn cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    /// Override the fan-in guard limit.
    #[must_use]
    pub fn fan_in(mut self, limit: u32) -> Self {
        self.fan_in_limit = limit;
        self
    }
}

/// Everything the engine knows about one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Role under which the entity registers itself.
    pub role: String,
    /// Logical database name, resolved to a driver by the session.
    pub database: String,
    /// Table name.
    pub table: String,
    /// Primary key column name.
    pub primary_key: String,
    /// Full column list; extracted values are intersected with it.
    pub columns: Vec<String>,
    /// Declared relations.
    pub relations: Vec<RelationSchema>,
}

impl EntitySchema {
    /// Define a new entity schema with no relations.
    #[must_use]
    pub fn new(
        role: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            role: role.into(),
            database: database.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            columns,
            relations: Vec::new(),
        }
    }

    /// Add a relation declaration.
    #[must_use]
    pub fn relation(mut self, relation: RelationSchema) -> Self {
        self.relations.push(relation);
        self
    }

    /// Whether the given column belongs to this entity's table.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Registry mapping entity roles to their schemas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    entities: HashMap<String, EntitySchema>,
}

impl Schema {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity schema under its role.
    #[must_use]
    pub fn define(mut self, entity: EntitySchema) -> Self {
        self.entities.insert(entity.role.clone(), entity);
        self
    }

    /// Look up the schema for a role.
    pub fn entity(&self, role: &str) -> Result<&EntitySchema> {
        self.entities.get(role).ok_or_else(|| Error::UnknownRole {
            role: role.to_string(),
        })
    }

    /// Number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

//! Associations between models and their persistence hooks.
//!
//! An association is declared on the owning model's [`Meta`] and initialized once
//! when the [`Registry`](crate::Registry) is built. Records call the hooks while
//! they are saved, validated and deleted:
//!
//! - `after_check` runs at the end of `Record::check` and reports invalid related
//!   records as an `association` error on the owner;
//! - `after_save` runs after the owner's own row is written, in declaration order,
//!   and moves foreign keys with bulk UPDATE statements;
//! - `before_delete` applies the [`Dependent`] policy before the owner's row is
//!   deleted.

pub mod count_cache;
pub mod has_many;
pub mod has_one;

pub use count_cache::CountCache;
pub use has_many::HasMany;
pub use has_one::HasOne;

use crate::context::Context;
use crate::error::Result;
use crate::meta::registry::InitEnv;
use crate::meta::Meta;
use crate::model::ModelRef;
use crate::query::{Op, Query};
use crate::value;
use std::collections::BTreeSet;

/// What happens to related rows when the owner is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dependent {
    /// Leave related rows untouched
    #[default]
    None,
    /// Delete related records through their own lifecycle (their cascades run)
    Delete,
    /// Delete related rows with one statement, skipping their lifecycle
    Erase,
    /// Clear the foreign key on related rows with one statement
    Nullify,
}

/// Polymorphic ownership: the foreign table stores `<as>_id` and `<as>_model`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polymorphic {
    /// Use the owning model's name as the prefix
    Owner,
    /// Use an explicit prefix, e.g. `commentable`
    Named(String),
}

/// Configuration shared by every association kind
#[derive(Debug, Clone, Default)]
pub struct AssociationBase {
    pub(crate) name: String,
    pub(crate) model: String,
    pub(crate) foreign_model: Option<String>,
    pub(crate) dependent: Dependent,
    pub(crate) polymorphic: Option<Polymorphic>,
}

impl AssociationBase {
    /// Attribute name on the owning model
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Related model; empty before initialization
    pub fn foreign_model(&self) -> &str {
        self.foreign_model.as_deref().unwrap_or_default()
    }

    pub fn dependent(&self) -> Dependent {
        self.dependent
    }

    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic.is_some()
    }

    /// Prefix of the polymorphic columns, if any
    pub fn polymorphic_as(&self) -> Option<&str> {
        match &self.polymorphic {
            Some(Polymorphic::Owner) => Some(&self.model),
            Some(Polymorphic::Named(name)) => Some(name),
            None => None,
        }
    }

    pub(crate) fn bind(&mut self, meta: &Meta, name: &str) {
        self.name = name.to_string();
        self.model = meta.model().to_string();
    }

    /// Query on the foreign model restricted to rows owned by `owner_id`
    pub(crate) fn owned_query(
        &self,
        ctx: &Context<'_>,
        foreign_key: &str,
        polymorphic_key: Option<&str>,
        owner_id: i64,
    ) -> Result<Query> {
        let mut query = ctx
            .query(self.foreign_model())?
            .filter(foreign_key, Op::Eq, owner_id);
        if let Some(key) = polymorphic_key {
            query = query.filter(key, Op::Eq, self.model.as_str());
        }
        Ok(query)
    }

    /// Write the owner's key (and discriminator) onto a related record in memory
    pub(crate) fn stamp(
        &self,
        owner: &ModelRef,
        item: &ModelRef,
        foreign_key: &str,
        polymorphic_key: Option<&str>,
    ) {
        item.set(foreign_key, value::id_value(owner.id()));
        if let Some(key) = polymorphic_key {
            item.set(key, self.model.as_str());
        }
    }
}

/// Lifecycle hooks invoked by records
///
/// Every hook is a no-op unless an association overrides it.
pub trait AssociationHooks {
    fn base(&self) -> &AssociationBase;

    fn before_delete(&self, _ctx: &Context<'_>, _owner: &ModelRef, _changed: bool) -> Result<()> {
        Ok(())
    }

    fn after_save(&self, _ctx: &Context<'_>, _owner: &ModelRef, _changed: bool) -> Result<()> {
        Ok(())
    }

    fn after_check(
        &self,
        _ctx: &Context<'_>,
        _owner: &ModelRef,
        _changed: &BTreeSet<String>,
    ) -> Result<()> {
        Ok(())
    }
}

/// A declared association
#[derive(Debug, Clone)]
pub enum Association {
    HasOne(HasOne),
    HasMany(HasMany),
}

impl Association {
    fn hooks(&self) -> &dyn AssociationHooks {
        match self {
            Association::HasOne(association) => association,
            Association::HasMany(association) => association,
        }
    }

    pub fn base(&self) -> &AssociationBase {
        self.hooks().base()
    }

    pub fn name(&self) -> &str {
        self.base().name()
    }

    pub fn foreign_model(&self) -> &str {
        self.base().foreign_model()
    }

    pub fn dependent(&self) -> Dependent {
        self.base().dependent()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.base().is_polymorphic()
    }

    /// True for associations that hold a collection
    pub fn is_collection(&self) -> bool {
        matches!(self, Association::HasMany(_))
    }

    pub fn as_has_one(&self) -> Option<&HasOne> {
        match self {
            Association::HasOne(association) => Some(association),
            Association::HasMany(_) => None,
        }
    }

    pub fn as_has_many(&self) -> Option<&HasMany> {
        match self {
            Association::HasMany(association) => Some(association),
            Association::HasOne(_) => None,
        }
    }

    pub(crate) fn initialize(&mut self, meta: &mut Meta, name: &str, env: &InitEnv<'_>) -> Result<()> {
        match self {
            Association::HasOne(association) => association.initialize(meta, name, env),
            Association::HasMany(association) => association.initialize(meta, name, env),
        }
    }

    pub fn before_delete(&self, ctx: &Context<'_>, owner: &ModelRef, changed: bool) -> Result<()> {
        self.hooks().before_delete(ctx, owner, changed)
    }

    pub fn after_save(&self, ctx: &Context<'_>, owner: &ModelRef, changed: bool) -> Result<()> {
        self.hooks().after_save(ctx, owner, changed)
    }

    pub fn after_check(
        &self,
        ctx: &Context<'_>,
        owner: &ModelRef,
        changed: &BTreeSet<String>,
    ) -> Result<()> {
        self.hooks().after_check(ctx, owner, changed)
    }
}

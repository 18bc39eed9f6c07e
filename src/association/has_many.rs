//! Has-many association: a collection of related rows keyed by a foreign key.
//!
//! Membership changes are reconciled on save with a diff against the ids that were
//! originally loaded: removed ids are moved to `foreign_default` and added ids to
//! the owner with one bulk UPDATE each. Member attributes other than the foreign
//! key are only written when the member itself is saved.

use super::{AssociationBase, AssociationHooks, CountCache, Dependent, Polymorphic};
use crate::context::Context;
use crate::error::{OrmError, Result};
use crate::errors::Params;
use crate::inflector;
use crate::meta::registry::{InitEnv, Registry};
use crate::meta::{Field, Meta};
use crate::model::{Collection, ModelRef, Record};
use crate::query::{Join, JoinKind, Op, Operand, Query};
use crate::value;
use std::collections::BTreeSet;

/// Collection of related records
///
/// # Example
///
/// ```
/// use lifeline::{Dependent, HasMany, Meta};
///
/// let post = Meta::new("post")
///     .has_many("comments", HasMany::new().count_cache().dependent(Dependent::Erase))
///     .has_many("notes", HasMany::new().foreign("comment").polymorphic_as("commentable"));
/// # let _ = post;
/// ```
#[derive(Debug, Clone, Default)]
pub struct HasMany {
    base: AssociationBase,
    foreign: Option<String>,
    foreign_key: String,
    polymorphic_key: Option<String>,
    count_cache: Option<CountCache>,
    count_cache_requested: Option<Option<String>>,
    foreign_default: Option<i64>,
}

impl HasMany {
    pub fn new() -> Self {
        Self::default()
    }

    /// Foreign path as `"<model>.<field>"`
    ///
    /// Either half may be omitted (`"comment"`, `".author_id"`): the model defaults
    /// to the singular attribute name and the field to the owner's foreign key. The
    /// model half may also name a table.
    pub fn foreign(mut self, foreign: impl Into<String>) -> Self {
        self.foreign = Some(foreign.into());
        self
    }

    /// Polymorphic ownership using the owner's model name as prefix
    pub fn polymorphic(mut self) -> Self {
        self.base.polymorphic = Some(Polymorphic::Owner);
        self
    }

    /// Polymorphic ownership through `<name>_id` / `<name>_model`
    pub fn polymorphic_as(mut self, name: impl Into<String>) -> Self {
        self.base.polymorphic = Some(Polymorphic::Named(name.into()));
        self
    }

    /// Keep `<attribute>_count` on the owner equal to the number of members
    pub fn count_cache(mut self) -> Self {
        self.count_cache_requested = Some(None);
        self
    }

    /// Keep the named owner field equal to the number of members
    pub fn count_cache_as(mut self, field: impl Into<String>) -> Self {
        self.count_cache_requested = Some(Some(field.into()));
        self
    }

    /// Foreign key value written on dissociation
    pub fn foreign_default(mut self, value: i64) -> Self {
        self.foreign_default = Some(value);
        self
    }

    pub fn dependent(mut self, dependent: Dependent) -> Self {
        self.base.dependent = dependent;
        self
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn foreign_model(&self) -> &str {
        self.base.foreign_model()
    }

    pub fn foreign_key_name(&self) -> &str {
        &self.foreign_key
    }

    pub fn polymorphic_key_name(&self) -> Option<&str> {
        self.polymorphic_key.as_deref()
    }

    pub fn count_cache_field(&self) -> Option<&str> {
        self.count_cache.as_ref().map(CountCache::field)
    }

    /// Resolved dissociation value (registry default unless set)
    pub fn foreign_default_value(&self) -> i64 {
        self.foreign_default.unwrap_or_default()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.base.is_polymorphic()
    }

    fn not_loaded(&self, operation: &'static str) -> OrmError {
        OrmError::NotLoaded {
            model: self.base.model().to_string(),
            name: self.name().to_string(),
            operation,
        }
    }

    /// Query for every row that belongs to `owner`
    ///
    /// # Errors
    ///
    /// Returns `OrmError::NotLoaded` when the owner has not been loaded or saved.
    pub fn fetch(&self, ctx: &Context<'_>, owner: &ModelRef) -> Result<Query> {
        let owner_id = owner
            .id()
            .filter(|_| owner.loaded())
            .ok_or_else(|| self.not_loaded("build a collection query"))?;
        self.base.owned_query(
            ctx,
            &self.foreign_key,
            self.polymorphic_key_name(),
            owner_id,
        )
    }

    /// Materialize the collection; empty for an owner that is not persisted
    pub fn load(&self, ctx: &Context<'_>, owner: &ModelRef) -> Result<Collection> {
        if !owner.loaded() {
            return Ok(Collection::default());
        }
        let meta = ctx.meta(self.foreign_model())?;
        let records = self
            .fetch(ctx, owner)?
            .all(ctx.store)?
            .into_iter()
            .map(|row| Record::from_row(meta, row))
            .collect();
        Ok(Collection::loaded(records))
    }

    /// Stamp the owner's key (and discriminator) onto a member in memory
    pub fn assign_relation(&self, owner: &ModelRef, item: &ModelRef) {
        self.base
            .stamp(owner, item, &self.foreign_key, self.polymorphic_key_name());
    }

    /// UPDATE moving every member back to `foreign_default`
    pub fn nullify_query(&self, ctx: &Context<'_>, owner: &ModelRef) -> Result<Query> {
        let mut query = self
            .fetch(ctx, owner)?
            .value(self.foreign_key.as_str(), self.foreign_default_value());
        if let Some(key) = self.polymorphic_key_name() {
            query = query.value(key, value::null_text());
        }
        Ok(query)
    }

    /// Join clause from the owner's table to the related table
    pub fn attribute_join(
        &self,
        registry: &Registry,
        alias: Option<&str>,
        kind: JoinKind,
    ) -> Result<Join> {
        let owner = registry.meta(self.base.model())?;
        let foreign = registry.meta(self.foreign_model())?;
        let mut join = Join::new(foreign.table(), kind);
        if let Some(alias) = alias {
            join = join.alias(alias);
        }
        join = join.on(
            self.foreign_key.as_str(),
            Op::Eq,
            Operand::Column(owner.table().to_string(), owner.primary_key().to_string()),
        );
        if let Some(key) = self.polymorphic_key_name() {
            join = join.on(key, Op::Eq, self.base.model());
        }
        Ok(join)
    }

    fn reconcile(&self, ctx: &Context<'_>, owner: &ModelRef, collection: &Collection) -> Result<()> {
        let owner_id = owner
            .id()
            .ok_or_else(|| self.not_loaded("save a collection"))?;

        // new members need ids before the diff
        for item in collection.records() {
            if !item.loaded() && !item.is_saving() {
                self.assign_relation(owner, &item);
                item.save(ctx)?;
            }
        }

        let (removed, added) = collection.diff();
        let meta = ctx.meta(self.foreign_model())?;

        if !removed.is_empty() {
            let mut query = self
                .fetch(ctx, owner)?
                .key(removed.iter().copied())
                .value(self.foreign_key.as_str(), self.foreign_default_value());
            if let Some(key) = self.polymorphic_key_name() {
                query = query.value(key, value::null_text());
            }
            let moved = query.update(ctx.store)?;
            log::debug!(
                "{}->{}: dissociated {:?} ({} row(s))",
                self.base.model(),
                self.name(),
                removed,
                moved
            );
        }

        if !added.is_empty() {
            let mut query = Query::new(meta)
                .key(added.iter().copied())
                .value(self.foreign_key.as_str(), owner_id);
            if let Some(key) = self.polymorphic_key_name() {
                query = query.value(key, self.base.model());
            }
            let moved = query.update(ctx.store)?;
            log::debug!(
                "{}->{}: associated {:?} ({} row(s))",
                self.base.model(),
                self.name(),
                added,
                moved
            );
        }
        Ok(())
    }
}

impl HasMany {
    /// Fill in naming-convention defaults; may register fields on the owner's meta
    pub(crate) fn initialize(&mut self, meta: &mut Meta, name: &str, env: &InitEnv<'_>) -> Result<()> {
        self.base.bind(meta, name);

        let foreign = self.foreign.clone().unwrap_or_default();
        let (model, field) = match foreign.split_once('.') {
            Some((model, field)) => (model, field),
            None => (foreign.as_str(), ""),
        };
        let model = if model.is_empty() {
            inflector::singular(name)
        } else {
            model.to_string()
        };
        self.base.foreign_model = Some(env.foreign_model(meta.model(), name, &model)?);

        match self.base.polymorphic_as().map(str::to_string) {
            Some(prefix) => {
                self.foreign_key = format!("{prefix}_id");
                self.polymorphic_key = Some(format!("{prefix}_model"));
            }
            None => {
                self.foreign_key = if field.is_empty() {
                    meta.foreign_key().to_string()
                } else {
                    field.to_string()
                };
                self.polymorphic_key = None;
            }
        }

        self.foreign_default.get_or_insert(env.foreign_default);

        if let Some(requested) = self.count_cache_requested.clone() {
            if self.base.is_polymorphic() {
                return Err(OrmError::configuration(format!(
                    "count cache on {}->{} cannot be used with a polymorphic association",
                    meta.model(),
                    name
                )));
            }
            let field = requested.unwrap_or_else(|| format!("{name}_count"));
            meta.ensure_field(Field::integer(field.as_str()).default_value(0i64).not_null());
            self.count_cache = Some(CountCache::new(field));
        }
        Ok(())
    }
}

impl AssociationHooks for HasMany {
    fn base(&self) -> &AssociationBase {
        &self.base
    }

    fn before_delete(&self, ctx: &Context<'_>, owner: &ModelRef, _changed: bool) -> Result<()> {
        if !owner.loaded() {
            return Ok(());
        }
        match self.base.dependent {
            Dependent::None => Ok(()),
            Dependent::Delete => {
                for item in self.load(ctx, owner)?.records() {
                    item.delete(ctx)?;
                }
                Ok(())
            }
            Dependent::Erase => {
                self.fetch(ctx, owner)?.delete(ctx.store)?;
                Ok(())
            }
            Dependent::Nullify => {
                self.nullify_query(ctx, owner)?.update(ctx.store)?;
                Ok(())
            }
        }
    }

    fn after_save(&self, ctx: &Context<'_>, owner: &ModelRef, changed: bool) -> Result<()> {
        if !changed {
            return Ok(());
        }
        let Some(collection) = owner.changed_collection(self.name()) else {
            return Ok(());
        };
        if !collection.is_changed() {
            return Ok(());
        }
        self.reconcile(ctx, owner, &collection)?;
        if let Some(cache) = &self.count_cache {
            cache.refresh(ctx, self, owner)?;
        }
        Ok(())
    }

    fn after_check(
        &self,
        ctx: &Context<'_>,
        owner: &ModelRef,
        changed: &BTreeSet<String>,
    ) -> Result<()> {
        if !changed.contains(self.name()) {
            return Ok(());
        }
        let Some(collection) = owner.changed_collection(self.name()) else {
            return Ok(());
        };
        let mut invalid = false;
        for item in collection.records() {
            let touched = !item.loaded() || item.has_changes();
            if touched && !item.is_validating() && !item.check(ctx)? {
                invalid = true;
            }
        }
        if invalid {
            owner
                .errors_mut()
                .add(self.name(), "association", Params::new());
        }
        Ok(())
    }
}

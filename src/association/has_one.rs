//! Has-one association: the foreign key lives on the related table.
//!
//! ```text
//! posts                 images
//! +----+               +----+---------+
//! | id | <------------ | id | post_id |
//! +----+               +----+---------+
//! ```
//!
//! At most one related row references an owner. The association does not enforce
//! that with constraints; `after_save` keeps it true by clearing every row pointing
//! at the owner before it attaches the new one.

use super::{AssociationBase, AssociationHooks, Dependent, Polymorphic};
use crate::context::Context;
use crate::error::{OrmError, Result};
use crate::errors::{Param, Params};
use crate::meta::registry::{InitEnv, Registry};
use crate::meta::Meta;
use crate::model::{ModelRef, One, Record};
use crate::query::{Join, JoinKind, Op, Operand, Query};
use crate::value;
use std::collections::BTreeSet;

/// Single related record
///
/// # Example
///
/// ```
/// use lifeline::{Dependent, HasOne, Meta};
///
/// let user = Meta::new("user")
///     .has_one("profile", HasOne::new().dependent(Dependent::Nullify))
///     .has_one("avatar", HasOne::new().foreign_model("image").polymorphic_as("imageable"));
/// # let _ = user;
/// ```
#[derive(Debug, Clone, Default)]
pub struct HasOne {
    base: AssociationBase,
    foreign_key: Option<String>,
    polymorphic_key: Option<String>,
    inverse_of: Option<String>,
}

impl HasOne {
    pub fn new() -> Self {
        Self::default()
    }

    /// Related model; defaults to the attribute name
    pub fn foreign_model(mut self, model: impl Into<String>) -> Self {
        self.base.foreign_model = Some(model.into());
        self
    }

    /// Column on the related table; defaults to `<owner>_id`, or `<as>_id` when
    /// polymorphic
    pub fn foreign_key(mut self, key: impl Into<String>) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    /// Polymorphic ownership through `<name>_id` / `<name>_model`
    pub fn polymorphic_as(mut self, name: impl Into<String>) -> Self {
        self.base.polymorphic = Some(Polymorphic::Named(name.into()));
        self
    }

    /// Discriminator column; defaults to `<as>_model`
    pub fn polymorphic_key(mut self, key: impl Into<String>) -> Self {
        self.polymorphic_key = Some(key.into());
        self
    }

    /// Attribute on the related record that points back at the owner
    pub fn inverse_of(mut self, attribute: impl Into<String>) -> Self {
        self.inverse_of = Some(attribute.into());
        self
    }

    pub fn dependent(mut self, dependent: Dependent) -> Self {
        self.base.dependent = dependent;
        self
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn foreign_key_name(&self) -> &str {
        self.foreign_key.as_deref().unwrap_or_default()
    }

    pub fn polymorphic_key_name(&self) -> Option<&str> {
        self.polymorphic_key.as_deref()
    }

    pub fn inverse(&self) -> Option<&str> {
        self.inverse_of.as_deref()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.base.is_polymorphic()
    }

    /// Query for the row currently pointing at `owner_id`
    fn current(&self, ctx: &Context<'_>, owner_id: i64) -> Result<Query> {
        self.base.owned_query(
            ctx,
            self.foreign_key_name(),
            self.polymorphic_key_name(),
            owner_id,
        )
    }

    fn wire_inverse(&self, owner: &ModelRef, item: &ModelRef) {
        if let Some(inverse) = &self.inverse_of {
            item.set_parent(inverse, owner);
        }
    }

    /// Value of the association for `owner`
    ///
    /// With `raw = None` the attribute is unchanged since load and the related row
    /// is fetched by `foreign_key = owner.id`. A changed record or empty value is
    /// returned as is. A changed key is looked up by unique key, stamped with the
    /// owner's foreign key and discriminator and merged with any extra values.
    /// An owner that was never loaded or saved has no related row.
    pub fn resolve(
        &self,
        ctx: &Context<'_>,
        owner: &ModelRef,
        raw: Option<&One>,
    ) -> Result<Option<ModelRef>> {
        let (key, extra) = match raw {
            None => {
                let Some(owner_id) = owner.id().filter(|_| owner.loaded()) else {
                    return Ok(None);
                };
                let meta = ctx.meta(self.base.foreign_model())?;
                let Some(row) = self.current(ctx, owner_id)?.first(ctx.store)? else {
                    return Ok(None);
                };
                let item = Record::from_row(meta, row);
                self.wire_inverse(owner, &item);
                return Ok(Some(item));
            }
            Some(One::Empty) => return Ok(None),
            Some(One::Record(item)) => return Ok(Some(item.clone())),
            Some(One::Key(key)) => (key, None),
            Some(One::KeyWith(key, extra)) => (key, Some(extra)),
        };

        let meta = ctx.meta(self.base.foreign_model())?;
        let Some(row) = Query::new(meta).unique_key(key).first(ctx.store)? else {
            log::debug!(
                "{}->{}: key {} matched no {}",
                self.base.model(),
                self.name(),
                value::display(key),
                meta.model()
            );
            return Ok(None);
        };
        let item = Record::from_row(meta, row);
        self.base
            .stamp(owner, &item, self.foreign_key_name(), self.polymorphic_key_name());
        if let Some(extra) = extra {
            item.set_values(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.wire_inverse(owner, &item);
        Ok(Some(item))
    }

    /// Join clause from the owner's table to the related table
    pub fn join(&self, registry: &Registry, alias: Option<&str>, kind: JoinKind) -> Result<Join> {
        let owner = registry.meta(self.base.model())?;
        let foreign = registry.meta(self.base.foreign_model())?;
        let mut join = Join::new(foreign.table(), kind);
        if let Some(alias) = alias {
            join = join.alias(alias);
        }
        join = join.on(
            self.foreign_key_name(),
            Op::Eq,
            Operand::Column(owner.table().to_string(), owner.primary_key().to_string()),
        );
        if let Some(key) = self.polymorphic_key_name() {
            join = join.on(key, Op::Eq, self.base.model());
        }
        Ok(join)
    }

    fn saved_owner_id(&self, owner: &ModelRef, operation: &'static str) -> Result<i64> {
        owner.id().ok_or_else(|| OrmError::NotLoaded {
            model: self.base.model().to_string(),
            name: self.name().to_string(),
            operation,
        })
    }

    fn save_item(&self, ctx: &Context<'_>, owner: &ModelRef, item: &ModelRef) -> Result<()> {
        if item.is_saving() {
            log::debug!(
                "{}->{}: related {} is mid-save, not cascading",
                self.base.model(),
                self.name(),
                item.model()
            );
            return Ok(());
        }
        self.base
            .stamp(owner, item, self.foreign_key_name(), self.polymorphic_key_name());
        item.save(ctx)
    }
}

impl HasOne {
    /// Fill in naming-convention defaults; may register fields on the owner's meta
    pub(crate) fn initialize(&mut self, meta: &mut Meta, name: &str, env: &InitEnv<'_>) -> Result<()> {
        self.base.bind(meta, name);
        let target = self.base.foreign_model.clone().unwrap_or_else(|| name.to_string());
        self.base.foreign_model = Some(env.foreign_model(meta.model(), name, &target)?);

        let prefix = self.base.polymorphic_as().map(str::to_string);
        if self.foreign_key.is_none() {
            self.foreign_key = Some(match &prefix {
                Some(prefix) => format!("{prefix}_id"),
                None => meta.foreign_key().to_string(),
            });
        }
        if let Some(prefix) = prefix {
            self.polymorphic_key.get_or_insert_with(|| format!("{prefix}_model"));
        } else {
            self.polymorphic_key = None;
        }
        Ok(())
    }
}

impl AssociationHooks for HasOne {
    fn base(&self) -> &AssociationBase {
        &self.base
    }

    fn before_delete(&self, ctx: &Context<'_>, owner: &ModelRef, _changed: bool) -> Result<()> {
        let Some(owner_id) = owner.id().filter(|_| owner.loaded()) else {
            return Ok(());
        };
        match self.base.dependent {
            Dependent::None => Ok(()),
            Dependent::Delete => {
                if let Some(item) = self.resolve(ctx, owner, None)? {
                    item.delete(ctx)?;
                }
                Ok(())
            }
            Dependent::Erase => {
                self.current(ctx, owner_id)?.delete(ctx.store)?;
                Ok(())
            }
            Dependent::Nullify => {
                let mut query = self
                    .current(ctx, owner_id)?
                    .value(self.foreign_key_name(), value::null_key());
                if let Some(key) = self.polymorphic_key_name() {
                    query = query.value(key, value::null_text());
                }
                query.update(ctx.store)?;
                Ok(())
            }
        }
    }

    fn after_save(&self, ctx: &Context<'_>, owner: &ModelRef, changed: bool) -> Result<()> {
        if !changed {
            return Ok(());
        }
        let owner_id = self.saved_owner_id(owner, "save a has-one association")?;

        // detach every row still pointing at the owner before attaching the new one
        let mut clear = self
            .current(ctx, owner_id)?
            .value(self.foreign_key_name(), value::null_key());
        if let Some(key) = self.polymorphic_key_name() {
            clear = clear.value(key, value::null_text());
        }
        let cleared = clear.update(ctx.store)?;
        log::debug!(
            "{}->{}: cleared {} row(s) pointing at {}",
            self.base.model(),
            self.name(),
            cleared,
            owner_id
        );

        match owner.changed_one(self.name()) {
            Some(One::Record(item)) => self.save_item(ctx, owner, &item),
            Some(One::KeyWith(..)) => match owner.one(ctx, self.name())? {
                Some(item) => self.save_item(ctx, owner, &item),
                None => Ok(()),
            },
            Some(One::Key(key)) => {
                let meta = ctx.meta(self.base.foreign_model())?;
                let mut attach = Query::new(meta)
                    .unique_key(&key)
                    .value(self.foreign_key_name(), owner_id);
                if let Some(poly) = self.polymorphic_key_name() {
                    attach = attach.value(poly, self.base.model());
                }
                attach.update(ctx.store)?;
                Ok(())
            }
            Some(One::Empty) | None => Ok(()),
        }
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
        // a bare key is attached with a direct UPDATE, the row itself is not validated
        match owner.changed_one(self.name()) {
            Some(One::Record(_) | One::KeyWith(..)) => {}
            Some(One::Key(_) | One::Empty) | None => return Ok(()),
        }
        let Some(item) = owner.one(ctx, self.name())? else {
            return Ok(());
        };
        if item.is_validating() || item.check(ctx)? {
            return Ok(());
        }
        let child_errors = item.errors().clone();
        owner.errors_mut().add(
            self.name(),
            "association",
            Params::new().with("errors", Param::Errors(Box::new(child_errors))),
        );
        Ok(())
    }
}

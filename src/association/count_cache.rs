//! Count cache extension for has-many associations.
//!
//! The owner carries an integer column holding the number of members. It is
//! refreshed from a `COUNT(*)` of the foreign rows after every save that changed
//! the collection, and written both to the owner's row and to the in-memory owner.

use super::HasMany;
use crate::context::Context;
use crate::error::Result;
use crate::model::ModelRef;
use sea_query::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountCache {
    field: String,
}

impl CountCache {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Owner field holding the count
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Recount the members of `association` and store the result on `owner`
    pub fn refresh(&self, ctx: &Context<'_>, association: &HasMany, owner: &ModelRef) -> Result<u64> {
        let count = association.fetch(ctx, owner)?.count(ctx.store)?;
        let count_value = Value::BigInt(Some(i64::try_from(count).unwrap_or(i64::MAX)));
        if let Some(owner_id) = owner.id() {
            ctx.query(owner.model())?
                .key([owner_id])
                .value(self.field.as_str(), count_value.clone())
                .update(ctx.store)?;
        }
        owner.set_original(&self.field, count_value);
        log::debug!(
            "{}->{}: {} = {}",
            owner.model(),
            association.name(),
            self.field,
            count
        );
        Ok(count)
    }
}

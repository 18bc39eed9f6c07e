//! Dynamic records and their save/check/delete lifecycle.
//!
//! A [`Record`] is a row of one registered model: the values it was loaded with,
//! the values assigned since, and the association values that were resolved or
//! assigned. Records are shared as [`ModelRef`] (`Rc<Record>`) so that the object
//! graph built through associations can point back at owners without cycles of
//! strong references; inverse references are `Weak`.
//!
//! # Lifecycle
//!
//! `save` validates the record, writes its own columns (INSERT for new records,
//! UPDATE of the changed columns otherwise), then runs each association's
//! `after_save` in declaration order. `delete` runs each association's
//! `before_delete`, then deletes the row. Each record carries a flag per
//! operation so that two records pointing at each other do not cascade forever.
//!
//! ```
//! use lifeline::{Context, HasMany, MemoryStore, Meta, Record, Registry};
//!
//! # fn main() -> lifeline::Result<()> {
//! let registry = Registry::builder()
//!     .model(Meta::new("post").has_many("comments", HasMany::new().count_cache()))
//!     .model(Meta::new("comment"))
//!     .build()?;
//! let store = MemoryStore::new();
//! let ctx = Context::new(&registry, &store);
//!
//! let post = Record::build(&ctx, "post")?;
//! post.set("title", "Hello");
//! post.save(&ctx)?;
//!
//! let comment = Record::build(&ctx, "comment")?;
//! comment.set("body", "First!");
//! post.add_to(&ctx, "comments", comment.clone())?;
//! post.save(&ctx)?;
//!
//! assert_eq!(comment.get("post_id"), post.get("id"));
//! assert_eq!(post.get("comments_count"), Some(sea_query::Value::BigInt(Some(1))));
//! # Ok(())
//! # }
//! ```

pub mod collection;

pub use collection::{Collection, Member};

use crate::association::Association;
use crate::context::Context;
use crate::error::{OrmError, Result};
use crate::errors::Errors;
use crate::meta::Meta;
use crate::query::Row;
use crate::value;
use sea_query::Value;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Shared handle to a record
pub type ModelRef = Rc<Record>;

/// Value assigned to (or resolved for) a has-one association
#[derive(Debug, Clone)]
pub enum One {
    Empty,
    Record(ModelRef),
    /// Key of an existing foreign row: integer primary key or name key
    Key(Value),
    /// Key of an existing foreign row plus values to merge onto it
    KeyWith(Value, Row),
}

impl From<ModelRef> for One {
    fn from(record: ModelRef) -> Self {
        One::Record(record)
    }
}

impl From<&ModelRef> for One {
    fn from(record: &ModelRef) -> Self {
        One::Record(record.clone())
    }
}

impl From<Option<ModelRef>> for One {
    fn from(record: Option<ModelRef>) -> Self {
        record.map_or(One::Empty, One::Record)
    }
}

impl From<i64> for One {
    fn from(id: i64) -> Self {
        One::Key(Value::BigInt(Some(id)))
    }
}

impl From<&str> for One {
    fn from(name: &str) -> Self {
        One::Key(Value::String(Some(name.to_string())))
    }
}

/// Association state stored on a record
#[derive(Debug, Clone)]
enum Slot {
    One(One),
    Many(Collection),
    Parent(Weak<Record>),
}

#[derive(Debug, Default)]
struct State {
    original: Row,
    values: Row,
    changed: BTreeSet<String>,
    assigned: BTreeMap<String, Slot>,
    retrieved: BTreeMap<String, Slot>,
    loaded: bool,
}

/// Raises a flag for the lifetime of the guard
struct Raised<'a>(&'a Cell<bool>);

impl<'a> Raised<'a> {
    fn new(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Raised(flag)
    }
}

impl Drop for Raised<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// One row of a registered model
pub struct Record {
    model: String,
    primary_key: String,
    state: RefCell<State>,
    errors: RefCell<Errors>,
    saving: Cell<bool>,
    validating: Cell<bool>,
    deleting: Cell<bool>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model)
            .field("id", &self.id())
            .field("loaded", &self.loaded())
            .field("changed", &self.state.borrow().changed)
            .finish()
    }
}

impl Record {
    fn with_state(meta: &Meta, state: State) -> ModelRef {
        Rc::new(Record {
            model: meta.model().to_string(),
            primary_key: meta.primary_key().to_string(),
            state: RefCell::new(state),
            errors: RefCell::new(Errors::new(meta.model(), meta.errors_domain())),
            saving: Cell::new(false),
            validating: Cell::new(false),
            deleting: Cell::new(false),
        })
    }

    /// New, unsaved record starting with the field defaults
    pub fn new(meta: &Meta) -> ModelRef {
        let original = meta
            .defaults()
            .map(|(name, v)| (name.to_string(), v.clone()))
            .collect();
        Self::with_state(
            meta,
            State {
                original,
                ..State::default()
            },
        )
    }

    /// New, unsaved record of a registered model
    pub fn build(ctx: &Context<'_>, model: &str) -> Result<ModelRef> {
        Ok(Self::new(ctx.meta(model)?))
    }

    /// Loaded record from a fetched row
    pub fn from_row(meta: &Meta, row: Row) -> ModelRef {
        Self::with_state(
            meta,
            State {
                original: row,
                loaded: true,
                ..State::default()
            },
        )
    }

    /// Load by unique key (integer primary key or name key)
    pub fn load(ctx: &Context<'_>, model: &str, key: impl Into<Value>) -> Result<Option<ModelRef>> {
        let meta = ctx.meta(model)?;
        let row = ctx.query(model)?.unique_key(&key.into()).first(ctx.store)?;
        Ok(row.map(|row| Self::from_row(meta, row)))
    }

    /// Load by unique key, failing when nothing matches
    pub fn find(ctx: &Context<'_>, model: &str, key: impl Into<Value>) -> Result<ModelRef> {
        let key = key.into();
        Self::load(ctx, model, key.clone())?.ok_or_else(|| OrmError::NotFound {
            model: model.to_string(),
            key: value::display(&key),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Current primary key
    pub fn id(&self) -> Option<i64> {
        self.get(&self.primary_key).as_ref().and_then(value::as_id)
    }

    /// Current value of a column
    pub fn get(&self, attribute: &str) -> Option<Value> {
        let state = self.state.borrow();
        state
            .values
            .get(attribute)
            .or_else(|| state.original.get(attribute))
            .cloned()
    }

    /// Assign a column; the attribute counts as changed even if the value is equal
    pub fn set(&self, attribute: &str, value: impl Into<Value>) {
        let mut state = self.state.borrow_mut();
        state.values.insert(attribute.to_string(), value.into());
        state.changed.insert(attribute.to_string());
    }

    pub fn set_values<I, K, V>(&self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (attribute, value) in values {
            let attribute: String = attribute.into();
            self.set(&attribute, value);
        }
    }

    /// Value as loaded (or as last saved)
    pub fn original(&self, attribute: &str) -> Option<Value> {
        self.state.borrow().original.get(attribute).cloned()
    }

    pub(crate) fn set_original(&self, attribute: &str, value: Value) {
        let mut state = self.state.borrow_mut();
        state.original.insert(attribute.to_string(), value);
    }

    pub fn loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    /// Loaded and without unsaved changes
    pub fn saved(&self) -> bool {
        self.loaded() && !self.has_changes()
    }

    pub fn has_changes(&self) -> bool {
        !self.state.borrow().changed.is_empty()
    }

    pub fn is_changed(&self, attribute: &str) -> bool {
        self.state.borrow().changed.contains(attribute)
    }

    /// Names of changed columns and associations
    pub fn changed(&self) -> BTreeSet<String> {
        self.state.borrow().changed.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.get()
    }

    pub fn is_validating(&self) -> bool {
        self.validating.get()
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting.get()
    }

    /// Reset to an empty, unloaded record
    pub fn clear(&self) {
        *self.state.borrow_mut() = State::default();
        self.errors.borrow_mut().clear();
    }

    pub fn errors(&self) -> Ref<'_, Errors> {
        self.errors.borrow()
    }

    pub fn errors_mut(&self) -> RefMut<'_, Errors> {
        self.errors.borrow_mut()
    }

    // has-one

    /// Assign a has-one association; applied on the next save
    pub fn set_one(&self, name: &str, value: impl Into<One>) {
        let mut state = self.state.borrow_mut();
        state.retrieved.remove(name);
        state.assigned.insert(name.to_string(), Slot::One(value.into()));
        state.changed.insert(name.to_string());
    }

    /// Raw value assigned to a has-one association since the last save
    pub(crate) fn changed_one(&self, name: &str) -> Option<One> {
        match self.state.borrow().assigned.get(name) {
            Some(Slot::One(one)) => Some(one.clone()),
            _ => None,
        }
    }

    /// Related record of a has-one association
    pub fn one(self: &Rc<Self>, ctx: &Context<'_>, name: &str) -> Result<Option<ModelRef>> {
        let association = ctx.registry.has_one(&self.model, name)?;
        if let Some(Slot::One(cached)) = self.state.borrow().retrieved.get(name) {
            return Ok(match cached {
                One::Record(record) => Some(record.clone()),
                _ => None,
            });
        }
        let raw = self.changed_one(name);
        let resolved = association.resolve(ctx, self, raw.as_ref())?;
        self.state.borrow_mut().retrieved.insert(
            name.to_string(),
            Slot::One(resolved.clone().into()),
        );
        Ok(resolved)
    }

    // has-many

    pub(crate) fn changed_collection(&self, name: &str) -> Option<Collection> {
        match self.state.borrow().assigned.get(name) {
            Some(Slot::Many(collection)) => Some(collection.clone()),
            _ => None,
        }
    }

    fn cached_collection(&self, name: &str) -> Option<Collection> {
        let state = self.state.borrow();
        match state.assigned.get(name).or_else(|| state.retrieved.get(name)) {
            Some(Slot::Many(collection)) => Some(collection.clone()),
            _ => None,
        }
    }

    /// Members of a has-many association, loading them on first access
    pub fn collection(self: &Rc<Self>, ctx: &Context<'_>, name: &str) -> Result<Collection> {
        let association = ctx.registry.has_many(&self.model, name)?;
        if let Some(collection) = self.cached_collection(name) {
            return Ok(collection);
        }
        let collection = association.load(ctx, self)?;
        self.state
            .borrow_mut()
            .retrieved
            .insert(name.to_string(), Slot::Many(collection.clone()));
        Ok(collection)
    }

    /// Member records of a has-many association; bare keys are fetched
    pub fn members(self: &Rc<Self>, ctx: &Context<'_>, name: &str) -> Result<Vec<ModelRef>> {
        let association = ctx.registry.has_many(&self.model, name)?;
        let collection = self.collection(ctx, name)?;
        let keys: Vec<i64> = collection
            .members()
            .iter()
            .filter_map(|m| match m {
                Member::Key(id) => Some(*id),
                Member::Record(_) => None,
            })
            .collect();

        let mut fetched = BTreeMap::new();
        if !keys.is_empty() {
            let meta = ctx.meta(association.foreign_model())?;
            for row in ctx.query(meta.model())?.key(keys).all(ctx.store)? {
                let record = Record::from_row(meta, row);
                if let Some(id) = record.id() {
                    fetched.insert(id, record);
                }
            }
        }
        Ok(collection
            .members()
            .iter()
            .filter_map(|m| match m {
                Member::Record(record) => Some(record.clone()),
                Member::Key(id) => fetched.get(id).cloned(),
            })
            .collect())
    }

    fn update_collection(
        self: &Rc<Self>,
        ctx: &Context<'_>,
        name: &str,
        apply: impl FnOnce(&mut Collection),
    ) -> Result<()> {
        let mut collection = self.collection(ctx, name)?;
        apply(&mut collection);
        let mut state = self.state.borrow_mut();
        state.retrieved.remove(name);
        state
            .assigned
            .insert(name.to_string(), Slot::Many(collection));
        state.changed.insert(name.to_string());
        Ok(())
    }

    /// Add a member; record members get the owner's key stamped immediately
    pub fn add_to(self: &Rc<Self>, ctx: &Context<'_>, name: &str, member: impl Into<Member>) -> Result<()> {
        let association = ctx.registry.has_many(&self.model, name)?;
        let member = member.into();
        if let Member::Record(record) = &member {
            association.assign_relation(self, record);
        }
        self.update_collection(ctx, name, |collection| {
            collection.push(member);
        })
    }

    pub fn remove_from(self: &Rc<Self>, ctx: &Context<'_>, name: &str, id: i64) -> Result<()> {
        ctx.registry.has_many(&self.model, name)?;
        self.update_collection(ctx, name, |collection| {
            collection.remove(id);
        })
    }

    /// Replace all members
    pub fn set_many<I, M>(self: &Rc<Self>, ctx: &Context<'_>, name: &str, members: I) -> Result<()>
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        let association = ctx.registry.has_many(&self.model, name)?;
        let members: Vec<Member> = members.into_iter().map(Into::into).collect();
        for record in members.iter().filter_map(Member::record) {
            association.assign_relation(self, record);
        }
        self.update_collection(ctx, name, |collection| collection.replace(members))
    }

    // inverse references

    /// Record this one belongs to through an inverse association
    pub fn parent(&self, name: &str) -> Option<ModelRef> {
        match self.state.borrow().retrieved.get(name) {
            Some(Slot::Parent(parent)) => parent.upgrade(),
            _ => None,
        }
    }

    pub fn set_parent(&self, name: &str, parent: &ModelRef) {
        self.state
            .borrow_mut()
            .retrieved
            .insert(name.to_string(), Slot::Parent(Rc::downgrade(parent)));
    }

    // lifecycle

    /// Run rules and association checks; true when the record is valid
    pub fn check(self: &Rc<Self>, ctx: &Context<'_>) -> Result<bool> {
        if self.validating.get() {
            return Ok(self.errors().is_empty());
        }
        let _validating = Raised::new(&self.validating);
        let meta = ctx.meta(&self.model)?;
        self.errors_mut().clear();

        for (attribute, rule) in meta.rules() {
            let current = self.get(attribute).unwrap_or_else(value::null_key);
            if let Err(violation) = rule.check(&current) {
                self.errors_mut()
                    .add(attribute, violation.code, violation.params);
            }
        }

        let changed = self.changed();
        for (_, association) in meta.associations() {
            association.after_check(ctx, self, &changed)?;
        }
        Ok(self.errors().is_empty())
    }

    /// Like [`check`](Self::check), failing with `OrmError::Validation`
    pub fn check_insist(self: &Rc<Self>, ctx: &Context<'_>) -> Result<()> {
        if self.check(ctx)? {
            Ok(())
        } else {
            Err(self.validation_error(ctx))
        }
    }

    fn validation_error(&self, ctx: &Context<'_>) -> OrmError {
        OrmError::Validation {
            model: self.model.clone(),
            message: self.messages_all(ctx).join(", "),
        }
    }

    /// Validate, write the row and cascade to associations
    ///
    /// A record that is already being saved further up the call stack returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Validation` if the record is invalid, or the store's
    /// error if a statement fails.
    pub fn save(self: &Rc<Self>, ctx: &Context<'_>) -> Result<()> {
        if self.saving.get() {
            return Ok(());
        }
        let _saving = Raised::new(&self.saving);
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::save_span(&self.model).entered();

        if !self.check(ctx)? {
            return Err(self.validation_error(ctx));
        }
        let meta = ctx.meta(&self.model)?;
        self.write_row(ctx, meta)?;

        let changed = self.changed();
        for (name, association) in meta.associations() {
            association.after_save(ctx, self, changed.contains(name))?;
        }
        self.commit_associations();
        Ok(())
    }

    fn write_row(&self, ctx: &Context<'_>, meta: &Meta) -> Result<()> {
        let (loaded, values, original_id) = {
            let state = self.state.borrow();
            let original_id = state.original.get(&self.primary_key).and_then(value::as_id);
            (state.loaded, state.values.clone(), original_id)
        };

        if !loaded {
            let mut insert = ctx.query(&self.model)?;
            let mut row = self.state.borrow().original.clone();
            row.extend(values);
            for (field, v) in &row {
                insert = insert.value(field.as_str(), v.clone());
            }
            let id = insert.insert(ctx.store)?;
            row.insert(self.primary_key.clone(), Value::BigInt(Some(id)));
            log::debug!("inserted {} {}", meta.model(), id);
            self.finish_write(row);
        } else if !values.is_empty() {
            let Some(id) = original_id else {
                return Err(OrmError::Store(format!(
                    "loaded {} has no primary key",
                    meta.model()
                )));
            };
            let mut update = ctx.query(&self.model)?.key([id]);
            for (field, v) in &values {
                update = update.value(field.as_str(), v.clone());
            }
            update.update(ctx.store)?;
            log::debug!("updated {} {} ({} column(s))", meta.model(), id, values.len());
            let mut row = self.state.borrow().original.clone();
            row.extend(values);
            self.finish_write(row);
        } else {
            self.state.borrow_mut().loaded = true;
        }
        Ok(())
    }

    fn finish_write(&self, row: Row) {
        let mut state = self.state.borrow_mut();
        for column in state.values.keys().cloned().collect::<Vec<_>>() {
            state.changed.remove(&column);
        }
        state.values.clear();
        state.original = row;
        state.loaded = true;
    }

    fn commit_associations(&self) {
        let mut state = self.state.borrow_mut();
        let assigned = std::mem::take(&mut state.assigned);
        for (name, slot) in assigned {
            state.changed.remove(&name);
            let kept = match slot {
                Slot::One(One::Record(record)) => Some(Slot::One(One::Record(record))),
                Slot::One(One::Empty) => Some(Slot::One(One::Empty)),
                Slot::One(One::Key(_) | One::KeyWith(..)) => None,
                Slot::Many(mut collection) => {
                    collection.commit();
                    Some(Slot::Many(collection))
                }
                Slot::Parent(parent) => Some(Slot::Parent(parent)),
            };
            match kept {
                Some(slot) => {
                    state.retrieved.insert(name, slot);
                }
                None => {
                    state.retrieved.remove(&name);
                }
            }
        }
    }

    /// Apply dependent policies and delete the row
    pub fn delete(self: &Rc<Self>, ctx: &Context<'_>) -> Result<()> {
        if self.deleting.get() {
            return Ok(());
        }
        let _deleting = Raised::new(&self.deleting);
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::delete_span(&self.model).entered();

        let meta = ctx.meta(&self.model)?;
        let changed = self.changed();
        for (name, association) in meta.associations() {
            association.before_delete(ctx, self, changed.contains(name))?;
        }
        if let Some(id) = self.original(&self.primary_key).as_ref().and_then(value::as_id) {
            ctx.query(&self.model)?.key([id]).delete(ctx.store)?;
            log::debug!("deleted {} {}", meta.model(), id);
        }
        let mut state = self.state.borrow_mut();
        state.loaded = false;
        state.retrieved.clear();
        state.assigned.clear();
        Ok(())
    }

    /// Messages for this record and every related record reachable through
    /// association errors
    ///
    /// Collections contribute `"<Label> [<index>]: <messages>"` for each member
    /// with errors, to-one associations `"<Label>: <messages>"`. Members without
    /// errors contribute nothing; the index still counts every member from 0.
    pub fn messages_all(&self, ctx: &Context<'_>) -> Vec<String> {
        let errors = self.errors().clone();
        let meta = ctx.meta(&self.model).ok();
        let label = |attribute: &str| match meta {
            Some(meta) => meta.attribute_label(attribute),
            None => errors.attribute_label(Some(ctx), attribute),
        };

        let mut messages = Vec::new();
        for (attribute, _) in errors.iter() {
            match meta.and_then(|m| m.association(attribute)) {
                Some(Association::HasMany(_)) => {
                    let Some(collection) = self.cached_collection(attribute) else {
                        messages.extend(errors.messages(ctx, attribute));
                        continue;
                    };
                    for (index, member) in collection.members().iter().enumerate() {
                        let Some(record) = member.record() else { continue };
                        if record.errors().is_empty() {
                            continue;
                        }
                        messages.push(format!(
                            "{} [{}]: {}",
                            label(attribute),
                            index,
                            record.messages_all(ctx).join(", ")
                        ));
                    }
                }
                Some(Association::HasOne(_)) => match self.cached_one(attribute) {
                    Some(record) if !record.errors().is_empty() => {
                        messages.push(format!(
                            "{}: {}",
                            label(attribute),
                            record.messages_all(ctx).join(", ")
                        ));
                    }
                    Some(_) => {}
                    None => messages.extend(errors.messages(ctx, attribute)),
                },
                None => messages.extend(errors.messages(ctx, attribute)),
            }
        }
        messages
    }

    fn cached_one(&self, name: &str) -> Option<ModelRef> {
        let state = self.state.borrow();
        for slot in [state.retrieved.get(name), state.assigned.get(name)] {
            if let Some(Slot::One(One::Record(record))) = slot {
                return Some(record.clone());
            }
        }
        None
    }
}

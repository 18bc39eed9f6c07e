//! # Lifeline
//!
//! Association resolution and persistence cascades for a synchronous SQL model
//! layer built on SeaQuery.
//!
//! Models are declared as [`Meta`] values with fields, validation rules and
//! associations ([`HasOne`], [`HasMany`]) and registered once in a [`Registry`].
//! [`Record`]s are saved, validated and deleted through a [`Context`] that bundles
//! the registry, a [`Store`] and a [`MessageLookup`] for error messages:
//!
//! - has-one reassignment clears every row pointing at the owner before the new
//!   row is attached;
//! - has-many membership changes are reconciled with a diff and two bulk UPDATEs,
//!   optionally maintaining a count cache on the owner;
//! - [`Dependent`] policies decide what happens to related rows on delete;
//! - validation failures collect in each record's [`Errors`], and
//!   [`Record::messages_all`] flattens them across the object graph.

pub mod association;
pub mod config;
pub mod context;
pub mod error;
pub mod errors;
pub mod inflector;
pub mod meta;
pub mod metrics;
pub mod model;
pub mod query;
pub mod value;

pub use association::{
    Association, AssociationBase, AssociationHooks, CountCache, Dependent, HasMany, HasOne,
    Polymorphic,
};
pub use config::OrmConfig;
pub use context::Context;
pub use error::{OrmError, Result};
pub use errors::{Errors, MessageCatalog, MessageLookup, Param, Params};
pub use meta::{Field, Format, Length, Meta, Present, Registry, RegistryBuilder, Rule, Violation};
pub use model::{Collection, Member, ModelRef, One, Record};
pub use query::{
    row, Executor, Filter, Join, JoinKind, MemoryStore, Op, Operand, Query, Row, SqlStore, Store,
};

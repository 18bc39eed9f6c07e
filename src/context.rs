//! Operation context.
//!
//! Records and associations never reach for global state: every operation takes a
//! [`Context`] bundling the initialized [`Registry`], the [`Store`] statements are
//! sent to, and the message lookup used to render errors.

use crate::error::Result;
use crate::errors::{MessageCatalog, MessageLookup};
use crate::meta::{Meta, Registry};
use crate::query::{Query, Store};

static EMPTY_CATALOG: MessageCatalog = MessageCatalog::empty();

/// Borrowed collaborators for one unit of work
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub registry: &'a Registry,
    pub store: &'a dyn Store,
    pub messages: &'a dyn MessageLookup,
}

impl<'a> Context<'a> {
    /// Context without message templates; errors render as fallback tokens
    pub fn new(registry: &'a Registry, store: &'a dyn Store) -> Self {
        Self {
            registry,
            store,
            messages: &EMPTY_CATALOG,
        }
    }

    pub fn with_messages(mut self, messages: &'a dyn MessageLookup) -> Self {
        self.messages = messages;
        self
    }

    pub fn meta(&self, model: &str) -> Result<&'a Meta> {
        self.registry.meta(model)
    }

    /// Start a query on a registered model
    pub fn query(&self, model: &str) -> Result<Query> {
        Ok(Query::new(self.meta(model)?))
    }
}

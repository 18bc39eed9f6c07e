//! Process-wide model registry.
//!
//! The registry is assembled once with [`RegistryBuilder`]. `build()` checks the
//! declarations, initializes every association and freezes the result; afterwards
//! it is only read, through the [`Context`](crate::Context) handed to record and
//! association operations.

use super::Meta;
use crate::association::{Association, HasMany, HasOne};
use crate::config::OrmConfig;
use crate::error::{OrmError, Result};
use crate::inflector;
use std::collections::{BTreeMap, BTreeSet};

/// Foreign key value written on dissociation unless configured otherwise
pub const DEFAULT_FOREIGN_DEFAULT: i64 = 0;

/// Model names known while associations are initialized
#[derive(Debug, Default)]
pub(crate) struct ModelIndex {
    models: BTreeSet<String>,
    tables: BTreeMap<String, String>,
}

impl ModelIndex {
    /// Resolve a model name, a table name or a plural model name to a model
    pub(crate) fn resolve(&self, name: &str) -> Option<String> {
        if self.models.contains(name) {
            return Some(name.to_string());
        }
        if let Some(model) = self.tables.get(name) {
            return Some(model.clone());
        }
        let singular = inflector::singular(name);
        self.models.contains(&singular).then_some(singular)
    }
}

/// Read-only environment passed to association initialization
pub(crate) struct InitEnv<'a> {
    pub(crate) index: &'a ModelIndex,
    pub(crate) foreign_default: i64,
}

impl InitEnv<'_> {
    /// Resolve `name` or fail with a configuration error naming the association
    pub(crate) fn foreign_model(&self, model: &str, attribute: &str, name: &str) -> Result<String> {
        self.index.resolve(name).ok_or_else(|| {
            OrmError::configuration(format!(
                "association {model}->{attribute} refers to unknown model {name}"
            ))
        })
    }
}

/// Builder for [`Registry`]
///
/// # Example
///
/// ```
/// use lifeline::{HasMany, Meta, Registry};
///
/// let registry = Registry::builder()
///     .model(Meta::new("post").has_many("comments", HasMany::new()))
///     .model(Meta::new("comment"))
///     .build()
///     .expect("valid declarations");
/// assert_eq!(registry.has_many("post", "comments").unwrap().foreign_key_name(), "post_id");
/// ```
#[derive(Debug)]
pub struct RegistryBuilder {
    metas: Vec<Meta>,
    foreign_default: i64,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            metas: Vec::new(),
            foreign_default: DEFAULT_FOREIGN_DEFAULT,
        }
    }
}

impl RegistryBuilder {
    pub fn model(mut self, meta: Meta) -> Self {
        self.metas.push(meta);
        self
    }

    /// Value written into has-many foreign keys on dissociation, for every
    /// association that does not set its own
    pub fn foreign_default(mut self, value: i64) -> Self {
        self.foreign_default = value;
        self
    }

    /// Apply registry-wide settings from loaded configuration
    pub fn config(self, config: &OrmConfig) -> Self {
        self.foreign_default(config.foreign_default)
    }

    /// Validate declarations and initialize all associations
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` for a model registered twice, an attribute
    /// declared twice, an association to an unknown model, or a count cache on a
    /// polymorphic association.
    pub fn build(self) -> Result<Registry> {
        let mut index = ModelIndex::default();
        for meta in &self.metas {
            if !index.models.insert(meta.model().to_string()) {
                return Err(OrmError::configuration(format!(
                    "model {} is registered twice",
                    meta.model()
                )));
            }
            index
                .tables
                .insert(meta.table().to_string(), meta.model().to_string());
        }

        let env = InitEnv {
            index: &index,
            foreign_default: self.foreign_default,
        };
        let mut metas = BTreeMap::new();
        for mut meta in self.metas {
            meta.initialize(&env)?;
            log::debug!(
                "registered model {} (table {}, {} associations)",
                meta.model(),
                meta.table(),
                meta.associations().count()
            );
            metas.insert(meta.model().to_string(), meta);
        }

        Ok(Registry {
            metas,
            foreign_default: self.foreign_default,
        })
    }
}

/// Initialized model metadata, keyed by model name
#[derive(Debug)]
pub struct Registry {
    metas: BTreeMap<String, Meta>,
    foreign_default: i64,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn meta(&self, model: &str) -> Result<&Meta> {
        self.metas
            .get(model)
            .ok_or_else(|| OrmError::UnknownModel(model.to_string()))
    }

    pub fn association(&self, model: &str, name: &str) -> Result<&Association> {
        self.meta(model)?
            .association(name)
            .ok_or_else(|| OrmError::UnknownAssociation {
                model: model.to_string(),
                name: name.to_string(),
            })
    }

    pub fn has_one(&self, model: &str, name: &str) -> Result<&HasOne> {
        match self.association(model, name)? {
            Association::HasOne(association) => Ok(association),
            Association::HasMany(_) => Err(OrmError::UnknownAssociation {
                model: model.to_string(),
                name: name.to_string(),
            }),
        }
    }

    pub fn has_many(&self, model: &str, name: &str) -> Result<&HasMany> {
        match self.association(model, name)? {
            Association::HasMany(association) => Ok(association),
            Association::HasOne(_) => Err(OrmError::UnknownAssociation {
                model: model.to_string(),
                name: name.to_string(),
            }),
        }
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.metas.keys().map(String::as_str)
    }

    pub fn foreign_default(&self) -> i64 {
        self.foreign_default
    }
}

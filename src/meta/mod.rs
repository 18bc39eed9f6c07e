//! Model metadata: table naming, fields, validation rules and associations.
//!
//! A [`Meta`] is declared once per model with a builder API and handed to the
//! [`RegistryBuilder`]. Building the registry initializes every association, which
//! fills in the naming-convention defaults and may register companion fields (a
//! count cache column, for example) on the owning meta.
//!
//! # Example
//!
//! ```
//! use lifeline::{Field, HasMany, HasOne, Meta, Present};
//!
//! let post = Meta::new("post")
//!     .field(Field::string("title").label("Headline"))
//!     .rule("title", Present)
//!     .has_one("cover", HasOne::new().foreign_model("image"))
//!     .has_many("comments", HasMany::new().count_cache());
//! assert_eq!(post.table(), "posts");
//! assert_eq!(post.foreign_key(), "post_id");
//! ```

pub mod registry;
pub mod rules;

pub use registry::{Registry, RegistryBuilder};
pub use rules::{Format, Length, Present, Rule, Violation};

use crate::association::{Association, HasMany, HasOne};
use crate::error::{OrmError, Result};
use crate::inflector;
use crate::value;
use registry::InitEnv;
use sea_query::Value;
use std::collections::BTreeSet;

/// Column declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    label: Option<String>,
    default: Value,
    allow_null: bool,
}

impl Field {
    /// Nullable integer column
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            default: value::null_key(),
            allow_null: true,
        }
    }

    /// Nullable text column
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            default: value::null_text(),
            allow_null: true,
        }
    }

    /// Human readable label used in error messages
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Value a new record starts with
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allow_null(&self) -> bool {
        self.allow_null
    }
}

/// Metadata for one model
#[derive(Debug)]
pub struct Meta {
    model: String,
    table: String,
    primary_key: String,
    name_key: String,
    foreign_key: String,
    errors_domain: String,
    fields: Vec<Field>,
    associations: Vec<(String, Association)>,
    rules: Vec<(String, Box<dyn Rule>)>,
}

impl Meta {
    /// Declare a model with conventional defaults
    ///
    /// The table is the plural of the model name, the primary key `id`, the name
    /// key `name` and the foreign key other tables use to point here `<model>_id`.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            table: inflector::plural(&model),
            primary_key: "id".to_string(),
            name_key: "name".to_string(),
            foreign_key: format!("{model}_id"),
            errors_domain: model.clone(),
            model,
            fields: Vec::new(),
            associations: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Column matched when a record is looked up by a non-integer key
    pub fn with_name_key(mut self, name_key: impl Into<String>) -> Self {
        self.name_key = name_key.into();
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = foreign_key.into();
        self
    }

    /// Message catalog domain used when rendering this model's errors
    pub fn with_errors_domain(mut self, domain: impl Into<String>) -> Self {
        self.errors_domain = domain.into();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn has_one(mut self, name: impl Into<String>, association: HasOne) -> Self {
        self.associations
            .push((name.into(), Association::HasOne(association)));
        self
    }

    pub fn has_many(mut self, name: impl Into<String>, association: HasMany) -> Self {
        self.associations
            .push((name.into(), Association::HasMany(association)));
        self
    }

    /// Attach a validation rule to an attribute; rules run in declaration order
    pub fn rule(mut self, attribute: impl Into<String>, rule: impl Rule + 'static) -> Self {
        self.rules.push((attribute.into(), Box::new(rule)));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn name_key(&self) -> &str {
        &self.name_key
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn errors_domain(&self) -> &str {
        &self.errors_domain
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Associations in declaration order
    pub fn associations(&self) -> impl Iterator<Item = (&str, &Association)> {
        self.associations.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, &dyn Rule)> {
        self.rules.iter().map(|(n, r)| (n.as_str(), r.as_ref()))
    }

    /// Label for an attribute: the field label, or the humanized attribute name,
    /// with the first letter uppercased
    pub fn attribute_label(&self, attribute: &str) -> String {
        let label = self
            .find_field(attribute)
            .and_then(|f| f.label.clone())
            .unwrap_or_else(|| inflector::humanize(attribute));
        inflector::ucfirst(&label)
    }

    /// Values a freshly built record starts with
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(|f| !value::is_null(&f.default))
            .map(|f| (f.name.as_str(), &f.default))
    }

    /// Register a field unless one with the same name was declared
    pub(crate) fn ensure_field(&mut self, field: Field) {
        if self.find_field(&field.name).is_none() {
            self.fields.push(field);
        }
    }

    pub(crate) fn initialize(&mut self, env: &InitEnv<'_>) -> Result<()> {
        let mut seen = BTreeSet::new();
        let names = self
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.associations.iter().map(|(n, _)| n.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(OrmError::configuration(format!(
                    "attribute {}->{} is declared twice",
                    self.model, name
                )));
            }
        }

        let mut associations = std::mem::take(&mut self.associations);
        let result = associations
            .iter_mut()
            .try_for_each(|(name, association)| association.initialize(self, name, env));
        self.associations = associations;
        result
    }
}

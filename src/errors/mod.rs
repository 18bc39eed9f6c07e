//! Per-record validation error collection.
//!
//! [`Errors`] maps attributes to error codes and their parameters, keeping the
//! order in which attributes first failed. Entries are only ever written through
//! [`Errors::add`]; rendering turns them into messages through a
//! [`MessageLookup`] with a three step fallback:
//!
//! 1. `<domain> / <attribute>.<code>` (the model's own templates)
//! 2. `<generic domain> / <code>` (shared templates, `validators` by default)
//! 3. the literal token `<domain>:<attribute>.<code>`
//!
//! Named parameters (`:minimum`) are substituted into the template, together with
//! the computed `:model` and `:attribute` (the attribute label).

pub mod messages;

pub use messages::{MessageCatalog, MessageLookup, GENERIC_DOMAIN};

use crate::context::Context;
use crate::inflector;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

/// A single message parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    /// Errors of a related record, rendered as their joined messages
    Errors(Box<Errors>),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<Errors> for Param {
    fn from(value: Errors) -> Self {
        Param::Errors(Box::new(value))
    }
}

/// Named parameters of one error; names are stored without the leading `:`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, Param>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, param: impl Into<Param>) -> Self {
        self.0
            .insert(name.trim_start_matches(':').to_string(), param.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.get(name.trim_start_matches(':'))
    }

    /// Text value of a parameter
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Param::Text(text) => Some(text.clone()),
            Param::Errors(_) => None,
        }
    }

    /// Nested errors carried by an `association` error
    pub fn errors(&self) -> Option<&Errors> {
        match self.get("errors")? {
            Param::Errors(errors) => Some(errors),
            Param::Text(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Errors of one record
///
/// # Example
///
/// ```
/// use lifeline::{Errors, Params};
///
/// let mut errors = Errors::new("post", "post");
/// errors.add("title", "present", Params::new());
/// assert_eq!(errors.len(), 1);
/// assert!(errors.contains("title"));
/// assert!(errors["body"].is_empty());
/// assert_eq!(errors.to_string(), "post:title.present");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors {
    model: String,
    domain: String,
    entries: Vec<(String, Vec<(String, Params)>)>,
}

impl Errors {
    pub fn new(model: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            domain: domain.into(),
            entries: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Record `code` on `attribute`; adding a code again replaces its parameters
    pub fn add(&mut self, attribute: &str, code: &str, params: Params) -> &mut Self {
        let index = match self.entries.iter().position(|(a, _)| a == attribute) {
            Some(index) => index,
            None => {
                self.entries.push((attribute.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        let bucket = &mut self.entries[index].1;
        match bucket.iter_mut().find(|(c, _)| c == code) {
            Some(existing) => existing.1 = params,
            None => bucket.push((code.to_string(), params)),
        }
        self
    }

    /// Errors on one attribute, in the order they were added
    pub fn get(&self, attribute: &str) -> Option<&[(String, Params)]> {
        self.entries
            .iter()
            .find(|(a, _)| a == attribute)
            .map(|(_, bucket)| bucket.as_slice())
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.get(attribute).is_some()
    }

    /// Attributes with their errors, in the order attributes first failed
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, Params)])> {
        self.entries
            .iter()
            .map(|(a, bucket)| (a.as_str(), bucket.as_slice()))
    }

    /// Number of attributes with errors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, attribute: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(a, _)| a != attribute);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rendered messages for one attribute
    pub fn messages(&self, ctx: &Context<'_>, attribute: &str) -> Vec<String> {
        self.get(attribute)
            .unwrap_or(&[])
            .iter()
            .map(|(code, params)| self.message(ctx.messages, Some(ctx), attribute, code, params))
            .collect()
    }

    /// Rendered messages for every attribute
    pub fn messages_by_attribute(&self, ctx: &Context<'_>) -> Vec<(String, Vec<String>)> {
        self.entries
            .iter()
            .map(|(attribute, _)| (attribute.clone(), self.messages(ctx, attribute)))
            .collect()
    }

    /// Every message joined with `", "`
    pub fn render(&self, ctx: &Context<'_>) -> String {
        self.entries
            .iter()
            .flat_map(|(attribute, _)| self.messages(ctx, attribute))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Label for an attribute, from the registry when it knows the model
    pub fn attribute_label(&self, ctx: Option<&Context<'_>>, attribute: &str) -> String {
        match ctx.and_then(|ctx| ctx.registry.meta(&self.model).ok()) {
            Some(meta) => meta.attribute_label(attribute),
            None => inflector::ucfirst(&inflector::humanize(attribute)),
        }
    }

    fn message(
        &self,
        lookup: &dyn MessageLookup,
        ctx: Option<&Context<'_>>,
        attribute: &str,
        code: &str,
        params: &Params,
    ) -> String {
        let template = lookup
            .lookup(&self.domain, Some(attribute), code)
            .or_else(|| lookup.lookup(lookup.generic_domain(), None, code));
        let Some(template) = template else {
            return format!("{}:{}.{}", self.domain, attribute, code);
        };

        let mut values: BTreeMap<&str, String> = BTreeMap::new();
        values.insert("model", inflector::humanize(&self.model));
        values.insert("attribute", self.attribute_label(ctx, attribute));
        for (name, param) in params.iter() {
            let rendered = match param {
                Param::Text(text) => text.clone(),
                Param::Errors(nested) => match ctx {
                    Some(ctx) => nested.render(ctx),
                    None => nested.to_string(),
                },
            };
            values.insert(name, rendered);
        }
        substitute(&template, &values)
    }

    /// Structured export: attribute -> code -> parameters
    pub fn to_json(&self) -> serde_json::Value {
        let mut attributes = serde_json::Map::new();
        for (attribute, bucket) in &self.entries {
            let mut codes = serde_json::Map::new();
            for (code, params) in bucket {
                let mut values = serde_json::Map::new();
                for (name, param) in params.iter() {
                    let value = match param {
                        Param::Text(text) => json!(text),
                        Param::Errors(nested) => nested.to_json(),
                    };
                    values.insert(name.to_string(), value);
                }
                codes.insert(code.clone(), serde_json::Value::Object(values));
            }
            attributes.insert(attribute.clone(), serde_json::Value::Object(codes));
        }
        serde_json::Value::Object(attributes)
    }
}

/// Replace `:name` tokens with their values; unknown tokens are kept
fn substitute(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        match values.get(&after[..len]) {
            Some(value) if len > 0 => out.push_str(value),
            _ => {
                out.push(':');
                out.push_str(&after[..len]);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

impl fmt::Display for Errors {
    /// Renders without templates, as fallback tokens
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let empty = MessageCatalog::empty();
        let rendered: Vec<String> = self
            .entries
            .iter()
            .flat_map(|(attribute, bucket)| {
                bucket
                    .iter()
                    .map(|(code, params)| self.message(&empty, None, attribute, code, params))
                    .collect::<Vec<_>>()
            })
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

impl Index<&str> for Errors {
    type Output = [(String, Params)];

    fn index(&self, attribute: &str) -> &Self::Output {
        self.get(attribute).unwrap_or(&[])
    }
}

impl IndexMut<&str> for Errors {
    fn index_mut(&mut self, attribute: &str) -> &mut Self::Output {
        panic!("Cannot set the errors directly, must use add() method (attribute {attribute:?})")
    }
}

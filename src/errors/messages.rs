//! Message templates for rendered validation errors.

use crate::error::{OrmError, Result};
use config::{Config, File};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Domain consulted for code-only templates
pub const GENERIC_DOMAIN: &str = "validators";

/// Source of message templates
///
/// `attribute = None` asks for a code-only template (`"present"`); otherwise the
/// key is `"<attribute>.<code>"`.
pub trait MessageLookup {
    fn lookup(&self, domain: &str, attribute: Option<&str>, code: &str) -> Option<String>;

    /// Domain holding the generic per-code templates
    fn generic_domain(&self) -> &str {
        GENERIC_DOMAIN
    }
}

/// In-memory template catalog: domain -> key -> template
///
/// # Example
///
/// ```
/// use lifeline::{MessageCatalog, MessageLookup};
///
/// let catalog = MessageCatalog::new()
///     .with("post", "title.present", "A post needs a title")
///     .with("validators", "present", ":attribute must not be empty");
/// assert_eq!(
///     catalog.lookup("post", Some("title"), "present").as_deref(),
///     Some("A post needs a title")
/// );
/// assert!(catalog.lookup("post", Some("body"), "present").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCatalog {
    entries: BTreeMap<String, BTreeMap<String, String>>,
    generic_domain: Cow<'static, str>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl MessageCatalog {
    /// Catalog without templates
    pub const fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            generic_domain: Cow::Borrowed(GENERIC_DOMAIN),
        }
    }

    pub fn new() -> Self {
        Self::empty()
    }

    pub fn with(mut self, domain: &str, key: &str, template: &str) -> Self {
        self.insert(domain, key, template);
        self
    }

    pub fn insert(&mut self, domain: &str, key: &str, template: &str) {
        self.entries
            .entry(domain.to_string())
            .or_default()
            .insert(key.to_string(), template.to_string());
    }

    pub fn set_generic_domain(&mut self, domain: impl Into<String>) {
        self.generic_domain = Cow::Owned(domain.into());
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load templates from a TOML, JSON or YAML file
    ///
    /// Top-level tables are domains; nested tables are flattened into dotted keys,
    /// so `[post] title.present = "..."` and `[post.title] present = "..."` both
    /// define `post / title.present`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` if the file cannot be read or parsed, or
    /// a template is not a string.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .map_err(|e| OrmError::configuration(format!("cannot load messages from {path}: {e}")))?;
        let tree: serde_json::Value = settings
            .try_deserialize()
            .map_err(|e| OrmError::configuration(format!("invalid messages file {path}: {e}")))?;

        let serde_json::Value::Object(domains) = tree else {
            return Err(OrmError::configuration(format!(
                "messages file {path} must contain tables"
            )));
        };
        let mut catalog = Self::new();
        for (domain, node) in domains {
            let mut flat = Vec::new();
            flatten(&node, String::new(), &mut flat).map_err(|key| {
                OrmError::configuration(format!(
                    "message {domain}/{key} in {path} is not a string"
                ))
            })?;
            for (key, template) in flat {
                catalog.insert(&domain, &key, &template);
            }
        }
        log::debug!("loaded {} message template(s) from {}", catalog.len(), path);
        Ok(catalog)
    }
}

fn flatten(
    node: &serde_json::Value,
    prefix: String,
    out: &mut Vec<(String, String)>,
) -> std::result::Result<(), String> {
    match node {
        serde_json::Value::String(template) => {
            out.push((prefix, template.clone()));
            Ok(())
        }
        serde_json::Value::Object(children) => {
            for (key, child) in children {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(child, path, out)?;
            }
            Ok(())
        }
        _ => Err(prefix),
    }
}

impl MessageLookup for MessageCatalog {
    fn lookup(&self, domain: &str, attribute: Option<&str>, code: &str) -> Option<String> {
        let templates = self.entries.get(domain)?;
        match attribute {
            Some(attribute) => templates.get(&format!("{attribute}.{code}")).cloned(),
            None => templates.get(code).cloned(),
        }
    }

    fn generic_domain(&self) -> &str {
        &self.generic_domain
    }
}

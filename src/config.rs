//! Settings for the model layer.
//!
//! [`OrmConfig`] is read from `config/lifeline.toml` (section `[orm]`) and from
//! `LIFELINE__ORM__*` environment variables, e.g. `LIFELINE__ORM__FOREIGN_DEFAULT=-1`.

use crate::errors::{MessageCatalog, GENERIC_DOMAIN};
use crate::meta::registry::DEFAULT_FOREIGN_DEFAULT;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/lifeline.toml";
const ENV_PREFIX: &str = "LIFELINE";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OrmConfig {
    /// Message template file loaded by [`OrmConfig::messages`]
    #[serde(default)]
    pub messages_file: Option<String>,
    /// Domain holding the generic per-code templates
    #[serde(default = "default_generic_domain")]
    pub generic_domain: String,
    /// Value written into has-many foreign keys on dissociation
    #[serde(default = "default_foreign_default")]
    pub foreign_default: i64,
}

fn default_generic_domain() -> String {
    GENERIC_DOMAIN.to_string()
}

fn default_foreign_default() -> i64 {
    DEFAULT_FOREIGN_DEFAULT
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            messages_file: None,
            generic_domain: default_generic_domain(),
            foreign_default: default_foreign_default(),
        }
    }
}

impl OrmConfig {
    /// Load from `config/lifeline.toml`, falling back to env vars
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load from the given file (optional) and the environment
    ///
    /// A file that exists but cannot be parsed is skipped with a warning and the
    /// environment alone is used. A missing `[orm]` section yields the defaults.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(path).exists() {
                    log::warn!("failed to load {path}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<OrmConfig>("orm") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "ORM configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    /// Message catalog from `messages_file`, or an empty one
    pub fn messages(&self) -> crate::Result<MessageCatalog> {
        let mut catalog = match &self.messages_file {
            Some(path) => MessageCatalog::load(path)?,
            None => MessageCatalog::new(),
        };
        catalog.set_generic_domain(self.generic_domain.clone());
        Ok(catalog)
    }
}

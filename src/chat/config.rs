//! Configuration types for the chat application.
//!
//! Settings come from a YAML file parsed with `serde_yaml`; a few can be
//! overridden on the command line via `arrrg`.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::registry::ProviderRegistry;
use crate::store::{ConversationStore, MAX_EXPIRY_HOURS};
use crate::types::ProviderEntry;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Prefix marking an `api_key` that names an environment variable.
const ENV_KEY_PREFIX: &str = "env:";

/// Command-line arguments for the palaver tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path of the YAML configuration file.
    #[arrrg(optional, "Configuration file (default: config.yaml)", "PATH")]
    pub config: Option<String>,

    /// Provider to start with instead of the configured default.
    #[arrrg(optional, "Provider to use for this run", "PROVIDER")]
    pub provider: Option<String>,

    /// Force debug output on.
    #[arrrg(flag, "Show underlying error causes")]
    pub debug: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

impl ChatArgs {
    /// Returns the configuration path to load.
    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(self.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE))
    }
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_conversation_file() -> PathBuf {
    PathBuf::from("conversation.json")
}

fn default_expiry_hours() -> f64 {
    24.0
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// The system prompt of every fresh conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// The provider a fresh conversation starts with.
    pub default_provider: String,

    /// Every provider that can be switched to.
    pub providers_map: BTreeMap<String, ProviderEntry>,

    /// Where the conversation is persisted.
    #[serde(default = "default_conversation_file")]
    pub conversation_file: PathBuf,

    /// Hours of inactivity after which a saved conversation is dropped.
    #[serde(default = "default_expiry_hours")]
    pub conversation_expiry_hours: f64,

    /// Whether underlying error causes are shown.
    #[serde(default)]
    pub debug: bool,
}

impl ChatConfig {
    /// Loads and validates a configuration file.
    ///
    /// A relative `conversation_file` is resolved against the directory
    /// holding the configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(
                format!("failed to read configuration file {}", path.display()),
                err,
            )
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&content, base_dir)
    }

    /// Parses and validates configuration text.
    pub fn from_yaml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(content)?;
        if config.conversation_file.is_relative() {
            config.conversation_file = base_dir.join(&config.conversation_file);
        }
        config.resolve_env_keys(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides.
    pub fn apply_args(&mut self, args: &ChatArgs) -> Result<()> {
        if let Some(provider) = &args.provider {
            self.default_provider = match self.registry().lookup(provider) {
                Ok((name, _)) => name.to_string(),
                Err(_) => provider.clone(),
            };
        }
        if args.debug {
            self.debug = true;
        }
        self.validate()
    }

    /// Checks the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if !self.providers_map.contains_key(&self.default_provider) {
            let known: Vec<&str> = self.providers_map.keys().map(String::as_str).collect();
            return Err(Error::configuration(
                format!(
                    "default provider '{}' is not one of: {}",
                    self.default_provider,
                    known.join(", ")
                ),
                Some("default_provider".to_string()),
            ));
        }
        for (name, entry) in &self.providers_map {
            if name.is_empty() || name.contains('/') {
                return Err(Error::configuration(
                    format!("provider name '{name}' must be non-empty and contain no '/'"),
                    Some("providers_map".to_string()),
                ));
            }
            if entry.model.is_empty() {
                return Err(Error::configuration(
                    format!("provider '{name}' has no model"),
                    Some(format!("providers_map.{name}.model")),
                ));
            }
            Url::parse(&entry.base_url).map_err(|err| {
                Error::configuration(
                    format!("provider '{name}' has an invalid base_url: {err}"),
                    Some(format!("providers_map.{name}.base_url")),
                )
            })?;
        }
        let hours = self.conversation_expiry_hours;
        if !hours.is_finite() || hours <= 0.0 || hours > MAX_EXPIRY_HOURS {
            return Err(Error::configuration(
                format!(
                    "conversation_expiry_hours must be a positive number up to {MAX_EXPIRY_HOURS}"
                ),
                Some("conversation_expiry_hours".to_string()),
            ));
        }
        Ok(())
    }

    /// Returns the `"<provider>/<model-id>"` string of the default provider.
    pub fn default_model(&self) -> Result<String> {
        self.registry().qualified_model(&self.default_provider)
    }

    /// Builds the provider registry.
    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::new(self.providers_map.clone())
    }

    /// Builds the conversation store.
    pub fn store(&self) -> Result<ConversationStore> {
        Ok(ConversationStore::new(
            self.conversation_file.clone(),
            self.conversation_expiry_hours,
            self.system_prompt.clone(),
            self.default_model()?,
        ))
    }

    fn resolve_env_keys<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, entry) in self.providers_map.iter_mut() {
            if let Some(var) = entry.api_key.strip_prefix(ENV_KEY_PREFIX) {
                entry.api_key = lookup(var).ok_or_else(|| {
                    Error::configuration(
                        format!("environment variable {var} for provider '{name}' is not set"),
                        Some(format!("providers_map.{name}.api_key")),
                    )
                })?;
            }
        }
        Ok(())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection parameters for one named provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// The model id requested from this provider.
    pub model: String,

    /// The credential sent as a bearer token. Empty for backends without auth.
    #[serde(default)]
    pub api_key: String,

    /// The base URL of the provider's OpenAI-compatible API.
    pub base_url: String,
}

impl ProviderEntry {
    /// Create a new `ProviderEntry`.
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("ProviderEntry")
            .field("model", &self.model)
            .field("api_key", &api_key)
            .field("base_url", &self.base_url)
            .finish()
    }
}

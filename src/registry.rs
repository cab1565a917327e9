//! Named providers and their connection parameters.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::ProviderEntry;

/// Read-only map from provider name to [`ProviderEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    /// Creates a registry from a provider map.
    pub fn new(providers: BTreeMap<String, ProviderEntry>) -> Self {
        Self { providers }
    }

    /// Looks up a provider and returns its registered name with the entry.
    ///
    /// An exact match wins. Otherwise the name is compared ignoring ASCII
    /// case, and it must match exactly one registered provider.
    pub fn lookup(&self, name: &str) -> Result<(&str, &ProviderEntry)> {
        if let Some((key, entry)) = self.providers.get_key_value(name) {
            return Ok((key.as_str(), entry));
        }
        let mut matches = self
            .providers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some((key, entry)), None) => Ok((key.as_str(), entry)),
            _ => Err(Error::unknown_provider(name, self.names())),
        }
    }

    /// Looks up a provider by name, ignoring ASCII case.
    pub fn resolve(&self, name: &str) -> Result<&ProviderEntry> {
        self.lookup(name).map(|(_, entry)| entry)
    }

    /// Returns the `"<provider>/<model-id>"` string for a registered provider,
    /// spelled the way the provider is registered.
    pub fn qualified_model(&self, name: &str) -> Result<String> {
        let (name, entry) = self.lookup(name)?;
        Ok(format!("{name}/{}", entry.model))
    }

    /// Returns true if `name` resolves to a registered provider.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Returns the registered provider names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Iterates over providers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderEntry)> {
        self.providers
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Returns the number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl FromIterator<(String, ProviderEntry)> for ProviderRegistry {
    fn from_iter<I: IntoIterator<Item = (String, ProviderEntry)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

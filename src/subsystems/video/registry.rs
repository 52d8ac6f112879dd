//! Configured providers, in configuration order.

use crate::config::ProviderConfig;

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
    /// As configured; may name a provider that does not exist.
    default_provider_id: String,
}

impl ProviderRegistry {
    /// `providers` must already have unique ids (the config loader
    /// guarantees this).
    pub fn new(providers: Vec<ProviderConfig>, default_provider_id: impl Into<String>) -> Self {
        Self {
            providers,
            default_provider_id: default_provider_id.into().trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    pub fn get(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider_id == provider_id)
    }

    pub fn default_provider_id(&self) -> &str {
        &self.default_provider_id
    }

    /// Pick the provider for a request.
    ///
    /// A non-blank id must match exactly. A blank id falls back to the
    /// configured default (when it exists) and then to the first provider.
    pub fn resolve(&self, provider_id: &str) -> Option<&ProviderConfig> {
        let provider_id = provider_id.trim();
        if !provider_id.is_empty() {
            return self.get(provider_id);
        }
        if !self.default_provider_id.is_empty()
            && let Some(p) = self.get(&self.default_provider_id)
        {
            return Some(p);
        }
        self.providers.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(default_id: &str) -> ProviderRegistry {
        ProviderRegistry::new(
            vec![
                ProviderConfig::new("veo", "https://veo.example"),
                ProviderConfig::new("sora", "https://sora.example"),
            ],
            default_id,
        )
    }

    #[test]
    fn explicit_id_must_exist() {
        let r = registry("");
        assert_eq!(r.resolve(" sora ").map(|p| p.provider_id.as_str()), Some("sora"));
        assert!(r.resolve("grok").is_none());
    }

    #[test]
    fn blank_id_uses_default_then_first() {
        assert_eq!(registry("sora").resolve("").unwrap().provider_id, "sora");
        assert_eq!(registry("").resolve("  ").unwrap().provider_id, "veo");
        assert_eq!(registry("missing").resolve("").unwrap().provider_id, "veo");
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let r = ProviderRegistry::new(Vec::new(), "veo");
        assert!(r.is_empty());
        assert!(r.resolve("").is_none());
        assert!(r.resolve("veo").is_none());
    }

    #[test]
    fn iteration_keeps_config_order() {
        let ids: Vec<_> = registry("").iter().map(|p| p.provider_id.clone()).collect();
        assert_eq!(ids, ["veo", "sora"]);
    }
}

//! Provider registry for managing LLM provider instances.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::openai::OpenAICompatibleProvider;
use super::provider::{LLMProvider, Provider};
use crate::config::{Credentials, GatewayConfig};

/// Registry of LLM providers, keyed by provider type.
///
/// Only providers with a credential are registered, so an empty registry
/// means nothing upstream is reachable.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every provider that has a credential.
    pub fn from_config(gateway: &GatewayConfig, credentials: &Credentials) -> Self {
        let mut registry = Self::new();
        let client = Client::new();
        let gateway_url = gateway.base_url.as_deref();

        if gateway_key_unused(gateway_url, credentials) {
            warn!(
                "AI_GATEWAY_API_KEY is set but no gateway is configured; the key is ignored. \
                Set AI_GATEWAY_URL or gateway.base_url to route through the gateway."
            );
        }

        for provider in Provider::ALL {
            let Some(api_key) = credentials.for_provider(provider, gateway_url.is_some()) else {
                continue;
            };
            let api_key = api_key.to_string();
            let base_url = provider.base_url(gateway_url);

            let implementation: Arc<dyn LLMProvider> = match provider {
                Provider::Anthropic => {
                    Arc::new(AnthropicProvider::new(client.clone(), api_key, base_url.clone()))
                }
                Provider::Google => {
                    Arc::new(GoogleProvider::new(client.clone(), api_key, base_url.clone()))
                }
                Provider::OpenAI => Arc::new(OpenAICompatibleProvider::new(
                    client.clone(),
                    base_url.clone(),
                    Some(api_key),
                )),
            };

            registry.register(provider, implementation);
            info!(provider = %provider, base_url = %base_url, "Registered provider");
        }

        if registry.is_empty() {
            warn!(
                "No LLM providers configured; serving demo replies. \
                Set ANTHROPIC_API_KEY, GOOGLE_API_KEY, or OPENAI_API_KEY."
            );
        }

        registry
    }

    /// Register a provider implementation.
    pub fn register(&mut self, provider: Provider, implementation: Arc<dyn LLMProvider>) {
        self.providers.insert(provider, implementation);
    }

    /// Get a provider by type.
    pub fn get(&self, provider: &Provider) -> Option<Arc<dyn LLMProvider>> {
        self.providers.get(provider).cloned()
    }

    /// True when no provider has a credential.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// The gateway key only serves traffic routed through a gateway.
fn gateway_key_unused(gateway_url: Option<&str>, credentials: &Credentials) -> bool {
    credentials.gateway.is_some() && gateway_url.is_none()
}

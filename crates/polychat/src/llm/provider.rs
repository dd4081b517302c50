//! LLM provider trait and provider kinds.

use std::fmt;

use async_trait::async_trait;

use super::error::LLMError;
use super::types::{ChatStream, CompletionRequest};

/// Capability shared by every upstream client: turn a conversation into text.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a streaming completion.
    ///
    /// Returns once the upstream has accepted the request; text fragments
    /// arrive on the returned stream in order.
    async fn chat_stream(&self, request: CompletionRequest) -> Result<ChatStream, LLMError>;
}

/// Supported upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    Google,
    OpenAI,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Anthropic, Provider::Google, Provider::OpenAI];

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Path segment used when routing through a shared gateway.
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::OpenAI => "openai",
        }
    }

    /// The provider's own API base, including its version prefix.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    /// Resolve the base URL, rewriting it to `{gateway}/v1/{segment}` when a
    /// gateway is configured.
    pub fn base_url(&self, gateway_base_url: Option<&str>) -> String {
        match gateway_base_url {
            Some(gateway) => format!(
                "{}/v1/{}",
                gateway.trim_end_matches('/'),
                self.endpoint_segment()
            ),
            None => self.default_base_url().to_string(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::Provider;

/// Environment variable overriding `gateway.base_url`.
pub const GATEWAY_URL_ENV: &str = "AI_GATEWAY_URL";
/// Environment variable holding a key accepted by the gateway for any provider.
pub const GATEWAY_API_KEY_ENV: &str = "AI_GATEWAY_API_KEY";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = non_empty(lookup(GATEWAY_URL_ENV)) {
            self.gateway.base_url = Some(url);
        }
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Maximum silence between two upstream fragments on `/chat/stream`.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            keep_alive_interval_seconds: default_keep_alive_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    120
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_keep_alive_interval() -> u64 {
    15
}

// ============================================================================
// GatewayConfig
// ============================================================================

/// Optional shared gateway in front of every provider.
///
/// When `base_url` is set, each provider is reached at
/// `{base_url}/v1/{endpoint_segment}` instead of its own API host.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

// ============================================================================
// GenerationConfig
// ============================================================================

/// Sampling limits sent with every completion.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    2000
}

// ============================================================================
// Credentials
// ============================================================================

/// Provider API keys, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub anthropic: Option<String>,
    pub google: Option<String>,
    pub openai: Option<String>,
    /// Gateway-wide key, used for providers without their own key.
    pub gateway: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            anthropic: non_empty(lookup("ANTHROPIC_API_KEY")),
            google: non_empty(lookup("GOOGLE_API_KEY"))
                .or_else(|| non_empty(lookup("GEMINI_API_KEY"))),
            openai: non_empty(lookup("OPENAI_API_KEY")),
            gateway: non_empty(lookup(GATEWAY_API_KEY_ENV)),
        }
    }

    /// Key to use for `provider`. The gateway key only applies when traffic is
    /// routed through the gateway.
    pub fn for_provider(&self, provider: Provider, via_gateway: bool) -> Option<&str> {
        let own = match provider {
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::Google => self.google.as_deref(),
            Provider::OpenAI => self.openai.as_deref(),
        };
        own.or_else(|| {
            if via_gateway {
                self.gateway.as_deref()
            } else {
                None
            }
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(key: &Option<String>) -> &'static str {
            if key.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("anthropic", &mask(&self.anthropic))
            .field("google", &mask(&self.google))
            .field("openai", &mask(&self.openai))
            .field("gateway", &mask(&self.gateway))
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

// ============================================================================
// Tests
// ============================================================================

//! Static table of logical model identifiers.

use thiserror::Error;

use crate::llm::Provider;

/// An immutable mapping from a logical model id to an upstream model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Logical key callers select (`claude`, `gemini`, ...).
    pub id: &'static str,
    pub display_name: &'static str,
    pub provider: Provider,
    /// Model string passed verbatim to the provider.
    pub upstream_model: &'static str,
}

impl ModelConfig {
    pub fn provider_name(&self) -> &'static str {
        self.provider.display_name()
    }

    pub fn endpoint_segment(&self) -> &'static str {
        self.provider.endpoint_segment()
    }
}

/// Models available out of the box, in picker order.
const BUILTIN_MODELS: [ModelConfig; 3] = [
    ModelConfig {
        id: "claude",
        display_name: "Claude 3.5 Sonnet",
        provider: Provider::Anthropic,
        upstream_model: "claude-3-5-sonnet-20241022",
    },
    ModelConfig {
        id: "gemini",
        display_name: "Gemini 1.5 Pro",
        provider: Provider::Google,
        upstream_model: "gemini-1.5-pro-latest",
    },
    ModelConfig {
        id: "gpt4",
        display_name: "GPT-4 Turbo",
        provider: Provider::OpenAI,
        upstream_model: "gpt-4-turbo-preview",
    },
];

/// Read-only lookup from logical model id to [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
}

impl ModelRegistry {
    /// Build a registry from an ordered list. Ids must be unique.
    pub fn new(models: Vec<ModelConfig>) -> Result<Self, RegistryError> {
        for (i, model) in models.iter().enumerate() {
            if models[..i].iter().any(|m| m.id == model.id) {
                return Err(RegistryError::DuplicateId(model.id.to_string()));
            }
        }
        Ok(Self { models })
    }

    /// The built-in three-model table.
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN_MODELS.to_vec(),
        }
    }

    /// Look up a model by its logical id.
    pub fn get(&self, model_id: &str) -> Result<&ModelConfig, UnknownModel> {
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| UnknownModel {
                model_id: model_id.to_string(),
                valid: self.ids().map(str::to_string).collect(),
            })
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m.id == model_id)
    }

    /// All models in registration order.
    pub fn list(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().map(|m| m.id)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lookup of an id that is not registered.
#[derive(Debug, Clone, Error)]
#[error("unknown model '{model_id}'; valid models are: {}", .valid.join(", "))]
pub struct UnknownModel {
    pub model_id: String,
    pub valid: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate model id: {0}")]
    DuplicateId(String),
}

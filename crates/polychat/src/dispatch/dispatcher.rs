//! The chat dispatcher: validate, resolve, invoke, normalize.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{SecondsFormat, Utc};
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::error::DispatchError;
use super::validate::{ChatRequest, validate};
use crate::config::GenerationConfig;
use crate::llm::{CompletionRequest, LLMError, Provider, ProviderRegistry, Role, StreamEvent};
use crate::models::{ModelConfig, ModelRegistry};

/// A normalized successful reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResult {
    pub role: Role,
    pub content: String,
    #[serde(rename = "model")]
    pub model_id: String,
    #[serde(rename = "provider")]
    pub provider_name: String,
    /// RFC 3339 UTC timestamp taken when the reply completed.
    pub timestamp: String,
}

/// Routes validated chat requests to exactly one upstream provider.
///
/// Cheap to clone; all state is read-only after construction.
#[derive(Clone)]
pub struct ChatDispatcher {
    models: Arc<ModelRegistry>,
    providers: ProviderRegistry,
    generation: GenerationConfig,
}

impl ChatDispatcher {
    pub fn new(
        models: ModelRegistry,
        providers: ProviderRegistry,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            models: Arc::new(models),
            providers,
            generation,
        }
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// True when no provider has a credential; replies are placeholders.
    pub fn is_demo_mode(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn validate(&self, body: &Value) -> Result<ChatRequest, DispatchError> {
        validate(body, &self.models)
    }

    /// Validate a raw body and dispatch it, buffering the whole reply.
    pub async fn handle(&self, body: &Value) -> Result<ChatResult, DispatchError> {
        let request = self.validate(body)?;
        self.dispatch(request).await
    }

    /// Dispatch a request and accumulate the streamed reply into one result.
    pub async fn dispatch(&self, request: ChatRequest) -> Result<ChatResult, DispatchError> {
        self.stream(request).await?.into_result().await
    }

    /// Dispatch a request and hand back the reply as it arrives.
    ///
    /// Errors before the first fragment (unknown model, missing credential,
    /// upstream rejection) are returned directly; later failures surface as
    /// an `Err` item on the stream.
    pub async fn stream(&self, request: ChatRequest) -> Result<ReplyStream, DispatchError> {
        let config = self.models.get(&request.model_id)?;

        if self.is_demo_mode() {
            info!(model = %config.id, "No provider credentials configured, returning demo reply");
            return Ok(ReplyStream::demo(config));
        }

        let provider_kind = config.provider;
        let Some(provider) = self.providers.get(&provider_kind) else {
            warn!(
                model = %config.id,
                provider = %provider_kind,
                "Selected provider has no credential"
            );
            return Err(DispatchError::from_provider(
                provider_kind,
                &LLMError::MissingCredential(provider_kind),
            ));
        };

        let completion = CompletionRequest {
            model: config.upstream_model.to_string(),
            messages: request.messages,
            temperature: Some(self.generation.temperature),
            max_tokens: Some(self.generation.max_output_tokens),
        };

        let events = provider
            .chat_stream(completion)
            .await
            .map_err(|e| provider_error(provider_kind, config.id, &e))?;

        let model_id = config.id;
        let fragments = events
            .filter_map(move |event| {
                let item = match event {
                    Ok(StreamEvent::Token(text)) => Some(Ok(text)),
                    Ok(StreamEvent::Done { usage }) => {
                        debug!(model = %model_id, ?usage, "Completion finished");
                        None
                    }
                    Err(e) => Some(Err(provider_error(provider_kind, model_id, &e))),
                };
                futures::future::ready(item)
            })
            .boxed();

        Ok(ReplyStream {
            model_id: request.model_id,
            provider_name: config.provider_name(),
            fragments,
        })
    }
}

fn provider_error(provider: Provider, model_id: &str, err: &LLMError) -> DispatchError {
    error!(model = %model_id, provider = %provider, error = %err, "Provider request failed");
    DispatchError::from_provider(provider, err)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// ReplyStream
// ============================================================================

/// Text fragments of one reply, in arrival order.
///
/// Finite and not restartable. Dropping it cancels the upstream request.
pub struct ReplyStream {
    pub model_id: String,
    pub provider_name: &'static str,
    fragments: BoxStream<'static, Result<String, DispatchError>>,
}

impl ReplyStream {
    fn demo(config: &ModelConfig) -> Self {
        let content = demo_reply(config);
        Self {
            model_id: config.id.to_string(),
            provider_name: config.provider_name(),
            fragments: stream::once(futures::future::ready(Ok(content))).boxed(),
        }
    }

    /// Drain the stream, concatenating fragments without separators.
    pub async fn into_result(self) -> Result<ChatResult, DispatchError> {
        let content: String = self.fragments.try_collect().await?;
        Ok(ChatResult {
            role: Role::Assistant,
            content,
            model_id: self.model_id,
            provider_name: self.provider_name.to_string(),
            timestamp: now_timestamp(),
        })
    }

    /// Timestamp for a reply that finished streaming now.
    pub fn finished_at() -> String {
        now_timestamp()
    }
}

impl Stream for ReplyStream {
    type Item = Result<String, DispatchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.fragments.as_mut().poll_next(cx)
    }
}

/// Placeholder served when no provider credential exists anywhere.
pub fn demo_reply(config: &ModelConfig) -> String {
    format!(
        "[demo mode] Placeholder reply from {} ({}). No provider credentials are configured, \
        so no request was sent upstream.",
        config.display_name,
        config.provider_name()
    )
}

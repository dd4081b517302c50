//! Anthropic LLM provider with native API format.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::{LLMError, error_from_response};
use super::provider::LLMProvider;
use super::sse_parser::SseEventStream;
use super::types::{ChatStream, CompletionRequest, Message, StreamEvent, Usage};

/// Anthropic provider with native API format.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl AnthropicProvider {
    pub const DEFAULT_API_VERSION: &'static str = "2023-06-01";
    const DEFAULT_MAX_TOKENS: u32 = 4096;

    #[must_use]
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            api_version: Self::DEFAULT_API_VERSION.to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn chat_stream(&self, request: CompletionRequest) -> Result<ChatStream, LLMError> {
        let url = format!("{}/messages", self.base_url);
        let body = to_request(&request);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let sse_stream = SseEventStream::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(AnthropicStreamAdapter::new(sse_stream)))
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(serde::Serialize)]
struct Request<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

fn to_request(request: &CompletionRequest) -> Request<'_> {
    Request {
        model: &request.model,
        max_tokens: request
            .max_tokens
            .unwrap_or(AnthropicProvider::DEFAULT_MAX_TOKENS),
        messages: &request.messages,
        temperature: request.temperature,
        stream: true,
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Adapter that converts SSE events into Anthropic StreamEvents.
struct AnthropicStreamAdapter<S> {
    inner: SseEventStream<S>,
    done: bool,
    /// At least one Anthropic event was decoded.
    seen_event: bool,
    /// Input tokens from message_start event.
    input_tokens: u32,
    output_tokens: Option<u32>,
}

impl<S> AnthropicStreamAdapter<S> {
    fn new(inner: SseEventStream<S>) -> Self {
        Self {
            inner,
            done: false,
            seen_event: false,
            input_tokens: 0,
            output_tokens: None,
        }
    }

    fn usage(&self) -> Option<Usage> {
        self.output_tokens.map(|output| Usage {
            prompt_tokens: self.input_tokens,
            completion_tokens: output,
            total_tokens: self.input_tokens + output,
        })
    }
}

impl<S> Stream for AnthropicStreamAdapter<S>
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if event.data.is_empty() {
                        continue;
                    }

                    let parsed = serde_json::from_str::<AnthropicStreamEvent>(&event.data);
                    if parsed.is_ok() {
                        self.seen_event = true;
                    }
                    match parsed {
                        Ok(AnthropicStreamEvent::MessageStart { message }) => {
                            if let Some(tokens) = message
                                .as_ref()
                                .and_then(|m| m.pointer("/usage/input_tokens"))
                                .and_then(|v| v.as_u64())
                            {
                                self.input_tokens = tokens as u32;
                            }
                        }
                        Ok(AnthropicStreamEvent::ContentBlockDelta { delta }) => {
                            if let Some(text) = delta.text
                                && !text.is_empty()
                            {
                                return Poll::Ready(Some(Ok(StreamEvent::Token(text))));
                            }
                        }
                        Ok(AnthropicStreamEvent::MessageDelta { usage: Some(u) }) => {
                            self.output_tokens = Some(u.output_tokens);
                        }
                        Ok(AnthropicStreamEvent::MessageStop) => {
                            self.done = true;
                            return Poll::Ready(Some(Ok(StreamEvent::Done {
                                usage: self.usage(),
                            })));
                        }
                        Ok(AnthropicStreamEvent::Error { error }) => {
                            self.done = true;
                            return Poll::Ready(Some(Err(error.into_llm_error())));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!(
                                data = %event.data,
                                error = %e,
                                "failed to parse Anthropic SSE event"
                            );
                            self.done = true;
                            return Poll::Ready(Some(Err(LLMError::malformed())));
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(LLMError::Request(e))));
                }
                Poll::Ready(None) => {
                    // Only `message_stop` ends a message
                    self.done = true;
                    let err = if self.seen_event {
                        LLMError::truncated()
                    } else {
                        LLMError::malformed()
                    };
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Anthropic SSE stream events. Only the fields needed for text are decoded.
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart {
        message: Option<serde_json::Value>,
    },
    ContentBlockDelta {
        delta: Delta,
    },
    MessageDelta {
        usage: Option<StreamUsage>,
    },
    MessageStop,
    Error {
        error: StreamErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(serde::Deserialize)]
struct Delta {
    /// Text content (absent for non-text deltas).
    text: Option<String>,
}

#[derive(serde::Deserialize)]
struct StreamUsage {
    output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct StreamErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(default)]
    message: String,
}

impl StreamErrorBody {
    fn into_llm_error(self) -> LLMError {
        match self.error_type.as_str() {
            "rate_limit_error" => LLMError::RateLimit { retry_after: None },
            "authentication_error" => LLMError::Api {
                status: 401,
                message: self.message,
            },
            "permission_error" => LLMError::Api {
                status: 403,
                message: self.message,
            },
            _ => LLMError::Stream(format!("{}: {}", self.error_type, self.message)),
        }
    }
}

//! OpenAI-compatible LLM provider.
//!
//! Speaks the `/chat/completions` wire format, so it also works for gateways
//! and other compatible APIs.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::{LLMError, error_from_response};
use super::provider::LLMProvider;
use super::sse_parser::SseEventStream;
use super::types::{ChatStream, CompletionRequest, Message, StreamEvent, Usage};

/// OpenAI-compatible provider.
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatibleProvider {
    #[must_use]
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn chat_stream(&self, request: CompletionRequest) -> Result<ChatStream, LLMError> {
        let url = format!("{}/chat/completions", self.base_url);

        let stream_request = StreamRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.json(&stream_request).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let sse_stream = SseEventStream::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(StreamParser::new(sse_stream)))
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(serde::Serialize)]
struct StreamRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

struct StreamParser<S> {
    inner: SseEventStream<S>,
    usage: Option<Usage>,
    /// At least one completion chunk was decoded.
    seen_chunk: bool,
    done: bool,
}

impl<S> StreamParser<S> {
    fn new(inner: SseEventStream<S>) -> Self {
        Self {
            inner,
            usage: None,
            seen_chunk: false,
            done: false,
        }
    }
}

impl<S> Stream for StreamParser<S>
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
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }

                    if data == "[DONE]" {
                        self.done = true;
                        let usage = self.usage.take();
                        return Poll::Ready(Some(Ok(StreamEvent::Done { usage })));
                    }

                    // Chunk fields are all optional, so errors must be matched first
                    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
                        self.done = true;
                        return Poll::Ready(Some(Err(LLMError::Stream(envelope.error.message))));
                    }

                    if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
                        self.seen_chunk = true;
                        if chunk.usage.is_some() {
                            self.usage = chunk.usage;
                        }
                        if let Some(choice) = chunk.choices.first()
                            && let Some(ref content) = choice.delta.content
                            && !content.is_empty()
                        {
                            return Poll::Ready(Some(Ok(StreamEvent::Token(content.clone()))));
                        }
                        continue;
                    }

                    tracing::debug!(data = %data, "failed to parse OpenAI SSE chunk");
                    self.done = true;
                    return Poll::Ready(Some(Err(LLMError::malformed())));
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(LLMError::Request(e))));
                }
                Poll::Ready(None) => {
                    // Only `[DONE]` ends a completion
                    self.done = true;
                    let err = if self.seen_chunk {
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

#[derive(serde::Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(serde::Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(serde::Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

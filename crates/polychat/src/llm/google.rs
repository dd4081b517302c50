//! Google Gemini provider using the `generateContent` API.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::{LLMError, error_from_response};
use super::provider::LLMProvider;
use super::sse_parser::SseEventStream;
use super::types::{ChatStream, CompletionRequest, Role, StreamEvent, Usage};

/// Gemini provider with native API format.
pub struct GoogleProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleProvider {
    #[must_use]
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl LLMProvider for GoogleProvider {
    async fn chat_stream(&self, request: CompletionRequest) -> Result<ChatStream, LLMError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = to_request(&request);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let sse_stream = SseEventStream::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(GoogleStreamAdapter::new(sse_stream)))
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(serde::Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

fn to_request(request: &CompletionRequest) -> Request<'_> {
    let contents = request
        .messages
        .iter()
        .map(|msg| Content {
            // Gemini names the assistant side "model"
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            },
            parts: vec![Part { text: &msg.content }],
        })
        .collect();

    Request {
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Adapter that converts Gemini SSE chunks into StreamEvents.
///
/// A single chunk may carry several text parts; they are queued and emitted
/// one per poll. Gemini has no end marker, so the body must close after a
/// candidate carrying a `finishReason`.
struct GoogleStreamAdapter<S> {
    inner: SseEventStream<S>,
    pending: std::collections::VecDeque<String>,
    usage: Option<Usage>,
    seen_chunk: bool,
    finished: bool,
    done: bool,
}

impl<S> GoogleStreamAdapter<S> {
    fn new(inner: SseEventStream<S>) -> Self {
        Self {
            inner,
            pending: std::collections::VecDeque::new(),
            usage: None,
            seen_chunk: false,
            finished: false,
            done: false,
        }
    }
}

impl<S> Stream for GoogleStreamAdapter<S>
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(text) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(StreamEvent::Token(text))));
            }

            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if event.data.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<StreamChunk>(&event.data) {
                        Ok(chunk) => {
                            if let Some(error) = chunk.error {
                                self.done = true;
                                return Poll::Ready(Some(Err(error.into_llm_error())));
                            }
                            if chunk.candidates.is_empty() && chunk.usage_metadata.is_none() {
                                tracing::debug!(
                                    data = %event.data,
                                    "unrecognized Gemini SSE chunk"
                                );
                                self.done = true;
                                return Poll::Ready(Some(Err(LLMError::malformed())));
                            }
                            self.seen_chunk = true;
                            if let Some(meta) = chunk.usage_metadata {
                                self.usage = Some(meta.into());
                            }
                            let Some(candidate) = chunk.candidates.into_iter().next() else {
                                continue;
                            };
                            if candidate.finish_reason.is_some() {
                                self.finished = true;
                            }
                            let texts = candidate
                                .content
                                .into_iter()
                                .flat_map(|c| c.parts)
                                .filter_map(|p| p.text)
                                .filter(|t| !t.is_empty());
                            self.pending.extend(texts);
                        }
                        Err(e) => {
                            tracing::debug!(
                                data = %event.data,
                                error = %e,
                                "failed to parse Gemini SSE chunk"
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
                    self.done = true;
                    if self.finished {
                        return Poll::Ready(Some(Ok(StreamEvent::Done {
                            usage: self.usage.take(),
                        })));
                    }
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
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<ErrorBody>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(meta: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl ErrorBody {
    fn into_llm_error(self) -> LLMError {
        match (self.code, self.status.as_str()) {
            (429, _) | (_, "RESOURCE_EXHAUSTED") => LLMError::RateLimit { retry_after: None },
            (0, _) => LLMError::Stream(self.message),
            (status, _) => LLMError::Api {
                status,
                message: self.message,
            },
        }
    }
}

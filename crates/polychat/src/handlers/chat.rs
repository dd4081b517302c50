//! Chat HTTP handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::dispatch::{DispatchError, ReplyStream};
use crate::response;
use crate::server::AppState;

// ============================================================================
// Handlers
// ============================================================================

/// POST /chat
///
/// Request body: `{"messages": [{"role": "user", "content": "..."}], "model": "claude"}`
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    match state.dispatcher.handle(&body).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /chat/stream
///
/// Same request body as `/chat`. Validation and upstream rejections are
/// reported as plain JSON errors; once streaming starts, events are:
/// - `start`: `{"model": "...", "provider": "..."}`
/// - `token`: `{"content": "..."}` in arrival order
/// - `done`: `{"timestamp": "..."}`
/// - `error`: `{"error": "..."}` (terminal)
pub async fn chat_stream(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let request = match state.dispatcher.validate(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    let reply = match state.dispatcher.stream(request).await {
        Ok(reply) => reply,
        Err(e) => return e.into_response(),
    };

    let events = ReplyEventStream::new(reply, Duration::from_secs(state.idle_timeout_seconds));

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.keep_alive_interval_seconds))
        .text("keep-alive");

    Sse::new(events).keep_alive(keep_alive).into_response()
}

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, Response> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            debug!(error = %rejection, "Rejected chat request body");
            Err(response::bad_request("Request body must be valid JSON").into_response())
        }
    }
}

// ============================================================================
// SSE Streaming
// ============================================================================

// --- SSE Event Data Types ---

#[derive(Serialize)]
struct StartData {
    model: String,
    provider: &'static str,
}

#[derive(Serialize)]
struct TokenData {
    content: String,
}

#[derive(Serialize)]
struct DoneData {
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

// --- Stream Types ---

/// Unified error type for streaming, flattening nested Results.
enum StreamError {
    Dispatch(DispatchError),
    Timeout,
}

type FlattenedReplyStream =
    std::pin::Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Wraps a [`ReplyStream`] as SSE events with an idle timeout between fragments.
struct ReplyEventStream {
    inner: FlattenedReplyStream,
    start: Option<StartData>,
    finished: bool,
}

impl ReplyEventStream {
    fn new(reply: ReplyStream, idle_timeout: Duration) -> Self {
        let start = StartData {
            model: reply.model_id.clone(),
            provider: reply.provider_name,
        };

        let timed_stream = reply.timeout(idle_timeout);
        let flattened = tokio_stream::StreamExt::map(timed_stream, |result| match result {
            Ok(Ok(fragment)) => Ok(fragment),
            Ok(Err(e)) => Err(StreamError::Dispatch(e)),
            Err(_elapsed) => Err(StreamError::Timeout),
        });

        Self {
            inner: Box::pin(flattened),
            start: Some(start),
            finished: false,
        }
    }
}

fn json_event<T: Serialize>(name: &'static str, data: T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|_| Event::default().event(name).data("{}"))
}

impl Stream for ReplyEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        if self.finished {
            return Poll::Ready(None);
        }

        // Emit start event on first poll
        if let Some(start) = self.start.take() {
            return Poll::Ready(Some(Ok(json_event("start", start))));
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(content))) => {
                Poll::Ready(Some(Ok(json_event("token", TokenData { content }))))
            }

            Poll::Ready(Some(Err(StreamError::Dispatch(e)))) => {
                self.finished = true;
                Poll::Ready(Some(Ok(json_event("error", ErrorData { error: e.message }))))
            }

            Poll::Ready(Some(Err(StreamError::Timeout))) => {
                self.finished = true;
                let data = ErrorData {
                    error: "Stream idle timeout".to_string(),
                };
                Poll::Ready(Some(Ok(json_event("error", data))))
            }

            Poll::Ready(None) => {
                self.finished = true;
                let data = DoneData {
                    timestamp: ReplyStream::finished_at(),
                };
                Poll::Ready(Some(Ok(json_event("done", data))))
            }

            Poll::Pending => Poll::Pending,
        }
    }
}

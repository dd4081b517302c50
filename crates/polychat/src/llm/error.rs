//! LLM error types.

use thiserror::Error;

use super::provider::Provider;

/// Check an HTTP response for rate-limit errors, returning `RateLimit` for 429.
pub fn check_response_error(response: &reqwest::Response) -> Option<LLMError> {
    if response.status().is_success() {
        return None;
    }
    if response.status().as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Some(LLMError::RateLimit { retry_after });
    }
    None
}

/// Turn a non-success response into an error, consuming the body.
pub async fn error_from_response(response: reqwest::Response) -> LLMError {
    if let Some(err) = check_response_error(&response) {
        return err;
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    LLMError::Api { status, message }
}

/// Errors that can occur when making LLM API calls.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request failed
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited (429)
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimit { retry_after: Option<u64> },

    /// No credential was configured for the provider
    #[error("no credential configured for {0}")]
    MissingCredential(Provider),

    /// The upstream reported an error in the middle of a stream
    #[error("stream error: {0}")]
    Stream(String),
}

impl LLMError {
    /// The upstream sent a payload that is not part of its stream format.
    pub fn malformed() -> Self {
        LLMError::Stream("malformed upstream response".to_string())
    }

    /// The upstream body ended without its end-of-stream marker.
    pub fn truncated() -> Self {
        LLMError::Stream("stream ended before completion".to_string())
    }
}

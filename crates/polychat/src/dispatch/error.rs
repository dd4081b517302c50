//! Normalized dispatch errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::llm::{LLMError, Provider};
use crate::models::UnknownModel;

/// The closed set of failure kinds a dispatch can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// Caller mistake in the request shape.
    InvalidInput,
    /// Caller picked a model id that is not registered.
    UnknownModel,
    /// Credential missing or rejected upstream.
    ProviderAuthFailure,
    /// Upstream rate limit. Not retried.
    ProviderRateLimited,
    /// Anything else: network, malformed upstream output, unexpected errors.
    ProviderFailure,
}

impl DispatchErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchErrorKind::InvalidInput | DispatchErrorKind::UnknownModel => {
                StatusCode::BAD_REQUEST
            }
            DispatchErrorKind::ProviderAuthFailure => StatusCode::UNAUTHORIZED,
            DispatchErrorKind::ProviderRateLimited => StatusCode::TOO_MANY_REQUESTS,
            DispatchErrorKind::ProviderFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A dispatch failure with a short message that is safe to show callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DispatchError {
    pub kind: DispatchErrorKind,
    pub message: String,
}

impl DispatchError {
    pub fn new(kind: DispatchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::InvalidInput, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Map a provider error onto the dispatch taxonomy.
    ///
    /// Upstream text is only inspected, never copied into the message.
    pub fn from_provider(provider: Provider, err: &LLMError) -> Self {
        match classify(err) {
            DispatchErrorKind::ProviderAuthFailure => Self::new(
                DispatchErrorKind::ProviderAuthFailure,
                format!("{provider} credential is missing or invalid"),
            ),
            DispatchErrorKind::ProviderRateLimited => Self::new(
                DispatchErrorKind::ProviderRateLimited,
                format!("{provider} rate limit reached, please try again later"),
            ),
            _ => Self::new(
                DispatchErrorKind::ProviderFailure,
                "Error processing request",
            ),
        }
    }
}

impl From<UnknownModel> for DispatchError {
    fn from(err: UnknownModel) -> Self {
        Self::new(
            DispatchErrorKind::UnknownModel,
            format!(
                "Unknown model '{}'. Valid models: {}",
                err.model_id,
                err.valid.join(", ")
            ),
        )
    }
}

const AUTH_MARKERS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "unauthorized",
    "authentication",
    "credential",
];

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota",
];

fn classify(err: &LLMError) -> DispatchErrorKind {
    match err {
        LLMError::MissingCredential(_) => DispatchErrorKind::ProviderAuthFailure,
        LLMError::RateLimit { .. } => DispatchErrorKind::ProviderRateLimited,
        LLMError::Api {
            status: 401 | 403, ..
        } => DispatchErrorKind::ProviderAuthFailure,
        LLMError::Api { status: 429, .. } => DispatchErrorKind::ProviderRateLimited,
        LLMError::Api { message, .. } | LLMError::Stream(message) => classify_message(message),
        LLMError::Request(_) => DispatchErrorKind::ProviderFailure,
    }
}

fn classify_message(message: &str) -> DispatchErrorKind {
    let lower = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        DispatchErrorKind::ProviderAuthFailure
    } else if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        DispatchErrorKind::ProviderRateLimited
    } else {
        DispatchErrorKind::ProviderFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> LLMError {
        LLMError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn status_codes_per_kind() {
        assert_eq!(
            DispatchErrorKind::InvalidInput.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchErrorKind::UnknownModel.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchErrorKind::ProviderAuthFailure.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            DispatchErrorKind::ProviderRateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            DispatchErrorKind::ProviderFailure.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn auth_shaped_errors() {
        for err in [
            api(401, "nope"),
            api(403, "forbidden"),
            api(400, "API key not valid. Please pass a valid API key."),
            LLMError::MissingCredential(Provider::Google),
            LLMError::Stream("Incorrect api_key provided".to_string()),
        ] {
            assert_eq!(classify(&err), DispatchErrorKind::ProviderAuthFailure, "{err}");
        }
    }

    #[test]
    fn rate_limit_shaped_errors() {
        for err in [
            LLMError::RateLimit {
                retry_after: Some(3),
            },
            api(429, ""),
            api(500, "Rate limit reached for gpt-4"),
            LLMError::Stream("You exceeded your current quota".to_string()),
        ] {
            assert_eq!(classify(&err), DispatchErrorKind::ProviderRateLimited, "{err}");
        }
    }

    #[test]
    fn other_errors_are_provider_failures() {
        for err in [
            api(500, "internal error"),
            api(503, "overloaded"),
            LLMError::Stream("overloaded_error: Overloaded".to_string()),
        ] {
            assert_eq!(classify(&err), DispatchErrorKind::ProviderFailure, "{err}");
        }
    }

    #[test]
    fn provider_message_does_not_leak_upstream_text() {
        let err = DispatchError::from_provider(
            Provider::OpenAI,
            &api(500, "stack trace at secret/internal/path.py:42"),
        );
        assert_eq!(err.kind, DispatchErrorKind::ProviderFailure);
        assert_eq!(err.message, "Error processing request");

        let err = DispatchError::from_provider(Provider::Anthropic, &api(401, "sk-ant-xxxx invalid"));
        assert_eq!(err.kind, DispatchErrorKind::ProviderAuthFailure);
        assert!(!err.message.contains("sk-ant"));
        assert!(err.message.contains("Anthropic"));
    }

    #[test]
    fn unknown_model_lists_valid_ids() {
        let err: DispatchError = UnknownModel {
            model_id: "llama".to_string(),
            valid: vec!["claude".to_string(), "gpt4".to_string()],
        }
        .into();
        assert_eq!(err.kind, DispatchErrorKind::UnknownModel);
        assert_eq!(err.message, "Unknown model 'llama'. Valid models: claude, gpt4");
    }
}

//! Chat dispatch: turns a chat request into exactly one provider call.
//!
//! ```text
//! POST /chat body
//!      │
//!      ▼
//!  validate()           messages / model checks        → InvalidInput, UnknownModel
//!      │
//!      ▼
//!  ModelRegistry::get   logical id → ModelConfig        → UnknownModel
//!      │
//!      ├─ no credentials anywhere → demo reply
//!      ▼
//!  ProviderRegistry     ModelConfig.provider → client   → ProviderAuthFailure
//!      │
//!      ▼
//!  LLMProvider::chat_stream                             → ProviderAuthFailure,
//!      │                                                  ProviderRateLimited,
//!      ▼                                                  ProviderFailure
//!  ReplyStream → ChatResult
//! ```

mod dispatcher;
mod error;
mod validate;

pub use dispatcher::{ChatDispatcher, ChatResult, ReplyStream, demo_reply};
pub use error::{DispatchError, DispatchErrorKind};
pub use validate::{ChatRequest, validate};

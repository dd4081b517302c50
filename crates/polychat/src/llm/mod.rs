//! LLM provider clients for streaming chat completions.

mod anthropic;
mod error;
mod google;
mod openai;
mod provider;
mod registry;
mod sse_parser;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::LLMError;
pub use google::GoogleProvider;
pub use openai::OpenAICompatibleProvider;
pub use provider::{LLMProvider, Provider};
pub use registry::ProviderRegistry;
pub use types::{ChatStream, CompletionRequest, Message, Role, StreamEvent, Usage};

//! Polychat - a thin chat proxy that routes conversations to hosted LLM providers.

pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod response;
pub mod server;

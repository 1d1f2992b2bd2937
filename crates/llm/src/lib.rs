//! Completion gateway: a thin, provider-agnostic chat-completion client.
//!
//! The assistant talks to the model through [`LlmClient`]. The concrete
//! stack built by [`build_llm_client`] is an OpenAI-compatible client,
//! wrapped in optional retries and a concurrency limit.

pub mod client;
pub mod config;
pub mod openai;
pub mod retry;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{build_llm_client, LlmConfig, SemaphoredClient};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};

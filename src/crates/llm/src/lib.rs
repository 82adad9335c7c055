//! Chat model abstraction and provider clients used by the plan caller.
//!
//! The caller drives two model-backed steps (request synthesis and response
//! interpretation). Both go through the [`ChatModel`] trait defined here, so
//! the engine never depends on a concrete provider.
//!
//! # Local Providers
//!
//! - **Ollama** - local LLM runner (`/api/chat`)
//!
//! # Remote Providers
//!
//! Any service exposing an OpenAI-compatible `/chat/completions` endpoint:
//! - **OpenAI**
//! - **OpenRouter**
//! - **Deepseek**
//! - **Grok**
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::config::ProviderConfig;
//! use llm::{ChatModel, ChatRequest, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProviderConfig::remote_from_env(
//!         "OPENAI_API_KEY",
//!         "https://api.openai.com/v1",
//!         "gpt-4o-mini",
//!     )?;
//!     let client = OpenAiClient::new(config)?;
//!
//!     let request = ChatRequest::new(vec![Message::human("Plan: GET /search/person")])
//!         .with_stop_sequences(vec!["\nResponse:".to_string()]);
//!
//!     let response = client.chat(request).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod message;
pub mod provider;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "remote")]
pub mod remote;

// Re-export commonly used types
pub use chat::{ChatConfig, ChatModel, ChatRequest, ChatResponse, UsageMetadata};
pub use config::ProviderConfig;
pub use error::{LlmError, Result};
pub use message::{Message, MessageRole};
pub use provider::{build_chat_model, LlmSettings};

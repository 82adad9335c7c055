//! Remote LLM provider implementations.
//!
//! OpenAI, OpenRouter, Deepseek and Grok share the OpenAI chat completions
//! wire format, so a single client covers all of them; only the base URL
//! differs (see [`crate::provider`]).

pub mod openai;

pub use openai::OpenAiClient;

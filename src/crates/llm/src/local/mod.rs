//! Local LLM provider implementations.
//!
//! These providers don't require API keys and keep prompts (which carry API
//! documentation and response payloads) on the local machine.

pub mod ollama;

pub use ollama::OllamaClient;

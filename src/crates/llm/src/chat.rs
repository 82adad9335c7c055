//! Core chat model trait and request/response types.
//!
//! The trait is deliberately small: the caller only needs single-shot
//! completions with stop sequences, so there is no streaming or tool calling.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use llm::{ChatModel, ChatRequest, ChatResponse, Message, Result};
//! use async_trait::async_trait;
//!
//! struct EchoModel;
//!
//! #[async_trait]
//! impl ChatModel for EchoModel {
//!     async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
//!         let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
//!         Ok(ChatResponse::new(Message::assistant(last)))
//!     }
//!
//!     fn model_name(&self) -> &str {
//!         "echo"
//!     }
//! }
//! ```

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Core trait for chat-based language models.
///
/// Implementations must be `Send + Sync`; the engine shares them behind
/// `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete chat response from messages.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Check if the model/provider is reachable.
    ///
    /// Default implementation returns `Ok(true)`.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Model identifier used for logging.
    fn model_name(&self) -> &str;
}

/// A request to a chat model containing messages and configuration.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The conversation messages to send to the model.
    pub messages: Vec<Message>,

    /// Generation parameters.
    pub config: ChatConfig,
}

impl ChatRequest {
    /// Create a new chat request with default configuration.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Add stop sequences that halt generation.
    ///
    /// The caller uses these to keep the model from writing an observation
    /// line it was never given.
    pub fn with_stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.config.stop_sequences = sequences;
        self
    }

    /// Set top-p (nucleus) sampling parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = Some(top_p);
        self
    }
}

/// Configuration parameters for chat generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatConfig {
    /// Sampling temperature (provider-dependent range).
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,

    /// Sequences that stop generation when encountered.
    pub stop_sequences: Vec<String>,

    /// Top-p (nucleus) sampling parameter.
    pub top_p: Option<f32>,
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl UsageMetadata {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A complete response from a chat model.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message.
    pub message: Message,

    /// Token usage, when the provider reports it.
    pub usage: Option<UsageMetadata>,

    /// Provider-specific metadata (model, finish reason, timings).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            metadata: HashMap::new(),
        }
    }

    /// Text of the assistant message.
    pub fn text(&self) -> &str {
        self.message.text()
    }
}

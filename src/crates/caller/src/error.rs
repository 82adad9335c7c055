//! Error types for the plan execution engine.

use llm::LlmError;
use thiserror::Error;

/// Result type alias for caller operations.
pub type Result<T> = std::result::Result<T, CallerError>;

/// Errors raised while binding, synthesizing, executing or interpreting a plan.
///
/// Every variant aborts the current invocation. Non-2xx HTTP statuses and
/// budget exhaustion are not errors and never surface here.
#[derive(Debug, Error)]
pub enum CallerError {
    /// The resolver found zero or several endpoints for the text.
    #[error("Found {} matched endpoints for `{query}`, but expected 1{}", .matches.len(), format_candidates(.matches))]
    AmbiguousOrUnknownEndpoint { query: String, matches: Vec<String> },

    /// Neither an action nor a terminal result could be found.
    #[error("Could not parse LLM output: `{0}`")]
    UnparseableSynthesizerOutput(String),

    /// The action input is not valid JSON or lacks a required field.
    #[error("Malformed action payload: {0}")]
    MalformedActionPayload(String),

    /// The synthesizer asked for a verb outside GET/POST/PUT/PATCH/DELETE.
    #[error("Unsupported HTTP verb: {0}")]
    UnsupportedVerb(String),

    /// The HTTP transport could not complete the call.
    #[error("Remote call failed: {0}")]
    RemoteCallFailure(#[from] reqwest::Error),

    /// A model completion (synthesis or interpretation) failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// An API description could not be loaded or reduced.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Token encoding or decoding failed.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CallerError {
    /// Whether the failure came from one of the remote calls.
    pub fn is_remote(&self) -> bool {
        matches!(self, CallerError::RemoteCallFailure(_) | CallerError::Llm(_))
    }
}

fn format_candidates(matches: &[String]) -> String {
    if matches.is_empty() {
        String::new()
    } else {
        format!(": [{}]", matches.join(", "))
    }
}

impl From<serde_json::Error> for CallerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for CallerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

//! Provider selection from configuration.
//!
//! Turns a serializable [`LlmSettings`] block into a shared
//! `Arc<dyn ChatModel>`.

use crate::chat::ChatModel;
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Provider settings as they appear in a YAML run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// One of: openai, openrouter, deepseek, grok, ollama.
    pub provider: String,

    /// Model identifier.
    pub model: String,

    /// Override for the provider's default base URL.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Inline API key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl LlmSettings {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_base: None,
            api_key: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Default base URL for the configured provider.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self.provider.to_lowercase().as_str() {
            "openai" => Some("https://api.openai.com/v1"),
            "openrouter" => Some("https://openrouter.ai/api/v1"),
            "deepseek" => Some("https://api.deepseek.com"),
            "grok" | "xai" => Some("https://api.x.ai/v1"),
            "ollama" => Some("http://localhost:11434"),
            _ => None,
        }
    }

    fn base_url(&self) -> Result<String> {
        self.api_base
            .clone()
            .or_else(|| self.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                LlmError::ConfigError(format!(
                    "Unsupported LLM provider: {}. Available: openai, openrouter, deepseek, grok, ollama",
                    self.provider
                ))
            })
    }

    fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        let env_var = self.api_key_env.as_deref().ok_or_else(|| {
            LlmError::ConfigError(format!("{} API key not configured", self.provider))
        })?;
        std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))
    }
}

/// Build a chat model from settings.
pub fn build_chat_model(settings: &LlmSettings) -> Result<Arc<dyn ChatModel>> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let base_url = settings.base_url()?;
    debug!(provider = %settings.provider, model = %settings.model, %base_url, "Building chat model");

    match settings.provider.to_lowercase().as_str() {
        #[cfg(feature = "local")]
        "ollama" => {
            let config = ProviderConfig::local(base_url, settings.model.clone()).with_timeout(timeout);
            Ok(Arc::new(crate::local::OllamaClient::new(config)?))
        }

        #[cfg(feature = "remote")]
        "openai" | "openrouter" | "deepseek" | "grok" | "xai" => {
            let config = ProviderConfig::remote(settings.resolve_api_key()?, base_url, settings.model.clone())
                .with_timeout(timeout);
            Ok(Arc::new(crate::remote::OpenAiClient::new(config)?))
        }

        other => Err(LlmError::ConfigError(format!(
            "Unsupported LLM provider: {}",
            other
        ))),
    }
}

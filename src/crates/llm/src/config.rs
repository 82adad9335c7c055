//! Connection settings shared by the provider clients.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a chat model lives and how to authenticate against it.
///
/// The credential is never serialized and never printed by `Debug`, so a
/// config can be logged or written back to disk without leaking it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// e.g. "https://api.openai.com/v1" or "http://localhost:11434".
    pub base_url: String,

    pub model: String,

    /// Bearer credential. Local runners have none.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Sent as `OpenAI-Organization` when set.
    #[serde(default)]
    pub organization: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("organization", &self.organization)
            .finish()
    }
}

impl ProviderConfig {
    /// A server that needs no credential, such as a local Ollama.
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: default_timeout(),
            organization: None,
        }
    }

    /// A hosted service authenticated with `api_key`.
    pub fn remote(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::local(base_url, model)
        }
    }

    /// Like [`ProviderConfig::remote`], reading the key from `env_var`.
    pub fn remote_from_env(env_var: &str, base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;
        Ok(Self::remote(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// `path` joined to the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// The credential, or an error naming the model that needs one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::ConfigError(format!("no API key configured for {}", self.model)))
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

//! Run configuration for the `caller` binary.
//!
//! One YAML file names the scenario, the API description, the models and the
//! engine settings. Secrets never appear in it: the auth block and the model
//! settings only carry the names of environment variables.

use anyhow::{bail, Context, Result};
use caller::CallerConfig;
use llm::LlmSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Scenario name; overrides `caller.scenario`.
    pub scenario: String,

    /// API description (JSON). Relative paths are resolved against the
    /// directory of the config file.
    pub spec_path: PathBuf,

    /// Model that synthesizes requests.
    pub synthesizer: LlmSettings,

    /// Model that interprets responses. Defaults to the synthesizer.
    #[serde(default)]
    pub interpreter: Option<LlmSettings>,

    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub caller: CallerConfig,

    #[serde(default)]
    pub background: Option<String>,

    #[serde(default)]
    pub plan: Option<String>,
}

/// Header sent with every API call, e.g. `Authorization: Bearer $TMDB_TOKEN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_header")]
    pub header: String,

    /// Prefix such as "Bearer" or "token".
    #[serde(default)]
    pub scheme: Option<String>,

    /// Environment variable holding the credential.
    pub token_env: String,
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

impl AuthConfig {
    /// Header name and value, reading the credential from the environment.
    pub fn header_pair(&self) -> Result<(String, String)> {
        let token = env::var(&self.token_env)
            .with_context(|| format!("environment variable {} is not set", self.token_env))?;
        if token.trim().is_empty() {
            bail!("environment variable {} is empty", self.token_env);
        }
        let value = match &self.scheme {
            Some(scheme) => format!("{} {}", scheme, token.trim()),
            None => token.trim().to_string(),
        };
        Ok((self.header.clone(), value))
    }
}

impl RunConfig {
    /// Load from YAML, apply `CALLER_*` overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run config {}", path.display()))?;
        let mut config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse run config {}", path.display()))?;

        if config.spec_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.spec_path = dir.join(&config.spec_path);
            }
        }

        config.caller.scenario = config.scenario.clone();
        config.caller = config.caller.with_env_overrides()?;
        config.scenario = config.caller.scenario.clone();

        debug!(path = %path.display(), scenario = %config.scenario, "Loaded run config");
        Ok(config)
    }

    /// Interpreter model settings, falling back to the synthesizer's.
    pub fn interpreter_settings(&self) -> &LlmSettings {
        self.interpreter.as_ref().unwrap_or(&self.synthesizer)
    }
}

//! Caller configuration
//!
//! Budgets, prompt sizing and generation parameters for one engine. Loaded
//! from YAML with optional environment overrides.

use crate::error::{CallerError, Result};
use llm::ChatRequest;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Configuration for the plan execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerConfig {
    /// Scenario name, e.g. "tmdb", "spotify", "gitlab".
    #[serde(default = "default_scenario")]
    pub scenario: String,

    /// Maximum loop passes. `None` removes the limit.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: Option<usize>,

    /// Wall-clock limit in seconds. Unbounded by default.
    #[serde(default)]
    pub max_execution_time_secs: Option<f64>,

    /// Show the response schema to the synthesizer.
    #[serde(default)]
    pub with_response: bool,

    /// Use the simplified response interpreter.
    #[serde(default)]
    pub simple_parser: bool,

    /// Token budget for endpoint documentation in the synthesizer prompt.
    #[serde(default = "default_doc_token_budget")]
    pub doc_token_budget: usize,

    /// Token budget for raw responses in the interpreter prompt.
    #[serde(default = "default_response_token_budget")]
    pub response_token_budget: usize,

    /// Model whose encoding measures token budgets.
    #[serde(default = "default_encoding_model")]
    pub encoding_model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<usize>,
}

fn default_scenario() -> String {
    "tmdb".to_string()
}

fn default_max_iterations() -> Option<usize> {
    Some(15)
}

fn default_doc_token_budget() -> usize {
    crate::trimmer::DEFAULT_DOC_TOKEN_BUDGET
}

fn default_response_token_budget() -> usize {
    3000
}

fn default_encoding_model() -> String {
    "text-davinci-003".to_string()
}

fn default_max_tokens() -> Option<usize> {
    Some(700)
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self::new(default_scenario())
    }
}

impl CallerConfig {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            max_iterations: default_max_iterations(),
            max_execution_time_secs: None,
            with_response: false,
            simple_parser: false,
            doc_token_budget: default_doc_token_budget(),
            response_token_budget: default_response_token_budget(),
            encoding_model: default_encoding_model(),
            temperature: None,
            max_tokens: default_max_tokens(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CallerError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| CallerError::Config(format!("Failed to parse YAML config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides, then validate the result
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CALLER_SCENARIO: Scenario name
    /// - CALLER_MAX_ITERATIONS: Maximum loop passes ("none" removes the limit)
    /// - CALLER_MAX_EXECUTION_TIME: Wall-clock limit in seconds
    /// - CALLER_WITH_RESPONSE: Show response schemas (true/false)
    /// - CALLER_SIMPLE_PARSER: Use the simplified interpreter (true/false)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(scenario) = env::var("CALLER_SCENARIO") {
            self.scenario = scenario;
        }

        if let Ok(iterations) = env::var("CALLER_MAX_ITERATIONS") {
            if iterations.eq_ignore_ascii_case("none") {
                self.max_iterations = None;
            } else if let Ok(value) = iterations.parse::<usize>() {
                self.max_iterations = Some(value);
            }
        }

        if let Ok(secs) = env::var("CALLER_MAX_EXECUTION_TIME") {
            if let Ok(value) = secs.parse::<f64>() {
                self.max_execution_time_secs = Some(value);
            }
        }

        if let Ok(flag) = env::var("CALLER_WITH_RESPONSE") {
            self.with_response = parse_flag(&flag);
        }

        if let Ok(flag) = env::var("CALLER_SIMPLE_PARSER") {
            self.simple_parser = parse_flag(&flag);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scenario.trim().is_empty() {
            return Err(CallerError::Config("scenario cannot be empty".to_string()));
        }

        if self.max_iterations == Some(0) {
            return Err(CallerError::Config(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        self.max_execution_time()?;

        if self.doc_token_budget == 0 || self.response_token_budget == 0 {
            return Err(CallerError::Config(
                "token budgets must be greater than 0".to_string(),
            ));
        }

        if self.max_tokens == Some(0) {
            return Err(CallerError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_execution_time(mut self, limit: Option<Duration>) -> Self {
        self.max_execution_time_secs = limit.map(|d| d.as_secs_f64());
        self
    }

    pub fn with_response(mut self, enabled: bool) -> Self {
        self.with_response = enabled;
        self
    }

    pub fn with_simple_parser(mut self, enabled: bool) -> Self {
        self.simple_parser = enabled;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Wall-clock limit as a `Duration`. Negative, non-finite and
    /// overflowing values are rejected.
    pub fn max_execution_time(&self) -> Result<Option<Duration>> {
        self.max_execution_time_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    CallerError::Config(format!(
                        "max_execution_time_secs must be a non-negative number of seconds, got {}",
                        secs
                    ))
                })
            })
            .transpose()
    }

    pub fn generation(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1" || value.eq_ignore_ascii_case("yes")
}

/// Sampling parameters shared by the synthesizer and the interpreters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl GenerationSettings {
    pub fn apply(&self, mut request: ChatRequest) -> ChatRequest {
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

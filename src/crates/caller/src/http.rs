//! HTTP execution of synthesized actions.
//!
//! Non-2xx responses are returned as data, body unchanged. Only transport
//! failures become errors, and nothing is retried here.

use crate::error::{CallerError, Result};
use crate::parser::Verb;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placeholder sent to the interpreter when no query parameters were used.
pub const NO_PARAMETERS: &str = "No parameters";
/// Placeholder sent to the interpreter when no body was sent.
pub const NO_REQUEST_BODY: &str = "No request body";

/// A decoded action payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub verb: Verb,
    pub url: String,
    pub params: Option<Value>,
    pub body: Option<Value>,
    pub description: String,
    pub output_instructions: Option<String>,
}

impl ActionRequest {
    /// Decode the JSON payload that followed an action label.
    pub fn from_payload(verb: Verb, payload: &str) -> Result<Self> {
        let payload = payload.trim().trim_matches('`');
        let object_text = match (payload.find('{'), payload.rfind('}')) {
            (Some(start), Some(end)) if start < end => &payload[start..=end],
            _ => payload,
        };

        let value: Value = serde_json::from_str(object_text)
            .map_err(|e| CallerError::MalformedActionPayload(format!("{}: {}", e, object_text)))?;
        let Value::Object(data) = value else {
            return Err(CallerError::MalformedActionPayload(format!(
                "expected a JSON object: {}",
                object_text
            )));
        };

        let url = data
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| CallerError::MalformedActionPayload(format!("missing \"url\": {}", object_text)))?
            .to_string();
        if url.contains('{') || url.contains('}') {
            return Err(CallerError::MalformedActionPayload(format!(
                "url contains an unresolved placeholder: {}",
                url
            )));
        }

        let params = present(&data, "params");
        let body = if verb.carries_body() {
            present(&data, "data").or_else(|| present(&data, "body"))
        } else {
            None
        };

        Ok(Self {
            verb,
            url,
            params,
            body,
            description: data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("No description")
                .to_string(),
            output_instructions: data
                .get("output_instructions")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// "VERB url", as handed to the endpoint resolver.
    pub fn endpoint_query(&self) -> String {
        format!("{} {}", self.verb, self.url)
    }

    /// `{params, data}` descriptor with literal placeholders for absent parts.
    pub fn descriptor(&self) -> Value {
        json!({
            "params": self.params.clone().unwrap_or_else(|| Value::String(NO_PARAMETERS.to_string())),
            "data": self.body.clone().unwrap_or_else(|| Value::String(NO_REQUEST_BODY.to_string())),
        })
    }

    /// Value of a query parameter, from `params` or from the url itself.
    pub fn query_value(&self, key: &str) -> Option<String> {
        if let Some(value) = self.params.as_ref().and_then(|p| p.get(key)) {
            return Some(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        let (_, query) = self.url.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

fn present(data: &Map<String, Value>, key: &str) -> Option<Value> {
    data.get(key).filter(|v| !v.is_null()).cloned()
}

/// Flatten a params object into query pairs. Arrays repeat the key.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::String(s) => pairs.push((key.clone(), s.clone())),
            Value::Array(items) => pairs.extend(items.iter().map(|item| {
                let text = match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })),
            other => pairs.push((key.clone(), other.to_string())),
        }
    }
    pairs
}

/// Raw outcome of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Configuration for [`ApiClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    pub user_agent: Option<String>,

    /// Headers sent with every request, e.g. credentials.
    #[serde(skip)]
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: None,
            default_headers: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Issues one HTTP call per action.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| CallerError::Config(format!("invalid header name {}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CallerError::Config(format!("invalid value for header {}: {}", key, e)))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder().timeout(config.timeout).default_headers(headers);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder
            .build()
            .map_err(|e| CallerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub async fn execute(&self, request: &ActionRequest) -> Result<ApiResponse> {
        let method = match request.verb {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(params) = &request.params {
            builder = builder.query(&query_pairs(params));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        debug!(verb = %request.verb, url = %request.url, "Sending request");

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            info!(verb = %request.verb, url = %request.url, status = status.as_u16(), "API call completed");
        } else {
            warn!(verb = %request.verb, url = %request.url, status = status.as_u16(), "API call returned error status");
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

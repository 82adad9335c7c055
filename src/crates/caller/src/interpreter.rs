//! Response interpretation
//!
//! Turns a raw API response into a natural-language note for the transcript.
//! Two strategies share one trait: [`SchemaAwareInterpreter`] shows the model
//! the response schema, [`SimpleInterpreter`] only the response itself.

use crate::config::GenerationSettings;
use crate::error::Result;
use crate::tokens::Tokenizer;
use crate::trimmer::reduce_documentation;
use async_trait::async_trait;
use llm::{ChatModel, ChatRequest, Message};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Everything an interpreter may use to describe one response.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpretRequest {
    /// Full URL template of the called endpoint.
    pub api_path: String,
    /// Documentation of the called endpoint, after scenario narrowing.
    pub documentation: Value,
    /// What to extract; `None` when the synthesizer gave no instructions.
    pub query: Option<String>,
    pub description: String,
    /// `{"params": .., "data": ..}` with literal placeholders for absent parts.
    pub descriptor: Value,
    pub raw_response: String,
}

#[async_trait]
pub trait ResponseInterpreter: Send + Sync {
    async fn interpret(&self, request: &InterpretRequest) -> Result<String>;

    fn name(&self) -> &str;
}

const SCHEMA_AWARE_TEMPLATE: &str = r#"You are given the response of a call to {api_path}, together with the schema of that response.

Response schema:
{schema}

Request description: {description}
Request parameters and body: {descriptor}

Raw response:
{response}

{task}
Answer in plain natural language. Copy ids, names and numbers exactly as they appear in the response. If the response reports an error, describe the error instead."#;

const SIMPLE_TEMPLATE: &str = r#"Here is the response of an API call.

Request description: {description}
Request parameters and body: {descriptor}

Raw response:
{response}

{task}
Answer in plain natural language. Copy ids, names and numbers exactly as they appear in the response. If the response reports an error, describe the error instead."#;

fn task_line(query: Option<&str>) -> String {
    match query {
        Some(query) => format!("Task: {}", query),
        None => "Task: summarize what the response contains.".to_string(),
    }
}

/// Shared model access for both strategies.
#[derive(Clone)]
struct InterpreterCore {
    llm: Arc<dyn ChatModel>,
    tokenizer: Tokenizer,
    response_budget: usize,
    generation: GenerationSettings,
}

impl InterpreterCore {
    fn bounded(&self, text: &str) -> Result<String> {
        self.tokenizer.truncate(text, self.response_budget)
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = self.generation.apply(ChatRequest::new(vec![Message::human(prompt)]));
        let response = self.llm.chat(request).await?;
        Ok(response.text().trim().to_string())
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(api_path|schema|description|descriptor|task|response)\}").expect("valid placeholder regex")
});

fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let values: HashMap<&str, &str> = pairs.iter().copied().collect();
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values.get(&caps[1]).copied().unwrap_or_default().to_string()
        })
        .into_owned()
}

/// Interpreter that includes the (token-bounded) response schema.
pub struct SchemaAwareInterpreter {
    core: InterpreterCore,
}

impl SchemaAwareInterpreter {
    pub fn new(llm: Arc<dyn ChatModel>, tokenizer: Tokenizer, response_budget: usize) -> Self {
        Self {
            core: InterpreterCore {
                llm,
                tokenizer,
                response_budget,
                generation: GenerationSettings::default(),
            },
        }
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.core.generation = generation;
        self
    }

    fn schema_text(&self, documentation: &Value) -> Result<String> {
        let reduced = reduce_documentation(documentation, true);
        let schema = reduced.get("responses").cloned().unwrap_or(Value::Null);
        if schema.is_null() {
            return Ok("No response schema available".to_string());
        }
        self.core.bounded(&serde_yaml::to_string(&schema)?)
    }

    pub fn build_prompt(&self, request: &InterpretRequest) -> Result<String> {
        let schema = self.schema_text(&request.documentation)?;
        let response = self.core.bounded(&request.raw_response)?;
        let descriptor = request.descriptor.to_string();
        let task = task_line(request.query.as_deref());

        Ok(fill(
            SCHEMA_AWARE_TEMPLATE,
            &[
                ("api_path", request.api_path.as_str()),
                ("schema", schema.as_str()),
                ("description", request.description.as_str()),
                ("descriptor", descriptor.as_str()),
                ("task", task.as_str()),
                ("response", response.as_str()),
            ],
        ))
    }
}

#[async_trait]
impl ResponseInterpreter for SchemaAwareInterpreter {
    async fn interpret(&self, request: &InterpretRequest) -> Result<String> {
        let prompt = self.build_prompt(request)?;
        debug!(api_path = %request.api_path, interpreter = self.name(), "Interpreting response");
        self.core.complete(prompt).await
    }

    fn name(&self) -> &str {
        "schema-aware"
    }
}

/// Interpreter that sees only the description, the request and the response.
pub struct SimpleInterpreter {
    core: InterpreterCore,
}

impl SimpleInterpreter {
    pub fn new(llm: Arc<dyn ChatModel>, tokenizer: Tokenizer, response_budget: usize) -> Self {
        Self {
            core: InterpreterCore {
                llm,
                tokenizer,
                response_budget,
                generation: GenerationSettings::default(),
            },
        }
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.core.generation = generation;
        self
    }

    pub fn build_prompt(&self, request: &InterpretRequest) -> Result<String> {
        let response = self.core.bounded(&request.raw_response)?;
        let descriptor = request.descriptor.to_string();
        let task = task_line(request.query.as_deref());

        Ok(fill(
            SIMPLE_TEMPLATE,
            &[
                ("description", request.description.as_str()),
                ("descriptor", descriptor.as_str()),
                ("task", task.as_str()),
                ("response", response.as_str()),
            ],
        ))
    }
}

#[async_trait]
impl ResponseInterpreter for SimpleInterpreter {
    async fn interpret(&self, request: &InterpretRequest) -> Result<String> {
        let prompt = self.build_prompt(request)?;
        debug!(api_path = %request.api_path, interpreter = self.name(), "Interpreting response");
        self.core.complete(prompt).await
    }

    fn name(&self) -> &str {
        "simple"
    }
}

//! Plan execution loop
//!
//! Binds a plan to one endpoint, then alternates synthesis, HTTP execution
//! and interpretation until the synthesizer reports a result or the budget
//! runs out.
//!
//! # Example
//!
//! ```rust,ignore
//! use caller::{ApiCatalog, Caller, CallerConfig};
//!
//! let caller = Caller::builder(chat_model, Arc::new(catalog))
//!     .with_config(CallerConfig::new("tmdb"))
//!     .build()?;
//!
//! let outcome = caller
//!     .execute("", "GET /search/person to search for the director \"Lee Chang-dong\"")
//!     .await?;
//! println!("{}", outcome.result.text());
//! ```

use crate::budget::Budget;
use crate::catalog::ApiCatalog;
use crate::config::CallerConfig;
use crate::error::{CallerError, Result};
use crate::http::{ActionRequest, ApiClient, ApiResponse, ClientConfig};
use crate::interpreter::{InterpretRequest, ResponseInterpreter, SchemaAwareInterpreter, SimpleInterpreter};
use crate::openapi::Scenario;
use crate::parser::{parse_output, truncate_at_observation, ParsedOutput, Verb};
use crate::policy::NarrowingPolicy;
use crate::prompt::{render_template, render_transcript, stop_sequences, PromptInputs, CALLER_TEMPLATE};
use crate::resolver::{EndpointResolver, PathTemplateResolver};
use crate::tokens::Tokenizer;
use crate::trimmer::DocTrimmer;
use llm::{ChatModel, ChatRequest, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One completed pass: what the synthesizer wrote and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub synthesizer_output: String,
    pub interpreted_result: String,
}

/// Terminal output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineResult {
    /// The synthesizer reported an execution result.
    Completed(String),
    /// The budget ran out; carries the last synthesizer output (empty when no
    /// pass ran).
    BudgetExhausted { last_output: String },
}

impl EngineResult {
    pub fn text(&self) -> &str {
        match self {
            EngineResult::Completed(text) => text,
            EngineResult::BudgetExhausted { last_output } => last_output,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            EngineResult::Completed(text) => text,
            EngineResult::BudgetExhausted { last_output } => last_output,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, EngineResult::Completed(_))
    }
}

/// Result plus the history that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub result: EngineResult,
    pub history: Vec<ExecutionStep>,
    /// Completed passes.
    pub iterations: usize,
    pub elapsed: Duration,
}

/// The plan execution engine.
///
/// Holds only shared read-only state; every call to [`Caller::execute`] owns
/// its history and budget, so one `Caller` can serve concurrent invocations.
pub struct Caller {
    llm: Arc<dyn ChatModel>,
    catalog: Arc<ApiCatalog>,
    resolver: Arc<dyn EndpointResolver>,
    interpreter: Arc<dyn ResponseInterpreter>,
    client: ApiClient,
    trimmer: DocTrimmer,
    policy: NarrowingPolicy,
    config: CallerConfig,
    scenario_key: String,
}

impl Caller {
    pub fn builder(llm: Arc<dyn ChatModel>, catalog: Arc<ApiCatalog>) -> CallerBuilder {
        CallerBuilder::new(llm, catalog)
    }

    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ApiCatalog> {
        &self.catalog
    }

    /// Execute one plan and return only the result text.
    pub async fn run(&self, background: &str, plan: &str) -> Result<String> {
        Ok(self.execute(background, plan).await?.result.into_text())
    }

    /// Execute one plan.
    pub async fn execute(&self, background: &str, plan: &str) -> Result<ExecutionOutcome> {
        let started = Instant::now();
        let mut budget = Budget::starting_at(started, self.config.max_iterations, self.config.max_execution_time()?);

        let endpoint_name = self.resolver.resolve(plan)?;
        let endpoint = self
            .catalog
            .get(&endpoint_name)
            .ok_or_else(|| CallerError::Catalog(format!("resolver returned unknown endpoint {}", endpoint_name)))?;
        let api_url = self.catalog.base_url()?;
        let api_docs = self
            .trimmer
            .render_section(&endpoint_name, &endpoint.documentation, self.config.with_response)?;
        info!(endpoint = %endpoint_name, plan, "Bound plan to endpoint");

        let mut history: Vec<ExecutionStep> = Vec::new();
        let mut last_output = String::new();

        while budget.should_continue() {
            let transcript = render_transcript(
                &history
                    .iter()
                    .map(|step| (step.synthesizer_output.as_str(), step.interpreted_result.as_str()))
                    .collect::<Vec<_>>(),
            );
            let prompt = render_template(
                CALLER_TEMPLATE,
                &PromptInputs {
                    api_url,
                    api_docs: &api_docs,
                    background,
                    api_plan: plan,
                    agent_scratchpad: &transcript,
                },
            );

            let raw = self.synthesize(prompt).await?;
            let output = truncate_at_observation(&raw).to_string();
            info!(iteration = budget.iterations(), output = %output, "Caller output");
            last_output.clone_from(&output);

            let (verb, payload) = match parse_output(&output) {
                ParsedOutput::TerminalResult { text } => {
                    info!(iterations = budget.iterations(), "Plan executed");
                    return Ok(ExecutionOutcome {
                        result: EngineResult::Completed(text),
                        history,
                        iterations: budget.iterations(),
                        elapsed: started.elapsed(),
                    });
                }
                ParsedOutput::Unparseable { raw } => {
                    return Err(CallerError::UnparseableSynthesizerOutput(raw));
                }
                ParsedOutput::ActionRequested { verb, payload } => (verb, payload),
            };

            let verb: Verb = verb.parse()?;
            info!(%verb, input = %payload, "Detected action");
            let request = ActionRequest::from_payload(verb, &payload)?;
            let response = self.client.execute(&request).await?;
            let note = self.interpret(&endpoint_name, &request, response).await?;

            history.push(ExecutionStep {
                synthesizer_output: output,
                interpreted_result: note,
            });
            budget.record_pass();
        }

        warn!(
            iterations = budget.iterations(),
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Budget exhausted; returning last synthesizer output"
        );
        Ok(ExecutionOutcome {
            result: EngineResult::BudgetExhausted { last_output },
            history,
            iterations: budget.iterations(),
            elapsed: started.elapsed(),
        })
    }

    async fn synthesize(&self, prompt: String) -> Result<String> {
        let request = self
            .config
            .generation()
            .apply(ChatRequest::new(vec![Message::human(prompt)]))
            .with_stop_sequences(stop_sequences());
        let response = self.llm.chat(request).await?;
        Ok(response.text().to_string())
    }

    async fn interpret(&self, bound_endpoint: &str, request: &ActionRequest, response: ApiResponse) -> Result<String> {
        let called = self.resolver.resolve(&request.endpoint_query())?;
        let api_path = self.catalog.api_path(&called)?;
        let documentation = self
            .catalog
            .get(&called)
            .map(|endpoint| endpoint.documentation.clone())
            .unwrap_or(Value::Null);
        let documentation = self
            .policy
            .apply(&self.scenario_key, bound_endpoint, request, documentation);
        debug!(called = %called, status = response.status, "Interpreting response");

        let note = self
            .interpreter
            .interpret(&InterpretRequest {
                api_path,
                documentation,
                query: request.output_instructions.clone(),
                description: request.description.clone(),
                descriptor: request.descriptor(),
                raw_response: response.body,
            })
            .await?;
        info!(note = %note, "Interpreter output");
        Ok(note)
    }
}

/// Builder for [`Caller`]. Collaborators not set explicitly are derived from
/// the configuration.
pub struct CallerBuilder {
    llm: Arc<dyn ChatModel>,
    catalog: Arc<ApiCatalog>,
    config: CallerConfig,
    resolver: Option<Arc<dyn EndpointResolver>>,
    interpreter: Option<Arc<dyn ResponseInterpreter>>,
    interpreter_llm: Option<Arc<dyn ChatModel>>,
    client: Option<ApiClient>,
    policy: NarrowingPolicy,
}

impl CallerBuilder {
    pub fn new(llm: Arc<dyn ChatModel>, catalog: Arc<ApiCatalog>) -> Self {
        Self {
            llm,
            catalog,
            config: CallerConfig::default(),
            resolver: None,
            interpreter: None,
            interpreter_llm: None,
            client: None,
            policy: NarrowingPolicy::default(),
        }
    }

    pub fn with_config(mut self, config: CallerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn ResponseInterpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    /// Model used by the default interpreter. Defaults to the synthesizer's.
    pub fn with_interpreter_model(mut self, llm: Arc<dyn ChatModel>) -> Self {
        self.interpreter_llm = Some(llm);
        self
    }

    pub fn with_client(mut self, client: ApiClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_policy(mut self, policy: NarrowingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<Caller> {
        self.config.validate()?;
        let tokenizer = Tokenizer::for_model(&self.config.encoding_model)?;

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(PathTemplateResolver::new(self.catalog.clone())?),
        };

        let interpreter = match self.interpreter {
            Some(interpreter) => interpreter,
            None => {
                let llm = self.interpreter_llm.unwrap_or_else(|| self.llm.clone());
                let budget = self.config.response_token_budget;
                let generation = self.config.generation();
                if self.config.simple_parser {
                    Arc::new(SimpleInterpreter::new(llm, tokenizer.clone(), budget).with_generation(generation))
                        as Arc<dyn ResponseInterpreter>
                } else {
                    Arc::new(SchemaAwareInterpreter::new(llm, tokenizer.clone(), budget).with_generation(generation))
                }
            }
        };

        let client = match self.client {
            Some(client) => client,
            None => ApiClient::new(ClientConfig::default())?,
        };

        let scenario_key = self
            .config
            .scenario
            .parse::<Scenario>()
            .map(|scenario| scenario.key().to_string())
            .unwrap_or_else(|_| self.config.scenario.clone());

        Ok(Caller {
            llm: self.llm,
            catalog: self.catalog,
            resolver,
            interpreter,
            client,
            trimmer: DocTrimmer::new(tokenizer, self.config.doc_token_budget),
            policy: self.policy,
            config: self.config,
            scenario_key,
        })
    }
}

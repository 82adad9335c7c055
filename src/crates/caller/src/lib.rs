//! # caller
//!
//! Plan execution engine. Takes one natural-language plan step such as
//! `GET /search/person to search for the director "Lee Chang-dong"`, binds it
//! to a documented endpoint, lets a language model synthesize the HTTP
//! request, executes it, and turns the response back into a natural-language
//! fact.
//!
//! ## Pieces
//!
//! - [`catalog`] / [`openapi`]: immutable endpoint catalog built from an
//!   OpenAPI description
//! - [`resolver`]: plan text to exactly one endpoint
//! - [`trimmer`] / [`tokens`]: token-bounded endpoint documentation
//! - [`prompt`] / [`parser`] / [`repair`]: the synthesizer's text protocol
//! - [`http`]: request execution
//! - [`interpreter`] / [`policy`]: response interpretation
//! - [`engine`]: the bounded loop tying it together
//!
//! Non-2xx responses are not errors. Their bodies are interpreted like any
//! other response and end up in the transcript, where the synthesizer can
//! react to them. Nothing is retried automatically.

pub mod budget;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod interpreter;
pub mod openapi;
pub mod parser;
pub mod policy;
pub mod prompt;
pub mod repair;
pub mod resolver;
pub mod tokens;
pub mod trimmer;

pub use budget::Budget;
pub use catalog::{ApiCatalog, EndpointDoc, SUPPORTED_VERBS};
pub use config::{CallerConfig, GenerationSettings};
pub use engine::{Caller, CallerBuilder, EngineResult, ExecutionOutcome, ExecutionStep};
pub use error::{CallerError, Result};
pub use http::{ActionRequest, ApiClient, ApiResponse, ClientConfig};
pub use interpreter::{InterpretRequest, ResponseInterpreter, SchemaAwareInterpreter, SimpleInterpreter};
pub use openapi::{merge_spec_files, reduce_openapi_spec, ReduceOptions, Scenario};
pub use parser::{parse_output, ParsedOutput, Verb};
pub use policy::{NarrowingPolicy, NarrowingRule};
pub use resolver::{EndpointResolver, PathTemplateResolver};
pub use tokens::Tokenizer;
pub use trimmer::DocTrimmer;

//! Caller CLI - execute one API plan step against a documented REST API
//!
//! Main entry point for the caller command-line tool.

mod config;

use anyhow::{Context, Result};
use caller::openapi::load_json;
use caller::{
    merge_spec_files, ApiCatalog, ApiClient, Caller, CallerError, ClientConfig, EndpointResolver, PathTemplateResolver,
    Scenario,
};
use clap::{Parser, Subcommand};
use config::RunConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caller")]
#[command(about = "Caller - execute natural-language API plans against a REST API", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one plan step
    Run {
        /// Run configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,
        /// Plan to execute; overrides `plan` in the config
        #[arg(short, long)]
        plan: Option<String>,
        /// Background facts; overrides `background` in the config
        #[arg(short, long)]
        background: Option<String>,
    },

    /// List the endpoints of an API description
    Endpoints {
        /// API description (JSON)
        #[arg(short, long)]
        spec: PathBuf,
        /// Scenario: tmdb, spotify, github, gitlab, docker, kubernetes, jenkins
        #[arg(long, default_value = "tmdb")]
        scenario: String,
    },

    /// Show which endpoint a plan binds to
    Resolve {
        /// API description (JSON)
        #[arg(short, long)]
        spec: PathBuf,
        #[arg(long, default_value = "tmdb")]
        scenario: String,
        /// Plan text, e.g. "GET /movie/550 to get the details"
        text: String,
    },

    /// Merge a directory of API descriptions into one document
    MergeSpecs {
        /// Directory of *.json descriptions
        #[arg(short, long)]
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Title of the merged document
        #[arg(short, long, default_value = "Merged")]
        title: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_catalog(spec: &Path, scenario: &str) -> Result<ApiCatalog> {
    let scenario: Scenario = scenario.parse()?;
    let document = load_json(spec).with_context(|| format!("failed to load API description {}", spec.display()))?;
    Ok(scenario.load_catalog(&document)?)
}

async fn handle_run(config_path: PathBuf, plan: Option<String>, background: Option<String>) -> Result<()> {
    let config = RunConfig::load(&config_path)?;
    let plan = plan
        .or_else(|| config.plan.clone())
        .context("no plan given: pass --plan or set `plan` in the run config")?;
    let background = background.or_else(|| config.background.clone()).unwrap_or_default();

    let catalog = Arc::new(load_catalog(&config.spec_path, &config.scenario)?);
    info!(scenario = %config.scenario, endpoints = catalog.len(), "Loaded catalog");

    let mut client_config = ClientConfig::default();
    if let Some(auth) = &config.auth {
        let (header, value) = auth.header_pair()?;
        client_config = client_config.with_header(header, value);
    }

    let synthesizer = llm::build_chat_model(&config.synthesizer)?;
    if !synthesizer.is_available().await.unwrap_or(false) {
        warn!(model = synthesizer.model_name(), "Synthesizer model is not reachable");
    }
    let interpreter = llm::build_chat_model(config.interpreter_settings())?;
    let caller = Caller::builder(synthesizer, catalog)
        .with_config(config.caller.clone())
        .with_interpreter_model(interpreter)
        .with_client(ApiClient::new(client_config)?)
        .build()?;

    let outcome = caller.execute(&background, &plan).await.inspect_err(|err| {
        if let Some(hint) = failure_hint(err) {
            warn!(hint, "Run failed");
        }
    })?;
    println!("{}", outcome.result.text());
    if !outcome.result.is_completed() {
        eprintln!("⚠ Budget exhausted after {} passes; showing the last output", outcome.iterations);
    }
    println!("Elapsed: {:.2}s", outcome.elapsed.as_secs_f64());
    Ok(())
}

/// What to check after a failed run, when the error points somewhere.
fn failure_hint(err: &CallerError) -> Option<&'static str> {
    match err {
        CallerError::Llm(e) if e.is_auth_error() => Some("check api_key_env in the model settings"),
        CallerError::Llm(e) if e.is_retryable() => Some("the model provider is busy or unreachable, try again"),
        _ if err.is_remote() => Some("a remote call failed; rerun with --verbose to see the request log"),
        _ => None,
    }
}

fn handle_endpoints(spec: &Path, scenario: &str) -> Result<()> {
    let catalog = load_catalog(spec, scenario)?;
    println!("Base url: {}", catalog.base_url()?);
    println!("{} endpoints", catalog.len());
    println!("{}", "-".repeat(80));
    for endpoint in &catalog.endpoints {
        println!("{:<50} {}", endpoint.name, endpoint.description.lines().next().unwrap_or_default());
    }
    Ok(())
}

fn handle_resolve(spec: &Path, scenario: &str, text: &str) -> Result<()> {
    let catalog = Arc::new(load_catalog(spec, scenario)?);
    let resolver = PathTemplateResolver::new(catalog)?;
    println!("{}", resolver.resolve(text)?);
    Ok(())
}

async fn handle_merge_specs(input: &Path, output: &Path, title: &str) -> Result<()> {
    let merged = merge_spec_files(input, title)?;
    let count = merged
        .get("paths")
        .and_then(|paths| paths.as_object())
        .map(|paths| paths.len())
        .unwrap_or(0);
    tokio::fs::write(output, serde_json::to_string_pretty(&merged)?)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("✓ Merged {} paths into {}", count, output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { config, plan, background } => handle_run(config, plan, background).await,
        Commands::Endpoints { spec, scenario } => handle_endpoints(&spec, &scenario),
        Commands::Resolve { spec, scenario, text } => handle_resolve(&spec, &scenario, &text),
        Commands::MergeSpecs { input, output, title } => handle_merge_specs(&input, &output, &title).await,
    }
}

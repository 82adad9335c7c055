//! Integration tests for the plan execution loop
//!
//! The synthesizer is a scripted model, the interpreter a recording stub, and
//! the REST API an in-process axum server on a loopback port.

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use caller::{
    ApiCatalog, Caller, CallerConfig, CallerError, EndpointDoc, EngineResult, InterpretRequest, ResponseInterpreter,
};
use llm::{ChatModel, ChatRequest, ChatResponse, LlmError, Message};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

// ===== Test doubles =====

/// Chat model that replays a script. The last reply repeats once the script
/// is exhausted.
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
    stops: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
        let prompt = request.messages.iter().map(|m| m.text()).collect::<Vec<_>>().join("\n");
        self.prompts.lock().unwrap().push(prompt);
        self.stops.lock().unwrap().push(request.config.stop_sequences.clone());

        let next = self.replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("script is empty".to_string()))?,
        };
        Ok(ChatResponse::new(Message::assistant(reply)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Interpreter that records its inputs and answers from a fixed rule.
#[derive(Default)]
struct RecordingInterpreter {
    requests: Mutex<Vec<InterpretRequest>>,
}

impl RecordingInterpreter {
    fn requests(&self) -> Vec<InterpretRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseInterpreter for RecordingInterpreter {
    async fn interpret(&self, request: &InterpretRequest) -> caller::Result<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());

        let note = if request.raw_response.contains("5309") {
            "Successfully called GET /search/person to search for the director \"Lee Chang-dong\". The id of Lee Chang-dong is 5309.".to_string()
        } else if request.raw_response.contains("Not Found") {
            "The API call failed: the requested resource was Not Found.".to_string()
        } else {
            format!("Observation {}", requests.len())
        };
        Ok(note)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ===== Loopback API =====

type Hits = Arc<Mutex<Vec<String>>>;

async fn search_person(State(hits): State<Hits>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let name = query.get("query").cloned().unwrap_or_default();
    hits.lock().unwrap().push(format!("GET /search/person?query={}", name));
    if name == "Lee Chang-dong" {
        Json(json!({"page": 1, "results": [{"id": 5309, "name": "Lee Chang-dong", "known_for_department": "Directing"}]}))
    } else {
        Json(json!({"page": 1, "results": []}))
    }
}

async fn movie(State(hits): State<Hits>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    hits.lock().unwrap().push(format!("GET /movie/{}", id));
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not Found"})))
}

async fn add_item(State(hits): State<Hits>, Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    hits.lock().unwrap().push(format!("POST /list/{}/add_item", id));
    Json(json!({"success": true, "list_id": id, "received": body}))
}

async fn search(State(hits): State<Hits>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    hits.lock().unwrap().push(format!("GET /search?type={}", query.get("type").cloned().unwrap_or_default()));
    Json(json!({"artists": {"items": [{"id": "2DaxqgrOhkeH0fpeiQq2f4", "name": "Oasis"}]}}))
}

async fn spawn_api() -> (SocketAddr, Hits) {
    let hits: Hits = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/3/search/person", get(search_person))
        .route("/3/movie/:id", get(movie))
        .route("/3/list/:id/add_item", post(add_item))
        .route("/3/search", get(search))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, hits)
}

fn base_url(addr: SocketAddr) -> String {
    format!("http://{}/3", addr)
}

fn catalog(base: &str) -> Arc<ApiCatalog> {
    let music_search = json!({
        "description": "Search the music catalog",
        "parameters": [{"name": "q", "required": true}, {"name": "type", "required": true}],
        "responses": {"content": {"application/json": {"schema": {"type": "object", "properties": {
            "artists": {"type": "object"},
            "albums": {"type": "object"},
            "tracks": {"type": "object"}
        }}}}}
    });

    Arc::new(ApiCatalog::new(
        vec![base.to_string()],
        "Test API",
        vec![
            EndpointDoc::new(
                "GET /search/person",
                "Search for people",
                json!({
                    "parameters": [{"name": "query", "in": "query", "required": true}],
                    "responses": {"content": {"application/json": {"schema": {"properties": {
                        "results": {"type": "array", "items": {"properties": {"known_for": {"type": "array"}}}}
                    }}}}}
                }),
            ),
            EndpointDoc::new("GET /movie/{movie_id}", "Movie details", json!({})),
            EndpointDoc::new("POST /list/{list_id}/add_item", "Add a movie to a list", json!({})),
            EndpointDoc::new("GET /search", "Search the music catalog", music_search),
        ],
    ))
}

fn build(model: &Arc<ScriptedModel>, interpreter: &Arc<RecordingInterpreter>, base: &str, config: CallerConfig) -> Caller {
    Caller::builder(model.clone(), catalog(base))
        .with_interpreter(interpreter.clone())
        .with_config(config)
        .build()
        .unwrap()
}

const SEARCH_PLAN: &str = "GET /search/person to search for the director \"Lee Chang-dong\"";

fn search_action(base: &str) -> String {
    format!(
        r#"I need to search for the director.
Operation: GET
Input: {{
    "url": "{}/search/person",
    "params": {{"query": "Lee Chang-dong"}},
    "description": "The API response is a list of people matching the query.",
    "output_instructions": "What is the id of Lee Chang-dong?"
}}"#,
        base
    )
}

// ===== Scenarios =====

#[tokio::test]
async fn test_search_person_then_result() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let final_text = "Successfully called GET /search/person to search for the director \"Lee Chang-dong\". The id of Lee Chang-dong is 5309.";
    let model = ScriptedModel::new([
        search_action(&base),
        format!("I am finished executing the plan.\nExecution Result: {}", final_text),
    ]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let outcome = caller.execute("", SEARCH_PLAN).await.unwrap();

    assert_eq!(outcome.result, EngineResult::Completed(final_text.to_string()));
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0].synthesizer_output, search_action(&base));
    assert_eq!(hits.lock().unwrap().clone(), vec!["GET /search/person?query=Lee Chang-dong"]);

    let requests = interpreter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].api_path, format!("{}/search/person", base));
    assert_eq!(requests[0].query.as_deref(), Some("What is the id of Lee Chang-dong?"));
    assert_eq!(
        requests[0].descriptor,
        json!({"params": {"query": "Lee Chang-dong"}, "data": "No request body"})
    );
    assert!(requests[0].raw_response.contains("\"id\":5309"));

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains(&format!("Base url: {}", base)));
    assert!(prompts[0].contains("== Docs for GET /search/person == \n"));
    assert!(!prompts[0].contains("known_for"), "response schema must stay hidden");
    assert!(prompts[0].ends_with("Thought: \n"));
    assert!(prompts[1].ends_with(&format!(
        "Thought: {}\nResponse: {}\nThought: \n",
        search_action(&base),
        final_text
    )));

    for stops in model.stops.lock().unwrap().iter() {
        assert_eq!(stops, &vec!["\nResponse:".to_string(), "\n\tResponse:".to_string()]);
    }
}

#[tokio::test]
async fn test_response_schema_shown_when_enabled() {
    let (addr, _hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new(["Execution Result: nothing to do"]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb").with_response(true));

    caller.execute("", SEARCH_PLAN).await.unwrap();
    assert!(model.prompts()[0].contains("known_for"));
}

#[tokio::test]
async fn test_error_status_becomes_observation() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new([
        format!(
            "Operation: GET\nInput: {{\"url\": \"{}/movie/550\", \"description\": \"Details of movie 550\", \"output_instructions\": \"What is the title?\"}}",
            base
        ),
        "The movie does not exist.\nExecution Result: Movie 550 could not be found.".to_string(),
    ]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let outcome = caller.execute("", "GET /movie/550 to get the details of the movie").await.unwrap();

    assert_eq!(outcome.result.text(), "Movie 550 could not be found.");
    assert_eq!(hits.lock().unwrap().clone(), vec!["GET /movie/550"]);

    let requests = interpreter.requests();
    assert_eq!(requests[0].raw_response, r#"{"error":"Not Found"}"#);
    assert_eq!(requests[0].api_path, format!("{}/movie/{{movie_id}}", base));
    assert_eq!(requests[0].descriptor["params"], "No parameters");

    let prompts = model.prompts();
    assert!(prompts[1].contains("Response: The API call failed: the requested resource was Not Found.\nThought: \n"));
}

#[tokio::test]
async fn test_budget_exhaustion_returns_last_output() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new([search_action(&base)]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let config = CallerConfig::new("tmdb").with_max_iterations(Some(2));
    let caller = build(&model, &interpreter, &base, config);

    let outcome = caller.execute("", SEARCH_PLAN).await.unwrap();

    assert_eq!(
        outcome.result,
        EngineResult::BudgetExhausted {
            last_output: search_action(&base)
        }
    );
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(model.calls(), 2);
    assert_eq!(hits.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_transcript_replays_history_in_order() {
    let (addr, _hits) = spawn_api().await;
    let base = base_url(addr);
    let first = format!("Operation: GET\nInput: {{\"url\": \"{}/search/person\", \"params\": {{\"query\": \"Bong Joon-ho\"}}}}", base);
    let second = format!("Operation: GET\nInput: {{\"url\": \"{}/search/person\", \"params\": {{\"query\": \"Park Chan-wook\"}}}}", base);
    let model = ScriptedModel::new([first.clone(), second.clone(), "Execution Result: done".to_string()]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let outcome = caller.execute("The user likes Korean cinema.", SEARCH_PLAN).await.unwrap();
    assert_eq!(outcome.result.text(), "done");

    let prompts = model.prompts();
    assert!(prompts[0].contains("Background: The user likes Korean cinema.\n"));
    assert!(prompts[1].ends_with(&format!("Thought: {}\nResponse: Observation 1\nThought: \n", first)));
    assert!(prompts[2].ends_with(&format!(
        "Thought: {}\nResponse: Observation 1\nThought: {}\nResponse: Observation 2\nThought: \n",
        first, second
    )));
}

#[tokio::test]
async fn test_invented_observation_is_discarded() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let action = search_action(&base);
    let model = ScriptedModel::new([
        format!("{}\nResponse: {{\"results\": [{{\"id\": 1}}]}}\nExecution Result: The id is 1.", action),
        "Execution Result: The id of Lee Chang-dong is 5309.".to_string(),
    ]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let outcome = caller.execute("", SEARCH_PLAN).await.unwrap();

    assert_eq!(outcome.result.text(), "The id of Lee Chang-dong is 5309.");
    assert_eq!(outcome.history[0].synthesizer_output, action);
    assert_eq!(hits.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new([
        format!(
            "Operation: POST\nInput: {{\n    \"url\": \"{}/list/8241/add_item\",\n    \"data\": {{\"media_id\": 550}}\n    \"description\": \"Adds a movie to the list\"\n}}",
            base
        ),
        "Execution Result: Movie 550 was added to list 8241.".to_string(),
    ]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let result = caller
        .run("The list id is 8241.", "POST /list/8241/add_item to add movie 550 to the list")
        .await
        .unwrap();

    assert_eq!(result, "Movie 550 was added to list 8241.");
    assert_eq!(hits.lock().unwrap().clone(), vec!["POST /list/8241/add_item"]);
    let requests = interpreter.requests();
    assert!(requests[0].raw_response.contains("\"media_id\":550"));
    assert_eq!(
        requests[0].descriptor,
        json!({"params": "No parameters", "data": {"media_id": 550}})
    );
    assert_eq!(requests[0].description, "Adds a movie to the list");
}

#[tokio::test]
async fn test_music_search_documentation_is_narrowed() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new([
        format!(
            "Operation: GET\nInput: {{\"url\": \"{}/search?q=Oasis&type=artist\", \"output_instructions\": \"What is the id of Oasis?\"}}",
            base
        ),
        "Execution Result: The id of Oasis is 2DaxqgrOhkeH0fpeiQq2f4.".to_string(),
    ]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("spotify"));

    caller.execute("", "GET /search to find the artist Oasis").await.unwrap();

    assert_eq!(hits.lock().unwrap().clone(), vec!["GET /search?type=artist"]);
    let documentation = &interpreter.requests()[0].documentation;
    let properties = documentation
        .pointer("/responses/content/application~1json/schema/properties")
        .and_then(Value::as_object)
        .unwrap();
    assert_eq!(properties.keys().collect::<Vec<_>>(), vec!["artists"]);

    // The catalog itself keeps every property.
    let catalog_doc = &caller.catalog().get("GET /search").unwrap().documentation;
    assert_eq!(
        catalog_doc
            .pointer("/responses/content/application~1json/schema/properties")
            .and_then(Value::as_object)
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_other_scenarios_are_not_narrowed() {
    let (addr, _hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new([
        format!("Operation: GET\nInput: {{\"url\": \"{}/search\", \"params\": {{\"q\": \"Oasis\", \"type\": \"artist\"}}}}", base),
        "Execution Result: done".to_string(),
    ]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    caller.execute("", "GET /search to find the artist Oasis").await.unwrap();
    let documentation = &interpreter.requests()[0].documentation;
    assert_eq!(
        documentation
            .pointer("/responses/content/application~1json/schema/properties")
            .and_then(Value::as_object)
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_called_endpoint_must_be_documented() {
    let (addr, hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new([format!("Operation: GET\nInput: {{\"url\": \"{}/trending/tv/day\"}}", base)]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let err = caller.execute("", SEARCH_PLAN).await.unwrap_err();
    assert!(matches!(err, CallerError::AmbiguousOrUnknownEndpoint { .. }), "got {err}");
    assert!(interpreter.requests().is_empty());
    assert!(hits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = base_url(addr);
    let model = ScriptedModel::new([search_action(&base)]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    let err = caller.execute("", SEARCH_PLAN).await.unwrap_err();
    assert!(matches!(err, CallerError::RemoteCallFailure(_)), "got {err}");
    assert!(err.is_remote());
}

#[tokio::test]
async fn test_malformed_payload_propagates() {
    let (addr, _hits) = spawn_api().await;
    let base = base_url(addr);
    let model = ScriptedModel::new(["Operation: GET\nInput: search for Lee Chang-dong please"]);
    let interpreter = Arc::new(RecordingInterpreter::default());
    let caller = build(&model, &interpreter, &base, CallerConfig::new("tmdb"));

    assert!(matches!(
        caller.execute("", SEARCH_PLAN).await,
        Err(CallerError::MalformedActionPayload(_))
    ));
}

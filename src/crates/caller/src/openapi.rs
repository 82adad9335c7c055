//! OpenAPI reduction
//!
//! Turns an OpenAPI document (or a flat `{ url: { method: docs } }` map) into
//! an [`ApiCatalog`]. Reduction keeps only what the synthesizer needs:
//! description, summary, parameters, request body and the success response.

use crate::catalog::{ApiCatalog, EndpointDoc, SUPPORTED_VERBS};
use crate::error::{CallerError, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Options controlling [`reduce_openapi_spec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Inline `$ref` targets.
    pub dereference: bool,
    /// Keep only required parameters.
    pub only_required: bool,
    /// Collapse `allOf` compositions into a single object schema.
    pub merge_allof: bool,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            dereference: false,
            only_required: true,
            merge_allof: false,
        }
    }
}

impl ReduceOptions {
    pub fn with_dereference(mut self, enabled: bool) -> Self {
        self.dereference = enabled;
        self
    }

    pub fn with_only_required(mut self, enabled: bool) -> Self {
        self.only_required = enabled;
        self
    }

    pub fn with_merge_allof(mut self, enabled: bool) -> Self {
        self.merge_allof = enabled;
        self
    }
}

/// The operations map of a document: `paths` when present, else the root.
pub(crate) fn paths_of(spec: &Value) -> Option<&Map<String, Value>> {
    spec.get("paths")
        .and_then(Value::as_object)
        .or_else(|| spec.as_object())
}

/// Iterate `(endpoint name, description, raw docs)` for every supported verb.
pub(crate) fn raw_endpoints(spec: &Value) -> Vec<(String, String, Value)> {
    let mut endpoints = Vec::new();
    let Some(paths) = paths_of(spec) else {
        return endpoints;
    };

    for (url, operations) in paths {
        let Some(operations) = operations.as_object() else {
            continue;
        };
        for (method, docs) in operations {
            let verb = method.to_uppercase();
            if !SUPPORTED_VERBS.contains(&verb.as_str()) {
                continue;
            }
            endpoints.push((format!("{} {}", verb, url), describe(docs), docs.clone()));
        }
    }
    endpoints
}

fn describe(docs: &Value) -> String {
    ["summary", "description"]
        .iter()
        .filter_map(|key| docs.get(*key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Reduce an OpenAPI document to a catalog.
pub fn reduce_openapi_spec(spec: &Value, options: ReduceOptions) -> Result<ApiCatalog> {
    let mut endpoints = Vec::new();

    for (name, description, docs) in raw_endpoints(spec) {
        let mut docs = docs;
        if options.dereference {
            docs = dereference_refs(&docs, spec)?;
        }
        if options.merge_allof {
            docs = merge_allof_properties(&docs);
        }
        endpoints.push(EndpointDoc::new(
            name,
            description,
            reduce_endpoint_docs(&docs, options.only_required),
        ));
    }

    let mut servers: Vec<String> = spec
        .get("servers")
        .and_then(Value::as_array)
        .map(|servers| {
            servers
                .iter()
                .filter_map(|s| s.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if servers.is_empty() {
        servers.extend(detect_base_url(spec));
    }

    let description = spec
        .pointer("/info/description")
        .and_then(Value::as_str)
        .unwrap_or_default();

    debug!(endpoints = endpoints.len(), servers = ?servers, "Reduced API description");
    Ok(ApiCatalog::new(servers, description, endpoints))
}

/// Keep description, summary, parameters, requestBody and the first success
/// response (200, 201 or default).
pub fn reduce_endpoint_docs(docs: &Value, only_required: bool) -> Value {
    let mut out = Map::new();

    for key in ["description", "summary"] {
        if let Some(text) = docs.get(key).filter(|v| is_truthy(v)) {
            out.insert(key.to_string(), text.clone());
        }
    }

    if let Some(params) = docs.get("parameters").and_then(Value::as_array) {
        if !params.is_empty() {
            let kept: Vec<Value> = params
                .iter()
                .filter(|p| !only_required || p.get("required").and_then(Value::as_bool).unwrap_or(false))
                .cloned()
                .collect();
            out.insert("parameters".to_string(), Value::Array(kept));
        }
    }

    if let Some(body) = docs.get("requestBody").filter(|v| is_truthy(v)) {
        out.insert("requestBody".to_string(), body.clone());
    }

    if let Some(responses) = docs.get("responses").and_then(Value::as_object) {
        if let Some(success) = ["200", "201", "default"].iter().find_map(|code| responses.get(*code)) {
            out.insert("responses".to_string(), success.clone());
        }
    }

    Value::Object(out)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

/// Substitute `#/...` references with their targets.
///
/// Cyclic references are left as the original `$ref` object.
pub fn dereference_refs(obj: &Value, full_spec: &Value) -> Result<Value> {
    let mut stack = Vec::new();
    deref_inner(obj, full_spec, &mut stack)
}

fn deref_inner(obj: &Value, full_spec: &Value, stack: &mut Vec<String>) -> Result<Value> {
    match obj {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if stack.iter().any(|r| r == reference) {
                    return Ok(obj.clone());
                }
                let target = retrieve_ref(reference, full_spec)?;
                stack.push(reference.to_string());
                let resolved = deref_inner(target, full_spec, stack);
                stack.pop();
                return resolved;
            }
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), deref_inner(value, full_spec, stack)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| deref_inner(item, full_spec, stack))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn retrieve_ref<'a>(reference: &str, full_spec: &'a Value) -> Result<&'a Value> {
    let pointer = reference.strip_prefix('#').ok_or_else(|| {
        CallerError::Catalog(format!("only local $ref fragments are supported: {}", reference))
    })?;
    full_spec
        .pointer(pointer)
        .ok_or_else(|| CallerError::Catalog(format!("unresolvable $ref: {}", reference)))
}

/// Replace every `allOf` composition with one object schema.
pub fn merge_allof_properties(obj: &Value) -> Value {
    match obj {
        Value::Object(map) => {
            if let Some(parts) = map.get("allOf").and_then(Value::as_array) {
                return merge_allof_properties(&merge_parts(parts));
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), merge_allof_properties(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(merge_allof_properties).collect()),
        other => other.clone(),
    }
}

fn merge_parts(parts: &[Value]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for part in parts {
        let part = match part.get("allOf").and_then(Value::as_array) {
            Some(nested) => merge_parts(nested),
            None => part.clone(),
        };
        if let Some(props) = part.get("properties").and_then(Value::as_object) {
            properties.extend(props.clone());
        }
        if let Some(req) = part.get("required").and_then(Value::as_array) {
            required.extend(req.iter().cloned());
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Scheme and authority of the last absolute URL key in the document.
pub fn detect_base_url(spec: &Value) -> Option<String> {
    paths_of(spec)?
        .keys()
        .filter(|key| key.starts_with("http"))
        .filter_map(|key| reqwest::Url::parse(key).ok())
        .map(|url| url.origin().ascii_serialization())
        .last()
}

/// Merge every `*.json` API description in `dir` into one OpenAPI document
/// keyed by absolute URL.
///
/// Files that cannot be read or reduced are skipped with a warning.
pub fn merge_spec_files(dir: &Path, title: &str) -> Result<Value> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    info!(count = files.len(), dir = %dir.display(), "Merging API descriptions");

    let mut merged: Map<String, Value> = Map::new();
    for path in &files {
        let catalog = match load_json(path).and_then(|spec| reduce_openapi_spec(&spec, ReduceOptions::default())) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping API description");
                continue;
            }
        };

        for endpoint in catalog.endpoints {
            let Some((method, url)) = endpoint.name.split_once(' ') else {
                continue;
            };
            let operations = merged
                .entry(url.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(operations) = operations.as_object_mut() {
                operations.insert(method.to_lowercase(), endpoint.documentation);
            }
        }
    }

    Ok(json!({
        "openapi": "3.0.0",
        "info": {
            "title": title,
            "version": "1.0.0",
            "description": format!("{} APIs", title),
        },
        "paths": merged,
    }))
}

/// Known API families. Only the part before the first `_` matters, so
/// `tmdb_long` selects [`Scenario::Tmdb`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scenario {
    Tmdb,
    Spotify,
    /// github, gitlab, docker, kubernetes or jenkins.
    ChatOps(String),
}

impl FromStr for Scenario {
    type Err = CallerError;

    fn from_str(s: &str) -> Result<Self> {
        let family = s.split('_').next().unwrap_or_default().to_lowercase();
        match family.as_str() {
            "tmdb" => Ok(Scenario::Tmdb),
            "spotify" => Ok(Scenario::Spotify),
            "github" | "gitlab" | "docker" | "kubernetes" | "jenkins" => Ok(Scenario::ChatOps(family)),
            _ => Err(CallerError::Config(format!("Unsupported scenario: {}", s))),
        }
    }
}

impl Scenario {
    /// Key used by the narrowing policy table.
    pub fn key(&self) -> &str {
        match self {
            Scenario::Tmdb => "tmdb",
            Scenario::Spotify => "spotify",
            Scenario::ChatOps(_) => "chatops",
        }
    }

    /// Build the catalog for this scenario from a raw API description.
    pub fn load_catalog(&self, spec: &Value) -> Result<ApiCatalog> {
        match self {
            Scenario::Tmdb => reduce_openapi_spec(spec, ReduceOptions::default().with_only_required(false)),
            Scenario::Spotify => reduce_openapi_spec(
                spec,
                ReduceOptions::default()
                    .with_only_required(false)
                    .with_merge_allof(true),
            ),
            Scenario::ChatOps(system) => Ok(load_verbatim(spec, system)),
        }
    }
}

/// Endpoints keyed by absolute URL, documentation kept as written.
fn load_verbatim(spec: &Value, system: &str) -> ApiCatalog {
    let endpoints = raw_endpoints(spec)
        .into_iter()
        .map(|(name, description, docs)| EndpointDoc::new(name, description, docs))
        .collect();
    let base_url = detect_base_url(spec).unwrap_or_else(|| "http://localhost".to_string());
    ApiCatalog::new(vec![base_url], format!("{} Data", system), endpoints)
}

/// Read a JSON document from disk.
pub fn load_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

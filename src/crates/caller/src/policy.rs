//! Scenario-specific narrowing of response documentation.
//!
//! Rules are keyed by `(scenario, bound endpoint name)` and run on a copy of
//! the called endpoint's documentation before it reaches the interpreter.

use crate::http::ActionRequest;
use crate::trimmer::json_media_mut;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A narrowing rule: takes the request that was sent and the documentation,
/// returns the documentation to show.
pub type NarrowingRule = Arc<dyn Fn(&ActionRequest, Value) -> Value + Send + Sync>;

/// Table of narrowing rules.
#[derive(Clone)]
pub struct NarrowingPolicy {
    rules: HashMap<(String, String), NarrowingRule>,
}

impl fmt::Debug for NarrowingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrowingPolicy")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for NarrowingPolicy {
    /// Registers the music-search rule for `("spotify", "GET /search")`.
    fn default() -> Self {
        Self::empty().with_rule("spotify", "GET /search", Arc::new(narrow_search_by_type))
    }
}

impl NarrowingPolicy {
    /// A table with no rules.
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    pub fn register(&mut self, scenario: impl Into<String>, endpoint: impl Into<String>, rule: NarrowingRule) {
        self.rules.insert((scenario.into(), endpoint.into()), rule);
    }

    pub fn with_rule(mut self, scenario: impl Into<String>, endpoint: impl Into<String>, rule: NarrowingRule) -> Self {
        self.register(scenario, endpoint, rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the rule for `(scenario, bound_endpoint)`, if any.
    pub fn apply(&self, scenario: &str, bound_endpoint: &str, request: &ActionRequest, doc: Value) -> Value {
        match self.rules.get(&(scenario.to_string(), bound_endpoint.to_string())) {
            Some(rule) => {
                debug!(scenario, endpoint = bound_endpoint, "Applying narrowing rule");
                rule(request, doc)
            }
            None => doc,
        }
    }
}

/// Keep only the response property named after the searched type plus "s"
/// (`type=artist` keeps `artists`).
pub fn narrow_search_by_type(request: &ActionRequest, mut doc: Value) -> Value {
    let Some(search_type) = request.query_value("type") else {
        debug!(url = %request.url, "Search request has no type; documentation left as is");
        return doc;
    };
    let property = format!("{}s", search_type);

    let properties = doc
        .get_mut("responses")
        .and_then(|r| r.get_mut("content"))
        .and_then(Value::as_object_mut)
        .and_then(json_media_mut)
        .and_then(|media| media.get_mut("schema"))
        .and_then(|schema| schema.get_mut("properties"))
        .and_then(Value::as_object_mut);

    match properties {
        Some(properties) => match properties.remove(&property) {
            Some(kept) => {
                let mut narrowed = Map::new();
                narrowed.insert(property, kept);
                *properties = narrowed;
            }
            None => warn!(property = %property, "Search response has no such property; documentation left as is"),
        },
        None => warn!("Search documentation has no response properties; documentation left as is"),
    }
    doc
}

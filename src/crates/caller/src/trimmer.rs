//! Documentation trimming
//!
//! Per-invocation rendering of one endpoint's documentation for the
//! synthesizer prompt. Catalog entries are never modified; every call works
//! on its own copy.

use crate::error::Result;
use crate::tokens::Tokenizer;
use serde_json::{Map, Value};
use tracing::debug;

/// Default token budget for the rendered documentation.
pub const DEFAULT_DOC_TOKEN_BUDGET: usize = 1500;

/// The JSON media entry of a `content` map, accepting charset-qualified keys
/// such as `application/json; charset=utf-8`.
pub fn json_media(content: &Map<String, Value>) -> Option<&Value> {
    content.get("application/json").or_else(|| {
        content
            .iter()
            .find(|(key, _)| key.starts_with("application/json;"))
            .map(|(_, media)| media)
    })
}

/// Mutable counterpart of [`json_media`].
pub fn json_media_mut(content: &mut Map<String, Value>) -> Option<&mut Value> {
    let key = if content.contains_key("application/json") {
        "application/json".to_string()
    } else {
        content
            .keys()
            .find(|key| key.starts_with("application/json;"))?
            .clone()
    };
    content.get_mut(&key)
}

/// Replace the response section with its schema's property map (or the
/// schema itself when it has none), then drop it unless `with_response`.
///
/// Applying this to its own output changes nothing.
pub fn reduce_documentation(doc: &Value, with_response: bool) -> Value {
    let mut doc = doc.clone();
    let Some(map) = doc.as_object_mut() else {
        return doc;
    };

    let schema = map
        .get("responses")
        .and_then(|r| r.get("content"))
        .and_then(Value::as_object)
        .and_then(json_media)
        .and_then(|media| media.get("schema"))
        .cloned();
    if let Some(schema) = schema {
        let reduced = schema.get("properties").cloned().unwrap_or(schema);
        map.insert("responses".to_string(), reduced);
    }

    if !with_response {
        map.remove("responses");
    }
    doc
}

/// Renders endpoint documentation as a token-bounded YAML block.
#[derive(Debug, Clone)]
pub struct DocTrimmer {
    tokenizer: Tokenizer,
    budget: usize,
}

impl DocTrimmer {
    pub fn new(tokenizer: Tokenizer, budget: usize) -> Self {
        Self { tokenizer, budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Reduced, serialized and truncated documentation.
    pub fn trim(&self, doc: &Value, with_response: bool) -> Result<String> {
        let reduced = reduce_documentation(doc, with_response);
        let rendered = serde_yaml::to_string(&reduced)?;
        let tokens = self.tokenizer.count(&rendered);
        if tokens <= self.budget {
            return Ok(rendered);
        }

        debug!(tokens, budget = self.budget, "Truncating endpoint documentation");
        self.tokenizer.truncate(&rendered, self.budget)
    }

    /// Documentation block under its per-endpoint heading.
    pub fn render_section(&self, name: &str, doc: &Value, with_response: bool) -> Result<String> {
        Ok(format!("== Docs for {} == \n{}\n", name, self.trim(doc, with_response)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_doc() -> Value {
        json!({
            "description": "Search for people",
            "parameters": [{"name": "query", "in": "query", "required": true}],
            "responses": {
                "description": "OK",
                "content": {
                    "application/json; charset=utf-8": {
                        "schema": {
                            "type": "object",
                            "properties": {
                                "page": {"type": "integer"},
                                "results": {"type": "array"}
                            }
                        }
                    }
                }
            }
        })
    }

    fn trimmer(budget: usize) -> DocTrimmer {
        DocTrimmer::new(Tokenizer::for_model("text-davinci-003").unwrap(), budget)
    }

    #[test]
    fn test_response_reduced_to_properties() {
        let reduced = reduce_documentation(&search_doc(), true);
        assert_eq!(
            reduced["responses"],
            json!({"page": {"type": "integer"}, "results": {"type": "array"}})
        );
    }

    #[test]
    fn test_array_schema_passes_through() {
        let doc = json!({
            "responses": {"content": {"application/json": {"schema": {"type": "array", "items": {"type": "string"}}}}}
        });
        let reduced = reduce_documentation(&doc, true);
        assert_eq!(reduced["responses"]["type"], "array");
    }

    #[test]
    fn test_response_removed_when_hidden() {
        let reduced = reduce_documentation(&search_doc(), false);
        assert!(reduced.get("responses").is_none());
        assert_eq!(reduced["description"], "Search for people");
    }

    #[test]
    fn test_reduction_is_idempotent() {
        for with_response in [true, false] {
            let once = reduce_documentation(&search_doc(), with_response);
            let twice = reduce_documentation(&once, with_response);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_catalog_copy_untouched() {
        let original = search_doc();
        let _ = reduce_documentation(&original, false);
        assert!(original["responses"].get("content").is_some());
    }

    #[test]
    fn test_render_section_heading() {
        let section = trimmer(DEFAULT_DOC_TOKEN_BUDGET)
            .render_section("GET /search/person", &search_doc(), false)
            .unwrap();
        assert!(section.starts_with("== Docs for GET /search/person == \n"));
        assert!(section.contains("name: query"));
        assert!(!section.contains("results"));
    }

    #[test]
    fn test_long_documentation_is_truncated() {
        let params: Vec<Value> = (0..400)
            .map(|i| json!({"name": format!("filter_{}", i), "in": "query", "required": false}))
            .collect();
        let doc = json!({"description": "Discover movies", "parameters": params});

        let trimmer = trimmer(50);
        let full = serde_yaml::to_string(&reduce_documentation(&doc, false)).unwrap();
        let trimmed = trimmer.trim(&doc, false).unwrap();

        assert!(trimmed.len() < full.len());
        assert!(full.starts_with(&trimmed));
    }
}

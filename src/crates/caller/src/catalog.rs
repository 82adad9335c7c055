//! Endpoint catalog
//!
//! The catalog is built once from an API description and then only read.
//! It is shared between invocations through `Arc<ApiCatalog>`; the engine
//! never mutates an entry, it derives per-invocation copies instead.

use crate::error::{CallerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP verbs the engine can execute.
pub const SUPPORTED_VERBS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Documentation for a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDoc {
    /// "VERB path", e.g. "GET /search/person".
    pub name: String,
    pub description: String,
    /// Schema-shaped mapping: parameters, requestBody, responses.
    pub documentation: Value,
}

impl EndpointDoc {
    pub fn new(name: impl Into<String>, description: impl Into<String>, documentation: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            documentation,
        }
    }

    /// Verb part of the name.
    pub fn verb(&self) -> &str {
        self.name.split_once(' ').map(|(verb, _)| verb).unwrap_or(&self.name)
    }

    /// Path (or absolute URL) part of the name.
    pub fn path(&self) -> &str {
        self.name.split_once(' ').map(|(_, path)| path).unwrap_or("")
    }
}

/// An immutable, ordered collection of documented endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiCatalog {
    /// Server base URLs; the engine always uses the first one.
    pub servers: Vec<String>,
    pub description: String,
    pub endpoints: Vec<EndpointDoc>,
}

impl ApiCatalog {
    pub fn new(servers: Vec<String>, description: impl Into<String>, endpoints: Vec<EndpointDoc>) -> Self {
        Self {
            servers,
            description: description.into(),
            endpoints,
        }
    }

    /// First server URL, without a trailing slash.
    pub fn base_url(&self) -> Result<&str> {
        self.servers
            .first()
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| CallerError::Catalog("API description declares no servers".to_string()))
    }

    /// Look up an endpoint by its exact name.
    pub fn get(&self, name: &str) -> Option<&EndpointDoc> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Full URL for an endpoint name. Names that already carry an absolute
    /// URL are returned unchanged.
    pub fn api_path(&self, name: &str) -> Result<String> {
        let path = name.split_once(' ').map(|(_, p)| p).unwrap_or(name);
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        Ok(format!("{}{}", self.base_url()?, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> ApiCatalog {
        ApiCatalog::new(
            vec!["https://api.themoviedb.org/3/".to_string()],
            "TMDB",
            vec![
                EndpointDoc::new("GET /search/person", "Search people", json!({})),
                EndpointDoc::new("GET /person/{person_id}/movie_credits", "Credits", json!({})),
            ],
        )
    }

    #[test]
    fn test_lookup_and_names() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("GET /search/person").unwrap().description, "Search people");
        assert!(catalog.get("GET /search/movie").is_none());
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec!["GET /search/person", "GET /person/{person_id}/movie_credits"]
        );
    }

    #[test]
    fn test_endpoint_parts() {
        let doc = EndpointDoc::new("POST https://gitlab.example.com/api/v4/projects", "", json!({}));
        assert_eq!(doc.verb(), "POST");
        assert_eq!(doc.path(), "https://gitlab.example.com/api/v4/projects");
    }

    #[test]
    fn test_base_url_and_api_path() {
        let catalog = catalog();
        assert_eq!(catalog.base_url().unwrap(), "https://api.themoviedb.org/3");
        assert_eq!(
            catalog.api_path("GET /search/person").unwrap(),
            "https://api.themoviedb.org/3/search/person"
        );
        assert_eq!(
            catalog.api_path("GET https://other.example.com/x").unwrap(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_missing_servers() {
        let catalog = ApiCatalog::default();
        assert!(matches!(catalog.base_url(), Err(CallerError::Catalog(_))));
        assert!(catalog.is_empty());
    }
}

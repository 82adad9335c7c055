//! Endpoint resolution
//!
//! Binds free text ("GET /search/person to find ...") or a synthesized
//! "VERB url" pair to exactly one catalog endpoint.

use crate::catalog::ApiCatalog;
use crate::error::{CallerError, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Maps text to the name of exactly one documented endpoint.
pub trait EndpointResolver: Send + Sync {
    /// Returns the endpoint name, or `AmbiguousOrUnknownEndpoint` unless
    /// exactly one candidate matches.
    fn resolve(&self, text: &str) -> Result<String>;
}

static VERB_TARGET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(GET|POST|PUT|PATCH|DELETE)\s+(\S+)").expect("valid verb regex"));

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}/]+\}").expect("valid placeholder regex"));

struct Template {
    name: String,
    verb: String,
    path: String,
    pattern: Regex,
}

/// Resolver that matches `VERB target` mentions against path templates,
/// where each `{param}` stands for exactly one path segment.
pub struct PathTemplateResolver {
    catalog: Arc<ApiCatalog>,
    templates: Vec<Template>,
}

impl PathTemplateResolver {
    pub fn new(catalog: Arc<ApiCatalog>) -> Result<Self> {
        let templates = catalog
            .endpoints
            .iter()
            .map(|endpoint| {
                Ok(Template {
                    name: endpoint.name.clone(),
                    verb: endpoint.verb().to_string(),
                    path: endpoint.path().to_string(),
                    pattern: compile_template(endpoint.path())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { catalog, templates })
    }

    pub fn catalog(&self) -> &Arc<ApiCatalog> {
        &self.catalog
    }

    /// Spellings of a target worth comparing against catalog paths.
    fn candidate_targets(&self, raw: &str) -> Vec<String> {
        let cleaned = raw
            .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
            .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | ')' | '"' | '\'' | '`'));
        let cleaned = cleaned.split('?').next().unwrap_or(cleaned).to_string();

        let mut targets = vec![cleaned.clone()];
        for server in &self.catalog.servers {
            let server = server.trim_end_matches('/');
            if let Some(rest) = cleaned.strip_prefix(server) {
                if rest.starts_with('/') {
                    targets.push(rest.to_string());
                }
            }
        }
        targets
    }

    fn matches_for(&self, verb: &str, raw_target: &str) -> Vec<String> {
        let targets = self.candidate_targets(raw_target);
        let same_verb = self.templates.iter().filter(|t| t.verb == verb);

        let exact: Vec<String> = same_verb
            .clone()
            .filter(|t| targets.iter().any(|target| *target == t.path))
            .map(|t| t.name.clone())
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        same_verb
            .filter(|t| targets.iter().any(|target| t.pattern.is_match(target)))
            .map(|t| t.name.clone())
            .collect()
    }
}

impl EndpointResolver for PathTemplateResolver {
    fn resolve(&self, text: &str) -> Result<String> {
        let mut matches: Vec<String> = Vec::new();

        for caps in VERB_TARGET_REGEX.captures_iter(text) {
            for name in self.matches_for(&caps[1], &caps[2]) {
                if !matches.contains(&name) {
                    matches.push(name);
                }
            }
        }
        debug!(query = %text, ?matches, "Resolved endpoint candidates");

        if matches.len() == 1 {
            Ok(matches.remove(0))
        } else {
            Err(CallerError::AmbiguousOrUnknownEndpoint {
                query: text.to_string(),
                matches,
            })
        }
    }
}

fn compile_template(path: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    let mut last = 0;
    for placeholder in PLACEHOLDER_REGEX.find_iter(path) {
        pattern.push_str(&regex::escape(&path[last..placeholder.start()]));
        pattern.push_str("[^/]+");
        last = placeholder.end();
    }
    pattern.push_str(&regex::escape(&path[last..]));
    pattern.push('$');

    Regex::new(&pattern).map_err(|e| CallerError::Catalog(format!("bad path template {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EndpointDoc;
    use serde_json::json;

    fn resolver() -> PathTemplateResolver {
        let names = [
            "GET /search/person",
            "GET /person/{person_id}",
            "GET /person/{person_id}/movie_credits",
            "GET /movie/{movie_id}",
            "GET /movie/latest",
            "POST /list/{list_id}/add_item",
        ];
        let catalog = ApiCatalog::new(
            vec!["https://api.themoviedb.org/3".to_string()],
            "TMDB",
            names.iter().map(|n| EndpointDoc::new(*n, "", json!({}))).collect(),
        );
        PathTemplateResolver::new(Arc::new(catalog)).unwrap()
    }

    #[test]
    fn test_resolves_plan_text() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("GET /search/person to search for the director \"Lee Chang-dong\"").unwrap(),
            "GET /search/person"
        );
    }

    #[test]
    fn test_resolves_templates_and_full_urls() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("GET https://api.themoviedb.org/3/person/5309/movie_credits?page=1").unwrap(),
            "GET /person/{person_id}/movie_credits"
        );
        assert_eq!(
            resolver.resolve("POST `/list/8241/add_item`.").unwrap(),
            "POST /list/{list_id}/add_item"
        );
    }

    #[test]
    fn test_exact_path_beats_template() {
        assert_eq!(resolver().resolve("GET /movie/latest").unwrap(), "GET /movie/latest");
    }

    #[test]
    fn test_verb_must_match() {
        let err = resolver().resolve("DELETE /search/person").unwrap_err();
        assert!(matches!(err, CallerError::AmbiguousOrUnknownEndpoint { ref matches, .. } if matches.is_empty()));
    }

    #[test]
    fn test_no_verb_is_unknown() {
        assert!(matches!(
            resolver().resolve("find the director of Oasis"),
            Err(CallerError::AmbiguousOrUnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_two_mentions_are_ambiguous() {
        let err = resolver()
            .resolve("GET /movie/550 then GET /person/5309")
            .unwrap_err();
        match err {
            CallerError::AmbiguousOrUnknownEndpoint { matches, .. } => {
                assert_eq!(matches, vec!["GET /movie/{movie_id}", "GET /person/{person_id}"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_repeated_mentions_are_deduplicated() {
        assert_eq!(
            resolver().resolve("GET /movie/550, and again GET /movie/551").unwrap(),
            "GET /movie/{movie_id}"
        );
    }
}

//! Capture Filter
//!
//! Pure predicates deciding which exchanges are worth caching, and the
//! canonical key derivation.

use std::collections::HashSet;

use url::Url;

use crate::error::{CacheError, Result};

// == Filter Config ==
/// Immutable capture rules, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Path substrings making a URL eligible
    pub include_patterns: Vec<String>,
    /// Path substrings excluding a URL; checked before includes
    pub exclude_patterns: Vec<String>,
    /// Eligible methods, compared case-insensitively
    pub allowed_methods: Vec<String>,
    /// Content-type substrings eligible for capture
    pub allowed_content_types: Vec<String>,
    /// Origin relative URLs are resolved against
    pub base_origin: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_patterns: vec!["/api/".to_string()],
            exclude_patterns: ["/auth/", "/login/", "/logout/", "/health"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_content_types: vec!["application/json".to_string()],
            base_origin: "http://localhost".to_string(),
        }
    }
}

// == Capture Filter ==
#[derive(Debug, Clone)]
pub struct CaptureFilter {
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    /// Upper-cased
    allowed_methods: HashSet<String>,
    allowed_content_types: Vec<String>,
    base: Url,
}

impl CaptureFilter {
    /// Builds a filter, failing only if the base origin is not an absolute URL.
    pub fn new(config: FilterConfig) -> Result<Self> {
        let base = Url::parse(&config.base_origin).map_err(|e| {
            CacheError::Config(format!("base_origin '{}': {}", config.base_origin, e))
        })?;

        Ok(Self {
            include_patterns: config.include_patterns,
            exclude_patterns: config.exclude_patterns,
            allowed_methods: config
                .allowed_methods
                .iter()
                .map(|m| m.to_ascii_uppercase())
                .collect(),
            allowed_content_types: config.allowed_content_types,
            base,
        })
    }

    /// Request-time check on URL and method.
    ///
    /// Exclude patterns win over include patterns. URLs that cannot be
    /// parsed are never captured.
    pub fn should_capture(&self, url: &str, method: &str) -> bool {
        let Ok(parsed) = self.base.join(url) else {
            return false;
        };
        let path = parsed.path();

        if self.exclude_patterns.iter().any(|p| path.contains(p.as_str())) {
            return false;
        }
        self.include_patterns.iter().any(|p| path.contains(p.as_str()))
            && self.should_capture_method(method)
    }

    /// Case-insensitive method check.
    pub fn should_capture_method(&self, method: &str) -> bool {
        self.allowed_methods.contains(&method.to_ascii_uppercase())
    }

    /// Response-time check on the content type. Absent or empty never matches.
    pub fn should_capture_content_type(&self, content_type: Option<&str>) -> bool {
        match content_type {
            Some(ct) if !ct.is_empty() => self
                .allowed_content_types
                .iter()
                .any(|allowed| ct.contains(allowed.as_str())),
            _ => false,
        }
    }

    /// Canonical cache key: path plus `?query` (omitted when empty).
    ///
    /// Scheme, host and fragment are dropped. Input that does not parse is
    /// returned unchanged.
    pub fn build_key(&self, url: &str) -> String {
        match self.base.join(url) {
            Ok(parsed) => match parsed.query() {
                Some(query) if !query.is_empty() => format!("{}?{}", parsed.path(), query),
                _ => parsed.path().to_string(),
            },
            Err(_) => url.to_string(),
        }
    }
}

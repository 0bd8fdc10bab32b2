//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::CachePolicy;
use crate::capture::FilterConfig;
use crate::error::{CacheError, Result};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Record time-to-live in milliseconds
    pub ttl_millis: u64,
    /// Maximum number of records the cache can hold
    pub max_entries: usize,
    /// Maximum canonical payload size of a single record
    pub max_item_size_bytes: usize,
    /// Minimum interval between two accepted writes to the same key
    pub dedup_window_millis: u64,
    /// Path substrings that make a URL eligible for capture
    pub include_patterns: Vec<String>,
    /// Path substrings that exclude a URL from capture (checked first)
    pub exclude_patterns: Vec<String>,
    /// HTTP methods eligible for capture
    pub allowed_methods: Vec<String>,
    /// Content-type substrings eligible for capture
    pub allowed_content_types: Vec<String>,
    /// Payloads at or above this size are served by reference
    pub large_data_threshold_bytes: usize,
    /// Origin relative URLs are resolved against when building keys
    pub base_origin: String,
    /// Scope active when the host starts
    pub initial_scope: String,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TTL_MILLIS` - Record TTL (default: 300000)
    /// - `MAX_ENTRIES` - Maximum records (default: 100)
    /// - `MAX_ITEM_SIZE_BYTES` - Per-record size cap (default: 100 MiB)
    /// - `DEDUP_WINDOW_MILLIS` - Dedup window (default: 1000)
    /// - `INCLUDE_PATTERNS` - Comma separated (default: `/api/`)
    /// - `EXCLUDE_PATTERNS` - Comma separated (default: `/auth/,/login/,/logout/,/health`)
    /// - `ALLOWED_METHODS` - Comma separated (default: `GET,POST`)
    /// - `ALLOWED_CONTENT_TYPES` - Comma separated (default: `application/json`)
    /// - `LARGE_DATA_THRESHOLD_BYTES` - By-reference threshold (default: 102400)
    /// - `BASE_ORIGIN` - Key resolution origin (default: `http://localhost`)
    /// - `INITIAL_SCOPE` - Starting scope (default: `/`)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_millis: parse_var("TTL_MILLIS").unwrap_or(defaults.ttl_millis),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_item_size_bytes: parse_var("MAX_ITEM_SIZE_BYTES")
                .unwrap_or(defaults.max_item_size_bytes),
            dedup_window_millis: parse_var("DEDUP_WINDOW_MILLIS")
                .unwrap_or(defaults.dedup_window_millis),
            include_patterns: list_var("INCLUDE_PATTERNS").unwrap_or(defaults.include_patterns),
            exclude_patterns: list_var("EXCLUDE_PATTERNS").unwrap_or(defaults.exclude_patterns),
            allowed_methods: list_var("ALLOWED_METHODS").unwrap_or(defaults.allowed_methods),
            allowed_content_types: list_var("ALLOWED_CONTENT_TYPES")
                .unwrap_or(defaults.allowed_content_types),
            large_data_threshold_bytes: parse_var("LARGE_DATA_THRESHOLD_BYTES")
                .unwrap_or(defaults.large_data_threshold_bytes),
            base_origin: env::var("BASE_ORIGIN").unwrap_or(defaults.base_origin),
            initial_scope: env::var("INITIAL_SCOPE").unwrap_or(defaults.initial_scope),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Validates configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the TTL, capacity, item cap or cleanup
    /// interval is zero, no method is allowed, or the base origin is not an
    /// absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_millis == 0 {
            return Err(CacheError::Config("ttl_millis must be greater than 0".into()));
        }
        if self.max_entries == 0 {
            return Err(CacheError::Config("max_entries must be greater than 0".into()));
        }
        if self.max_item_size_bytes == 0 {
            return Err(CacheError::Config(
                "max_item_size_bytes must be greater than 0".into(),
            ));
        }
        if self.cleanup_interval == 0 {
            return Err(CacheError::Config(
                "cleanup_interval must be greater than 0".into(),
            ));
        }
        if self.allowed_methods.is_empty() {
            return Err(CacheError::Config("allowed_methods must not be empty".into()));
        }
        url::Url::parse(&self.base_origin).map_err(|e| {
            CacheError::Config(format!("base_origin '{}': {}", self.base_origin, e))
        })?;

        if self.include_patterns.is_empty() {
            tracing::warn!("include_patterns is empty; nothing will be captured");
        }

        Ok(())
    }

    /// Storage policy portion of the configuration.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            ttl_ms: self.ttl_millis,
            max_entries: self.max_entries,
            max_item_size_bytes: self.max_item_size_bytes,
            dedup_window_ms: self.dedup_window_millis,
        }
    }

    /// Capture filter portion of the configuration.
    pub fn filter(&self) -> FilterConfig {
        FilterConfig {
            include_patterns: self.include_patterns.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            allowed_methods: self.allowed_methods.clone(),
            allowed_content_types: self.allowed_content_types.clone(),
            base_origin: self.base_origin.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_millis: 5 * 60 * 1000,
            max_entries: 100,
            max_item_size_bytes: 100 * 1024 * 1024,
            dedup_window_millis: 1000,
            include_patterns: vec!["/api/".to_string()],
            exclude_patterns: ["/auth/", "/login/", "/logout/", "/health"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_content_types: vec!["application/json".to_string()],
            large_data_threshold_bytes: 100 * 1024,
            base_origin: "http://localhost".to_string(),
            initial_scope: "/".to_string(),
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn list_var(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|v| split_list(&v))
}

/// Splits a comma separated list, dropping blank items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.ttl_millis, 300_000);
        assert_eq!(config.max_entries, 100);
        assert_eq!(config.max_item_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.dedup_window_millis, 1000);
        assert_eq!(config.large_data_threshold_bytes, 102_400);
        assert_eq!(config.server_port, 3000);
        assert!(config.exclude_patterns.contains(&"/health".to_string()));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let config = Config {
            max_entries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = Config {
            base_origin: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" GET, post ,,DELETE "),
            vec!["GET".to_string(), "post".to_string(), "DELETE".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_policy_projection() {
        let config = Config {
            ttl_millis: 5000,
            max_entries: 2,
            dedup_window_millis: 1000,
            ..Default::default()
        };
        let policy = config.policy();
        assert_eq!(policy.ttl_ms, 5000);
        assert_eq!(policy.max_entries, 2);
        assert_eq!(policy.dedup_window_ms, 1000);
    }
}

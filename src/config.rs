//! # Configuration
//!
//! Process-wide dispatch policy: body size limit, content-type allow-list,
//! which methods carry a body, and the default route used on a miss.
//!
//! Configuration is fixed during setup and shared read-only (behind an
//! `Arc`) by every request once serving starts.
//!
//! ## Environment Variables
//!
//! ### `WAYROUTE_MAX_POST`
//!
//! Maximum request body in bytes. Accepts decimal (`524288`) or hexadecimal
//! (`0x80000`). Default: 512 KiB.
//!
//! ### `WAYROUTE_ALLOWED_CONTENT_TYPES`
//!
//! Comma-separated media types appended to the default allow-list
//! (`application/json`).
//!
//! ### `WAYROUTE_DEFAULT_ROUTE`
//!
//! Pattern resolved when a path does not match, e.g. `/404`. Unset means a
//! miss is answered `404 Not found`.
//!
//! ```rust
//! use wayroute::config::AppConfig;
//!
//! let config = AppConfig::default()
//!     .with_max_post(1024)
//!     .allow_content_type("text/plain")
//!     .with_default_route("/404");
//! assert_eq!(config.allowed_content_types, vec!["application/json", "text/plain"]);
//! ```

use serde::Deserialize;
use std::env;
use tracing::warn;

use crate::server::normalize_media_type;

/// Default maximum request body: 512 KiB
pub const DEFAULT_MAX_POST: u64 = 512 * 1024;

/// Global dispatch policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum request body size in bytes
    pub max_post: u64,
    /// Media types accepted as request bodies
    pub allowed_content_types: Vec<String>,
    /// Methods whose requests are run through body verification
    pub body_methods: Vec<String>,
    /// Fallback pattern for every method router
    pub default_route: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_post: DEFAULT_MAX_POST,
            allowed_content_types: vec!["application/json".to_string()],
            body_methods: vec!["PUT".to_string(), "POST".to_string(), "PATCH".to_string()],
            default_route: None,
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with the `WAYROUTE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("WAYROUTE_MAX_POST") {
            match parse_size(&val) {
                Some(max_post) => config.max_post = max_post,
                None => warn!(value = %val, "Ignoring invalid WAYROUTE_MAX_POST"),
            }
        }
        if let Ok(val) = env::var("WAYROUTE_ALLOWED_CONTENT_TYPES") {
            for content_type in val.split(',') {
                config.push_content_type(content_type);
            }
        }
        if let Ok(val) = env::var("WAYROUTE_DEFAULT_ROUTE") {
            let val = val.trim();
            if !val.is_empty() {
                config.default_route = Some(val.to_string());
            }
        }
        config
    }

    /// Set the maximum body size
    #[must_use]
    pub fn with_max_post(mut self, max_post: u64) -> Self {
        self.max_post = max_post;
        self
    }

    /// Append a media type to the allow-list
    #[must_use]
    pub fn allow_content_type(mut self, content_type: &str) -> Self {
        self.push_content_type(content_type);
        self
    }

    /// Set the fallback pattern
    #[must_use]
    pub fn with_default_route(mut self, pattern: &str) -> Self {
        self.default_route = Some(pattern.to_string());
        self
    }

    /// Whether requests with `method` go through body verification
    #[must_use]
    pub fn carries_body(&self, method: &http::Method) -> bool {
        self.body_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }

    pub(crate) fn push_content_type(&mut self, content_type: &str) {
        let content_type = normalize_media_type(content_type);
        if !content_type.is_empty() && !self.allowed_content_types.contains(&content_type) {
            self.allowed_content_types.push(content_type);
        }
    }
}

/// Per-route overrides, merged into the request context before body
/// verification runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    /// Replaces the global maximum body size for this route
    pub max_post: Option<u64>,
    /// Extends the global allow-list for this route
    pub allowed_content_types: Vec<String>,
}

impl RouteOptions {
    #[must_use]
    pub fn with_max_post(mut self, max_post: u64) -> Self {
        self.max_post = Some(max_post);
        self
    }

    #[must_use]
    pub fn allow_content_type(mut self, content_type: &str) -> Self {
        self.allowed_content_types
            .push(normalize_media_type(content_type));
        self
    }

    /// Effective maximum: the route override, else the global value
    #[must_use]
    pub fn effective_max_post(&self, config: &AppConfig) -> u64 {
        self.max_post.unwrap_or(config.max_post)
    }

    /// Effective allow-list: global types followed by route extras
    #[must_use]
    pub fn effective_content_types(&self, config: &AppConfig) -> Vec<String> {
        let mut allowed = config.allowed_content_types.clone();
        for extra in &self.allowed_content_types {
            if !allowed.contains(extra) {
                allowed.push(extra.clone());
            }
        }
        allowed
    }
}

fn parse_size(val: &str) -> Option<u64> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.max_post, 512 * 1024);
        assert_eq!(config.allowed_content_types, vec!["application/json"]);
        assert!(config.carries_body(&http::Method::POST));
        assert!(config.carries_body(&http::Method::PATCH));
        assert!(!config.carries_body(&http::Method::GET));
        assert!(config.default_route.is_none());
    }

    #[test]
    fn test_parse_size_decimal_and_hex() {
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("0x400"), Some(1024));
        assert_eq!(parse_size(" 10 "), Some(10));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_allow_content_type_is_append_only_and_normalized() {
        let config = AppConfig::default()
            .allow_content_type("Text/Plain; charset=utf-8")
            .allow_content_type("application/json");
        assert_eq!(
            config.allowed_content_types,
            vec!["application/json", "text/plain"]
        );
    }

    #[test]
    fn test_route_options_override_and_extend() {
        let config = AppConfig::default();
        let options = RouteOptions::default()
            .with_max_post(10)
            .allow_content_type("application/x-www-form-urlencoded");
        assert_eq!(options.effective_max_post(&config), 10);
        assert_eq!(
            options.effective_content_types(&config),
            vec!["application/json", "application/x-www-form-urlencoded"]
        );
        assert_eq!(
            RouteOptions::default().effective_max_post(&config),
            DEFAULT_MAX_POST
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AppConfig =
            serde_json::from_str(r#"{"max_post": 10, "default_route": "/404"}"#).unwrap();
        assert_eq!(config.max_post, 10);
        assert_eq!(config.default_route.as_deref(), Some("/404"));
        assert_eq!(config.allowed_content_types, vec!["application/json"]);
    }
}

//! # Parser Registry
//!
//! Codecs keyed by media type. Request bodies are decoded through the parser
//! registered for their `content-type` during body verification; values
//! passed to [`crate::context::Context::send`] are encoded through the parser
//! registered for the response's declared content type.
//!
//! `application/json` is always registered and is the fallback for responses
//! that declare no content type. The registry only grows: parsers can be
//! added or replaced, never removed.
//!
//! Reads happen on every request while registration happens during setup,
//! so the map lives behind an [`ArcSwap`]: lookups are a lock-free load and
//! registration swaps in a new map.

use anyhow::{bail, Context as _, Result};
use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::server::normalize_media_type;

/// Media type of the built-in codec
pub const JSON: &str = "application/json";
/// Media type handled by [`FormParser`]
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A body codec for one media type.
///
/// `route` is the pattern of the matched route, for codecs that pick a
/// schema per route.
pub trait Parser: Send + Sync {
    /// Bytes received from the client into a value
    fn decode(&self, raw: &[u8], route: &str) -> Result<Value>;
    /// Value produced by a handler into bytes for the client
    fn encode(&self, value: &Value, route: &str) -> Result<Vec<u8>>;
}

/// The built-in `application/json` codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn decode(&self, raw: &[u8], _route: &str) -> Result<Value> {
        serde_json::from_slice(raw).context("invalid JSON payload")
    }

    fn encode(&self, value: &Value, _route: &str) -> Result<Vec<u8>> {
        serde_json::to_vec(value).context("failed to encode JSON")
    }
}

/// `application/x-www-form-urlencoded` codec.
///
/// Decodes to a flat object of string values (later duplicates win). Not
/// registered by default; add it with [`crate::App::add_parser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FormParser;

impl Parser for FormParser {
    fn decode(&self, raw: &[u8], _route: &str) -> Result<Value> {
        let fields: Map<String, Value> = url::form_urlencoded::parse(raw)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        Ok(Value::Object(fields))
    }

    fn encode(&self, value: &Value, _route: &str) -> Result<Vec<u8>> {
        let Value::Object(fields) = value else {
            bail!("form payloads must be objects");
        };
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in fields {
            match value {
                Value::String(s) => out.append_pair(key, s),
                Value::Null => out.append_key_only(key),
                other => out.append_pair(key, &other.to_string()),
            };
        }
        Ok(out.finish().into_bytes())
    }
}

type ParserMap = HashMap<String, Arc<dyn Parser>>;

/// Process-wide media type to codec mapping
pub struct ParserRegistry {
    parsers: ArcSwap<ParserMap>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parsers = self.parsers.load();
        let mut types: Vec<&String> = parsers.keys().collect();
        types.sort();
        f.debug_struct("ParserRegistry")
            .field("types", &types)
            .finish()
    }
}

impl ParserRegistry {
    /// Registry holding only the JSON codec
    #[must_use]
    pub fn new() -> Self {
        let mut parsers: ParserMap = HashMap::new();
        parsers.insert(JSON.to_string(), Arc::new(JsonParser));
        Self {
            parsers: ArcSwap::from_pointee(parsers),
        }
    }

    /// Register (or replace) the codec for `mime`
    pub fn register(&self, mime: &str, parser: Arc<dyn Parser>) {
        let mime = normalize_media_type(mime);
        info!(content_type = %mime, "Parser registered");
        self.parsers.rcu(|current| {
            let mut next = ParserMap::clone(current);
            next.insert(mime.clone(), Arc::clone(&parser));
            next
        });
    }

    /// Codec for `mime`, ignoring media type parameters
    #[must_use]
    pub fn get(&self, mime: &str) -> Option<Arc<dyn Parser>> {
        self.parsers
            .load()
            .get(&normalize_media_type(mime))
            .map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, mime: &str) -> bool {
        self.parsers
            .load()
            .contains_key(&normalize_media_type(mime))
    }

    /// Decode a request body.
    ///
    /// With no codec registered for `mime` the body is passed through as a
    /// (lossy) UTF-8 string.
    ///
    /// # Errors
    ///
    /// Whatever the codec reports for a malformed payload.
    pub fn decode(&self, mime: &str, raw: &[u8], route: &str) -> Result<Value> {
        match self.get(mime) {
            Some(parser) => parser.decode(raw, route),
            None => {
                debug!(content_type = %mime, "No parser registered, passing body through");
                Ok(Value::String(String::from_utf8_lossy(raw).into_owned()))
            }
        }
    }

    /// Encode a response value for `mime`, falling back to JSON when the
    /// type is unset or has no codec.
    ///
    /// # Errors
    ///
    /// Whatever the codec reports for a value it cannot represent.
    pub fn encode(&self, mime: Option<&str>, value: &Value, route: &str) -> Result<Vec<u8>> {
        match mime.and_then(|m| self.get(m)) {
            Some(parser) => parser.encode(value, route),
            None => JsonParser.encode(value, route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl Parser for Upper {
        fn decode(&self, raw: &[u8], _route: &str) -> Result<Value> {
            Ok(Value::String(String::from_utf8_lossy(raw).to_uppercase()))
        }

        fn encode(&self, value: &Value, route: &str) -> Result<Vec<u8>> {
            Ok(format!("{route}:{}", value.as_str().unwrap_or_default()).into_bytes())
        }
    }

    #[test]
    fn test_json_always_registered() {
        let registry = ParserRegistry::new();
        assert!(registry.contains("application/json"));
        assert!(registry.contains("application/json; charset=utf-8"));
        assert_eq!(
            registry.decode(JSON, br#"{"a":1}"#, "/").unwrap(),
            json!({"a": 1})
        );
    }

    #[test]
    fn test_json_decode_rejects_garbage() {
        let registry = ParserRegistry::new();
        assert!(registry.decode(JSON, b"{nope", "/").is_err());
    }

    #[test]
    fn test_unregistered_type_passes_through_as_string() {
        let registry = ParserRegistry::new();
        assert_eq!(
            registry.decode("text/plain", b"hello", "/").unwrap(),
            json!("hello")
        );
    }

    #[test]
    fn test_register_custom_parser() {
        let registry = ParserRegistry::new();
        registry.register("Text/Shout", Arc::new(Upper));
        assert_eq!(
            registry.decode("text/shout", b"hey", "/").unwrap(),
            json!("HEY")
        );
        assert_eq!(
            registry
                .encode(Some("text/shout"), &json!("x"), "/r")
                .unwrap(),
            b"/r:x"
        );
        assert!(registry.contains(JSON));
    }

    #[test]
    fn test_encode_falls_back_to_json() {
        let registry = ParserRegistry::new();
        assert_eq!(
            registry.encode(None, &json!({"a": 1}), "/").unwrap(),
            br#"{"a":1}"#
        );
        assert_eq!(
            registry
                .encode(Some("application/unknown"), &json!([1]), "/")
                .unwrap(),
            b"[1]"
        );
    }

    #[test]
    fn test_form_parser() {
        let form = FormParser;
        assert_eq!(
            form.decode(b"name=tobi&city=a%20b", "/").unwrap(),
            json!({"name": "tobi", "city": "a b"})
        );
        assert_eq!(form.encode(&json!({"a": "b c"}), "/").unwrap(), b"a=b+c");
        assert!(form.encode(&json!([1]), "/").is_err());
    }
}

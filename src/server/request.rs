use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderMap;
use std::collections::HashMap;
use std::fmt;
use std::io;
use tracing::debug;

/// Incoming request as seen by handlers.
///
/// Method, URI and headers come from `http`; the body is a byte stream that
/// is read incrementally by the body-verification step.
pub type Request = http::Request<Body>;

/// Byte-stream body source.
///
/// Yields chunks until exhausted. Reading is pull-based so a consumer can
/// stop as soon as a size limit is crossed.
pub struct Body {
    stream: Option<BoxStream<'static, io::Result<Bytes>>>,
}

impl Body {
    /// A body with no bytes
    #[must_use]
    pub fn empty() -> Self {
        Self { stream: None }
    }

    /// A body delivered as a single chunk
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self::from_stream(stream::iter([Ok(bytes)]))
    }

    /// A body backed by an arbitrary chunk stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: Some(stream.boxed()),
        }
    }

    /// Next chunk, or `None` once the body is exhausted
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        let next = match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        };
        if next.is_none() {
            self.stream = None;
        }
        next
    }

    /// Read and discard the rest of the body, returning the bytes skipped.
    ///
    /// Stream errors end the drain; the connection is no longer usable for
    /// a body in that case anyway.
    pub async fn drain(&mut self) -> u64 {
        let mut drained = 0u64;
        while let Some(chunk) = self.next_chunk().await {
            match chunk {
                Ok(bytes) => drained += bytes.len() as u64,
                Err(e) => {
                    debug!(error = %e, drained_bytes = drained, "Body drain interrupted");
                    self.stream = None;
                    break;
                }
            }
        }
        drained
    }

    /// True once the stream has been fully consumed (or was never present)
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.stream.is_none()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from_bytes(s)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from_bytes(s)
    }
}

/// Parse query string parameters from a URL path
///
/// Extracts everything after the `?` character and URL-decodes parameter names and values.
///
/// # Arguments
///
/// * `path` - The full URL path (e.g., `/users?limit=10&offset=20`)
///
/// # Returns
///
/// A map of query parameter names to values (later duplicates win)
#[must_use]
pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    match path.split_once('?') {
        Some((_, query_str)) => url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => HashMap::new(),
    }
}

/// Declared `content-length`, treating a missing or unparsable header as zero
#[must_use]
pub fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Declared media type: `content-type` without parameters, lowercased.
/// Empty when the header is absent.
#[must_use]
pub fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(normalize_media_type)
        .unwrap_or_default()
}

/// Strip parameters (`; charset=utf-8`) and lowercase a media type
#[must_use]
pub fn normalize_media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

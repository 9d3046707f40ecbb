//! Failure kinds surfaced by routing and request dispatch.
//!
//! Routing failures are reported to the caller of [`crate::router::Router`]
//! as [`RoutingError`]. Everything that happens while serving a single
//! request is described by [`RequestError`], which knows the HTTP status it
//! maps to and the message written into the `{"message": ...}` envelope.

use http::StatusCode;
use std::fmt;

/// Neither the requested path nor the configured default route resolved to
/// a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No registered route (and no default route) matched the path
    NoMatch {
        /// The path that was looked up
        path: String,
    },
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::NoMatch { path } => write!(f, "route {path} did not match"),
        }
    }
}

impl std::error::Error for RoutingError {}

/// A failure scoped to one request.
///
/// None of these terminate the process; each one ends the current handler
/// chain and is written to the client as a JSON error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Routing miss at the request layer (404)
    NotFound,
    /// Declared or observed body size exceeds the effective maximum (413)
    PayloadTooLarge {
        /// Effective maximum in bytes
        limit: u64,
        /// Declared content-length, or bytes observed so far when streaming
        size: u64,
        /// `true` when the limit was crossed while reading the body stream
        streaming: bool,
    },
    /// Declared content type is not in the effective allow-list (415)
    UnsupportedContentType {
        /// Media type sent by the client (empty when the header is absent)
        found: String,
        /// Effective allow-list for the route
        allowed: Vec<String>,
    },
    /// The registered parser rejected the payload (400)
    MalformedPayload {
        /// Media type the payload claimed to be
        content_type: String,
    },
    /// Unhandled handler failure (500)
    Internal,
}

impl RequestError {
    /// HTTP status code written for this failure
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::NotFound => StatusCode::NOT_FOUND,
            RequestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::UnsupportedContentType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RequestError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            RequestError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message placed in the `{"message": ...}` body
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            RequestError::NotFound => "Not found".to_string(),
            RequestError::PayloadTooLarge {
                streaming: false, ..
            } => "Payload size exceeds maximum size for requests".to_string(),
            RequestError::PayloadTooLarge {
                streaming: true, ..
            } => "Payload size exceeds maximum body length".to_string(),
            RequestError::UnsupportedContentType { found, allowed } => {
                format!("Expected data to be of {} not {}", allowed.join(", "), found)
            }
            RequestError::MalformedPayload { content_type } => {
                format!("Payload is not valid {content_type}")
            }
            RequestError::Internal => "Internal server error".to_string(),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::PayloadTooLarge { limit, size, .. } => {
                write!(f, "{} ({size} > {limit} bytes)", self.message())
            }
            _ => f.write_str(&self.message()),
        }
    }
}

impl std::error::Error for RequestError {}

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use super::request::normalize_media_type;

/// Everything written to a response so far.
#[derive(Debug, Clone)]
pub struct ResponseState {
    /// Status code (200 until a handler changes it)
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Body, set by the terminal write
    pub body: Bytes,
    /// A terminal write has happened; nothing more may be written
    pub finished: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finished: false,
        }
    }
}

/// Response sink for one request.
///
/// A cheap handle: clones share the same underlying state, which is how the
/// per-request [`crate::context::Context`] stays bound to the response it was
/// built for. The transport reads the final state with
/// [`Response::snapshot`] or [`Response::into_http`] once dispatch returns.
#[derive(Debug, Clone, Default)]
pub struct Response {
    inner: Arc<Mutex<ResponseState>>,
}

impl Response {
    /// Fresh response: 200, no headers, not finished
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.lock().status
    }

    /// Set the status; ignored once the response has finished
    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.inner.lock();
        if state.finished {
            warn!(status = %status, "Status change after response finished ignored");
            return;
        }
        state.status = status;
    }

    /// Header value, if set
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.inner.lock().headers.get(name).cloned()
    }

    /// Set (replace) a header; ignored once the response has finished
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.inner.lock();
        if state.finished {
            warn!(header = %name, "Header change after response finished ignored");
            return;
        }
        state.headers.insert(name, value);
    }

    /// Declared media type of the response, without parameters
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header(&CONTENT_TYPE)
            .and_then(|v| v.to_str().ok().map(normalize_media_type))
            .filter(|v| !v.is_empty())
    }

    /// Terminal write: store the body and mark the response finished.
    ///
    /// Returns `false` (writing nothing) if the response already finished.
    pub fn end(&self, body: impl Into<Bytes>) -> bool {
        let mut state = self.inner.lock();
        if state.finished {
            warn!(status = %state.status, "Response already finished, write dropped");
            return false;
        }
        state.body = body.into();
        state.finished = true;
        true
    }

    /// Whether a terminal write has happened
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ResponseState {
        self.inner.lock().clone()
    }

    /// Convert into an `http::Response` for the transport
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        let state = self.snapshot();
        let mut res = http::Response::new(state.body);
        *res.status_mut() = state.status;
        *res.headers_mut() = state.headers;
        res
    }
}

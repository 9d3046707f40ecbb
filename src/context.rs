//! Per-request context handed to every handler in a chain.
//!
//! A [`Context`] is built fresh for each request from a copy of the
//! application's template state, then filled with the matched route, the
//! captured params, the parsed query string and (after body verification)
//! the decoded body. It is bound to the request's [`Response`], so
//! [`Context::send`] and [`Context::err`] always write to the right sink.

use anyhow::{Context as _, Result};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::config::RouteOptions;
use crate::error::RequestError;
use crate::ids::RequestId;
use crate::parser::{ParserRegistry, JSON};
use crate::router::Params;
use crate::server::{parse_query_params, Request, Response};

/// Mutable per-request state plus the response-producing operations.
#[derive(Debug)]
pub struct Context {
    /// Decoded request body, set by body verification
    pub body: Option<Value>,
    /// Captured path params
    pub params: Params,
    /// Parsed query string
    pub query: HashMap<String, String>,
    state: HashMap<String, Value>,
    route: Arc<str>,
    request_id: RequestId,
    options: RouteOptions,
    response: Response,
    parsers: Arc<ParserRegistry>,
}

impl Context {
    /// Context for `request`, writing to `response`.
    ///
    /// `template` is copied so handlers can never mutate state seen by
    /// another request.
    #[must_use]
    pub fn new(
        request: &Request,
        response: &Response,
        parsers: Arc<ParserRegistry>,
        template: &HashMap<String, Value>,
    ) -> Self {
        let query = request
            .uri()
            .path_and_query()
            .map(|pq| parse_query_params(pq.as_str()))
            .unwrap_or_default();
        Self {
            body: None,
            params: Params::new(),
            query,
            state: template.clone(),
            route: Arc::from(""),
            request_id: RequestId::from_headers(request.headers()),
            options: RouteOptions::default(),
            response: response.clone(),
            parsers,
        }
    }

    /// Attach the resolved route, its params and its per-route options
    pub fn bind(&mut self, route: Arc<str>, params: Params, options: RouteOptions) {
        self.route = route;
        self.params = params;
        self.options = options;
    }

    /// True once a terminal response write has happened
    #[must_use]
    pub fn finished(&self) -> bool {
        self.response.is_finished()
    }

    /// Value copied from the template or set by an earlier handler
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Pattern of the matched route (empty before routing)
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Per-route overrides for body verification
    #[must_use]
    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    #[must_use]
    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Write `content` with `status` and finish the response.
    ///
    /// Strings are written as-is. Anything else is encoded by the parser
    /// for the response's declared content type; with none declared the
    /// response becomes `application/json`. Ignored (with a warning) once
    /// the response has finished.
    ///
    /// # Errors
    ///
    /// `content` could not be converted to a value or the codec rejected it.
    pub fn send<T: Serialize + ?Sized>(&self, status: StatusCode, content: &T) -> Result<()> {
        if self.finished() {
            warn!(
                request_id = %self.request_id,
                route = %self.route,
                status = %status,
                "send after response finished ignored"
            );
            return Ok(());
        }

        let value = serde_json::to_value(content).context("response is not serializable")?;
        let declared = self.response.content_type();
        if declared.is_none() {
            self.response
                .set_header(CONTENT_TYPE, HeaderValue::from_static(JSON));
        }
        let body = match value {
            Value::String(s) => s.into_bytes(),
            value => {
                self.parsers
                    .encode(declared.as_deref(), &value, &self.route)
                    .with_context(|| format!("failed to encode response for {}", self.route))?
            }
        };

        self.response.set_status(status);
        self.response.end(body);
        Ok(())
    }

    /// `send` with 200
    ///
    /// # Errors
    ///
    /// See [`Context::send`].
    pub fn ok<T: Serialize + ?Sized>(&self, content: &T) -> Result<()> {
        self.send(StatusCode::OK, content)
    }

    /// Write a `{"message": ...}` JSON envelope with `status` and finish
    /// the response.
    pub fn err(&self, status: StatusCode, message: &str) {
        if self.finished() {
            warn!(
                request_id = %self.request_id,
                route = %self.route,
                status = %status,
                message = %message,
                "err after response finished ignored"
            );
            return;
        }
        self.response
            .set_header(CONTENT_TYPE, HeaderValue::from_static(JSON));
        self.response.set_status(status);
        self.response.end(json!({ "message": message }).to_string());
    }

    /// `err` with the canonical reason phrase of `status` as the message
    pub fn err_status(&self, status: StatusCode) {
        self.err(status, status.canonical_reason().unwrap_or("Unknown"));
    }

    /// `err` with 500
    pub fn err_message(&self, message: &str) {
        self.err(StatusCode::INTERNAL_SERVER_ERROR, message);
    }

    /// Write the envelope for a request-layer failure
    pub fn fail(&self, error: &RequestError) {
        self.err(error.status(), &error.message());
    }
}

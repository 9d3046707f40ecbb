//! # Application
//!
//! [`App`] ties the pieces together: one [`Router`] per HTTP method, the
//! parser registry, the context template and the [`Dispatcher`]. Routes are
//! registered during setup through `&mut self`; once serving starts the app
//! is shared (typically as `Arc<App>`) and [`App::handle`] only needs
//! `&self`.
//!
//! ## Request Flow
//!
//! 1. A fresh [`Context`] is built (template copy, query, request id)
//! 2. `OPTIONS` with no registered `OPTIONS` routes is answered `204`
//! 3. The method's router resolves the path; a miss is answered `404`
//! 4. The route pattern, params and per-route options are bound to the context
//! 5. The dispatcher runs the route's handler chain
//!
//! ```rust
//! use http::StatusCode;
//! use wayroute::dispatcher::handler;
//! use wayroute::server::Body;
//! use wayroute::App;
//!
//! let mut app = App::new();
//! app.get("/hello/:name", handler(|_req, _res, ctx| {
//!     Box::pin(async move {
//!         let name = ctx.params.get("name").unwrap_or("world").to_string();
//!         ctx.ok(&serde_json::json!({ "hello": name }))
//!     })
//! }));
//!
//! let req = http::Request::get("/hello/tobi").body(Body::empty()).unwrap();
//! let res = futures::executor::block_on(app.handle(req));
//! assert_eq!(res.status(), StatusCode::OK);
//! assert_eq!(res.snapshot().body, r#"{"hello":"tobi"}"#);
//! ```

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

use crate::config::{AppConfig, RouteOptions};
use crate::context::Context;
use crate::dispatcher::{Dispatcher, HandlerChain};
use crate::error::RequestError;
use crate::parser::{Parser, ParserRegistry};
use crate::router::Router;
use crate::server::{Request, Response};

/// What a route pattern resolves to: its handler chain and per-route options
#[derive(Debug)]
pub struct RouteEntry {
    pub chain: HandlerChain,
    pub options: RouteOptions,
}

/// Router + dispatcher for one service
pub struct App {
    config: Arc<AppConfig>,
    routers: HashMap<Method, Router<Arc<RouteEntry>>>,
    parsers: Arc<ParserRegistry>,
    context: HashMap<String, Value>,
    dispatcher: Dispatcher,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("routes", &self.routes())
            .field("parsers", &self.parsers)
            .finish()
    }
}

impl App {
    /// App with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let config = Arc::new(config);
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&config)),
            config,
            routers: HashMap::new(),
            parsers: Arc::new(ParserRegistry::new()),
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    fn router_mut(&mut self, method: Method) -> &mut Router<Arc<RouteEntry>> {
        let default_route = self.config.default_route.as_deref();
        self.routers
            .entry(method)
            .or_insert_with(|| match default_route {
                Some(pattern) => Router::with_default(pattern),
                None => Router::new(),
            })
    }

    /// Register `chain` for `method` and `pattern`
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        chain: impl Into<HandlerChain>,
    ) -> &mut Self {
        self.route_with(method, pattern, chain, RouteOptions::default())
    }

    /// Register `chain` with per-route body policy overrides
    pub fn route_with(
        &mut self,
        method: Method,
        pattern: &str,
        chain: impl Into<HandlerChain>,
        options: RouteOptions,
    ) -> &mut Self {
        let chain = chain.into();
        info!(
            method = %method,
            pattern = %pattern,
            handlers = chain.len(),
            max_post = ?options.max_post,
            "Route registered"
        );
        let entry = Arc::new(RouteEntry { chain, options });
        self.router_mut(method).handle(pattern, entry);
        self
    }

    pub fn get(&mut self, pattern: &str, chain: impl Into<HandlerChain>) -> &mut Self {
        self.route(Method::GET, pattern, chain)
    }

    pub fn put(&mut self, pattern: &str, chain: impl Into<HandlerChain>) -> &mut Self {
        self.route(Method::PUT, pattern, chain)
    }

    pub fn post(&mut self, pattern: &str, chain: impl Into<HandlerChain>) -> &mut Self {
        self.route(Method::POST, pattern, chain)
    }

    pub fn delete(&mut self, pattern: &str, chain: impl Into<HandlerChain>) -> &mut Self {
        self.route(Method::DELETE, pattern, chain)
    }

    pub fn patch(&mut self, pattern: &str, chain: impl Into<HandlerChain>) -> &mut Self {
        self.route(Method::PATCH, pattern, chain)
    }

    /// Mount every route of `other` under `prefix`, method by method.
    ///
    /// Only routes move across; `other`'s configuration, parsers and context
    /// template are dropped in favor of this app's.
    pub fn mount(&mut self, prefix: &str, other: App) -> &mut Self {
        for (method, router) in other.routers {
            info!(
                method = %method,
                prefix = %prefix,
                routes = router.routes().len(),
                "Sub-app mounted"
            );
            self.router_mut(method).mount(prefix, router);
        }
        self
    }

    /// Register (or replace) the body codec for `mime`
    pub fn add_parser(&mut self, mime: &str, parser: impl Parser + 'static) -> &mut Self {
        self.parsers.register(mime, Arc::new(parser));
        self
    }

    /// Append media types to the global allow-list
    pub fn allow_content_types(&mut self, content_types: &[&str]) -> &mut Self {
        let config = Arc::make_mut(&mut self.config);
        for content_type in content_types {
            config.push_content_type(content_type);
        }
        info!(
            allowed_content_types = ?config.allowed_content_types,
            "Content types allowed"
        );
        self.dispatcher.set_config(Arc::clone(&self.config));
        self
    }

    /// Template copied into every request's [`Context`]
    pub fn set_context(&mut self, context: HashMap<String, Value>) -> &mut Self {
        self.context = context;
        self
    }

    /// Observe handler failures before the 500 is written
    pub fn on_error<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&anyhow::Error, &Request, &Response, &Context) + Send + Sync + 'static,
    {
        self.dispatcher.set_error_hook(Arc::new(hook));
        self
    }

    /// Registered `(method, pattern)` pairs, sorted
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes: Vec<(Method, String)> = self
            .routers
            .iter()
            .flat_map(|(method, router)| {
                router
                    .routes()
                    .into_iter()
                    .map(move |pattern| (method.clone(), pattern))
            })
            .collect();
        routes.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        routes
    }

    /// Serve one request.
    ///
    /// Always produces a response; failures are written into it as JSON
    /// error envelopes. If no handler finishes the response it is returned
    /// unfinished with status 200.
    pub async fn handle(&self, mut req: Request) -> Response {
        let res = Response::new();
        let mut ctx = Context::new(&req, &res, Arc::clone(&self.parsers), &self.context);
        let span = info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %req.method(),
            path = %req.uri().path(),
        );
        self.dispatch(&mut req, &res, &mut ctx)
            .instrument(span)
            .await;
        res
    }

    async fn dispatch(&self, req: &mut Request, res: &Response, ctx: &mut Context) {
        let router = self.routers.get(req.method());

        if req.method() == Method::OPTIONS && router.is_none() {
            debug!("Answering OPTIONS without registered routes");
            res.set_status(StatusCode::NO_CONTENT);
            res.end(Bytes::new());
            return;
        }

        let matched = match router.map(|r| r.match_route(req.uri().path())) {
            Some(Ok(matched)) => matched,
            Some(Err(err)) => {
                debug!(error = %err, "Routing miss");
                ctx.fail(&RequestError::NotFound);
                return;
            }
            None => {
                debug!("No routes registered for method");
                ctx.fail(&RequestError::NotFound);
                return;
            }
        };

        let entry = matched.handler;
        ctx.bind(matched.route, matched.params, entry.options.clone());
        let outcome = self.dispatcher.run(req, res, ctx, &entry.chain).await;
        debug!(
            outcome = ?outcome,
            status = %res.status(),
            finished = res.is_finished(),
            "Request complete"
        );
    }
}

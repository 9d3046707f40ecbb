//! # wayroute
//!
//! **wayroute** is a path-matching trie router with a sequential, async
//! handler-chain dispatcher. It sits between an HTTP transport and
//! application handlers: the transport hands over a request, wayroute
//! resolves it to a handler chain, verifies the body and runs the chain.
//!
//! ## Architecture
//!
//! - **[`router`]** - Segment trie with literal, `:param` and `*wildcard`
//!   segments, sub-router mounting and default-route fallback
//! - **[`dispatcher`]** - Ordered, short-circuiting handler execution with
//!   body verification and a single failure path
//! - **[`server`]** - Request/response abstraction the core needs from a
//!   transport
//! - **[`context`]** - Per-request state and the `send`/`err` operations
//! - **[`parser`]** - Body codecs keyed by media type
//! - **[`app`]** - Per-method routers and the request entry point
//! - **[`config`]** - Body limits, allowed content types, default route
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant App
//!     participant Router as Router<br/>(per method)
//!     participant Dispatcher
//!     participant Verifier as BodyVerifier
//!     participant Handler as Handler chain
//!
//!     Transport->>App: handle(request)
//!     App->>Router: match_route("/users/7")
//!     alt No Route Match
//!         Router-->>App: RoutingError
//!         App-->>Transport: 404 {"message":"Not found"}
//!     end
//!     Router-->>App: RouteMatch {handler, route, params}
//!     App->>Dispatcher: run(chain)
//!     opt PUT/POST/PATCH with content-length
//!         Dispatcher->>Verifier: size, type, decode
//!         alt Rejected
//!             Verifier-->>Transport: 413 / 415 / 400
//!         end
//!     end
//!     loop until finished or queue empty
//!         Dispatcher->>Handler: call(req, res, ctx)
//!         alt Error or panic
//!             Dispatcher-->>Transport: error hook, then 500
//!         end
//!     end
//!     App-->>Transport: Response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use http::StatusCode;
//! use wayroute::dispatcher::{handler, sync_handler};
//! use wayroute::server::Body;
//! use wayroute::{App, AppConfig};
//!
//! let mut app = App::with_config(AppConfig::default().with_default_route("/404"));
//! app.get("/404", sync_handler(|_req, _res, ctx| {
//!     ctx.err(StatusCode::NOT_FOUND, "Nothing here");
//!     Ok(())
//! }));
//! app.post("/echo", handler(|_req, _res, ctx| {
//!     Box::pin(async move {
//!         let body = ctx.body.take().unwrap_or_default();
//!         ctx.ok(&body)
//!     })
//! }));
//!
//! let req = http::Request::post("/echo")
//!     .header("content-type", "application/json")
//!     .header("content-length", "7")
//!     .body(Body::from(r#"{"a":1}"#))
//!     .unwrap();
//! let res = futures::executor::block_on(app.handle(req));
//! assert_eq!(res.snapshot().body, r#"{"a":1}"#);
//!
//! let req = http::Request::get("/missing").body(Body::empty()).unwrap();
//! let res = futures::executor::block_on(app.handle(req));
//! assert_eq!(res.status(), StatusCode::NOT_FOUND);
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod parser;
pub mod router;
pub mod server;

pub use app::App;
pub use config::{AppConfig, RouteOptions};
pub use context::Context;
pub use error::{RequestError, RoutingError};
pub use ids::RequestId;
pub use parser::{FormParser, JsonParser, Parser, ParserRegistry};
pub use router::{Params, Route, Router};
pub use server::{Body, Request, Response};

//! # Dispatcher Module
//!
//! Executes the handler chain registered for a matched route against one
//! request.
//!
//! ## Overview
//!
//! Handlers are async steps that take `(request, response, context)`. The
//! dispatcher runs them strictly in order, awaiting each one before the
//! next, and stops early when:
//!
//! - a handler finishes the response (`ctx.finished()`)
//! - a handler returns an error or panics
//!
//! Failures go through a single path: the optional error hook observes the
//! error, then a `500 {"message":"Internal server error"}` is written unless
//! the response was already finished.
//!
//! ## Body Verification
//!
//! For `PUT`, `POST` and `PATCH` (configurable) requests that declare a
//! non-zero `content-length`, [`BodyVerifier`] runs before any registered
//! handler. It answers `413`, `415` or `400` on its own and otherwise leaves
//! the decoded payload in `ctx.body`.
//!
//! ## Example
//!
//! ```rust
//! use wayroute::dispatcher::{handler, sync_handler, HandlerChain};
//!
//! let chain = HandlerChain::from([
//!     sync_handler(|_req, _res, ctx| {
//!         ctx.set("user", serde_json::json!("tobi"));
//!         Ok(())
//!     }),
//!     handler(|_req, _res, ctx| {
//!         Box::pin(async move {
//!             let user = ctx.get("user").cloned().unwrap_or_default();
//!             ctx.ok(&serde_json::json!({ "user": user }))
//!         })
//!     }),
//! ]);
//! assert_eq!(chain.len(), 2);
//! ```

mod body;
mod core;

pub use body::BodyVerifier;
pub use core::{
    handler, sync_handler, BoxedHandler, ChainOutcome, Dispatcher, ErrorHook, Handler,
    HandlerChain, HandlerFuture,
};

use anyhow::{anyhow, Result};
use futures::future::{self, BoxFuture, FutureExt};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::body::BodyVerifier;
use crate::config::AppConfig;
use crate::context::Context;
use crate::error::RequestError;
use crate::server::{content_length, Request, Response};

/// Future returned by a handler, borrowing the request triple for `'a`
pub type HandlerFuture<'a> = BoxFuture<'a, Result<()>>;

/// A step in a handler chain.
///
/// Handlers compose by side effect: they read the request, mutate the
/// context and write the response. Returning `Err` (or panicking) ends the
/// chain and routes the failure to the dispatcher's error path.
///
/// Closures with the right shape implement this trait directly; see
/// [`handler`] and [`sync_handler`] for the usual way to build one.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a Response,
        ctx: &'a mut Context,
    ) -> HandlerFuture<'a>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Request, &'a Response, &'a mut Context) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a Response,
        ctx: &'a mut Context,
    ) -> HandlerFuture<'a> {
        self(req, res, ctx)
    }
}

/// Shared, type-erased handler
pub type BoxedHandler = Arc<dyn Handler>;

/// Box an async handler.
///
/// ```rust
/// use wayroute::dispatcher::handler;
///
/// let hello = handler(|_req, _res, ctx| {
///     Box::pin(async move { ctx.ok(&serde_json::json!({"hello": "world"})) })
/// });
/// ```
pub fn handler<F>(f: F) -> BoxedHandler
where
    F: for<'a> Fn(&'a mut Request, &'a Response, &'a mut Context) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Box a handler that completes without suspending
pub fn sync_handler<F>(f: F) -> BoxedHandler
where
    F: Fn(&mut Request, &Response, &mut Context) -> Result<()> + Send + Sync + 'static,
{
    handler(move |req, res, ctx| Box::pin(future::ready(f(req, res, ctx))))
}

/// Ordered handlers registered for one route
#[derive(Clone, Default)]
pub struct HandlerChain(Vec<BoxedHandler>);

impl HandlerChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler
    #[must_use]
    pub fn then(mut self, handler: BoxedHandler) -> Self {
        self.0.push(handler);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxedHandler> {
        self.0.iter()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.0.len())
            .finish()
    }
}

impl From<BoxedHandler> for HandlerChain {
    fn from(handler: BoxedHandler) -> Self {
        Self(vec![handler])
    }
}

impl From<Vec<BoxedHandler>> for HandlerChain {
    fn from(handlers: Vec<BoxedHandler>) -> Self {
        Self(handlers)
    }
}

impl<const N: usize> From<[BoxedHandler; N]> for HandlerChain {
    fn from(handlers: [BoxedHandler; N]) -> Self {
        Self(handlers.into())
    }
}

/// Observer invoked once when a handler fails, before the 500 is written.
pub type ErrorHook = Arc<dyn Fn(&anyhow::Error, &Request, &Response, &Context) + Send + Sync>;

/// How a chain run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every handler ran without finishing the response
    Completed,
    /// A handler finished the response; later handlers were skipped
    Finished,
    /// A handler failed or panicked; the error path ran
    Failed,
}

/// Sequential, short-circuiting executor for handler chains.
///
/// For each request the dispatcher:
/// 1. Prepends [`BodyVerifier`] when the method carries a body and
///    `content-length` is non-zero
/// 2. Awaits each handler in order, never starting the next one early
/// 3. Stops as soon as the response is finished or the queue is empty
/// 4. On an error or panic, stops, calls the error hook once, then writes a
///    500 unless the response already finished
pub struct Dispatcher {
    config: Arc<AppConfig>,
    verifier: BoxedHandler,
    error_hook: Option<ErrorHook>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(AppConfig::default()))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            verifier: Arc::new(BodyVerifier::new(Arc::clone(&config))),
            config,
            error_hook: None,
        }
    }

    /// Replace the policy used for body verification
    pub fn set_config(&mut self, config: Arc<AppConfig>) {
        self.verifier = Arc::new(BodyVerifier::new(Arc::clone(&config)));
        self.config = config;
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Install the error hook
    pub fn set_error_hook(&mut self, hook: ErrorHook) {
        self.error_hook = Some(hook);
    }

    /// Run `chain` for one request.
    pub async fn run(
        &self,
        req: &mut Request,
        res: &Response,
        ctx: &mut Context,
        chain: &HandlerChain,
    ) -> ChainOutcome {
        let mut queue: VecDeque<BoxedHandler> = chain.iter().map(Arc::clone).collect();

        let declared = content_length(req.headers());
        if declared > 0 && self.config.carries_body(req.method()) {
            debug!(
                request_id = %ctx.request_id(),
                method = %req.method(),
                content_length = declared,
                "Body verification queued"
            );
            queue.push_front(Arc::clone(&self.verifier));
        }

        let mut step = 0usize;
        while let Some(handler) = queue.pop_front() {
            debug!(
                request_id = %ctx.request_id(),
                route = %ctx.route(),
                step = step,
                remaining = queue.len(),
                "Handler step start"
            );

            // `call` runs inside the polled future so a panic while building
            // the handler future is caught too.
            let outcome = AssertUnwindSafe(async {
                handler.call(&mut *req, res, &mut *ctx).await
            })
            .catch_unwind()
            .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.handle_error(&err, req, res, ctx);
                    return ChainOutcome::Failed;
                }
                Err(panic) => {
                    let err = anyhow!("handler panicked: {}", panic_message(&*panic));
                    self.handle_error(&err, req, res, ctx);
                    return ChainOutcome::Failed;
                }
            }

            if ctx.finished() {
                if !queue.is_empty() {
                    info!(
                        request_id = %ctx.request_id(),
                        route = %ctx.route(),
                        step = step,
                        skipped = queue.len(),
                        "Response finished, remaining handlers skipped"
                    );
                }
                return ChainOutcome::Finished;
            }
            step += 1;
        }

        ChainOutcome::Completed
    }

    fn handle_error(&self, err: &anyhow::Error, req: &Request, res: &Response, ctx: &Context) {
        error!(
            request_id = %ctx.request_id(),
            method = %req.method(),
            route = %ctx.route(),
            error = %format!("{err:#}"),
            "Handler failed"
        );

        if let Some(hook) = &self.error_hook {
            let observed =
                std::panic::catch_unwind(AssertUnwindSafe(|| hook(err, req, res, ctx)));
            if let Err(panic) = observed {
                error!(
                    request_id = %ctx.request_id(),
                    route = %ctx.route(),
                    panic = %panic_message(&*panic),
                    "Error hook panicked"
                );
            }
        }

        if !ctx.finished() {
            ctx.fail(&RequestError::Internal);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "unknown panic payload");
    }

    #[test]
    fn test_chain_from_array() {
        let noop = sync_handler(|_, _, _| Ok(()));
        let chain = HandlerChain::from([Arc::clone(&noop), noop]);
        assert_eq!(chain.len(), 2);
        assert!(!chain.is_empty());
        assert!(HandlerChain::new().is_empty());
    }
}

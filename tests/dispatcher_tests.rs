//! Tests for the handler-chain dispatcher
//!
//! # Test Coverage
//!
//! - Handlers run strictly in order, each awaited before the next
//! - The chain stops once the response is finished
//! - A failing or panicking handler stops the chain and triggers exactly
//!   one error hook call
//! - Body verification runs first for body-bearing methods only, and a
//!   rejection leaves `ctx.body` unset

mod common;

use common::requests::{json, message, request, streamed};
use common::test_tracing::TestTracing;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wayroute::dispatcher::{
    handler, sync_handler, BoxedHandler, ChainOutcome, Dispatcher, HandlerChain,
};
use wayroute::router::Params;
use wayroute::server::{Request, Response};
use wayroute::{AppConfig, Context, ParserRegistry, RouteOptions};

fn context(req: &Request, res: &Response) -> Context {
    Context::new(req, res, Arc::new(ParserRegistry::new()), &HashMap::new())
}

/// Handler that records `name` into `log`
fn record(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedHandler {
    let log = Arc::clone(log);
    sync_handler(move |_req, _res, _ctx| {
        log.lock().push(name);
        Ok(())
    })
}

/// Async handler that yields to the runtime before recording `name`
fn record_later(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedHandler {
    let log = Arc::clone(log);
    handler(move |_req, _res, _ctx| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            log.lock().push(name);
            Ok::<(), anyhow::Error>(())
        })
    })
}

#[tokio::test]
async fn test_handlers_run_in_order_and_are_awaited() {
    let _tracing = TestTracing::init();
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::from([
        record_later(&log, "first"),
        record(&log, "second"),
        record_later(&log, "third"),
    ]);

    let mut req = request(Method::GET, "/");
    let res = Response::new();
    let mut ctx = context(&req, &res);
    let outcome = Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(outcome, ChainOutcome::Completed);
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    assert!(!res.is_finished());
}

#[tokio::test]
async fn test_chain_stops_once_finished() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::new()
        .then(record(&log, "before"))
        .then(sync_handler(|_req, _res, ctx| ctx.ok("done")))
        .then(record(&log, "after"));

    let mut req = request(Method::GET, "/");
    let res = Response::new();
    let mut ctx = context(&req, &res);
    let outcome = Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(outcome, ChainOutcome::Finished);
    assert_eq!(*log.lock(), vec!["before"]);
    assert_eq!(res.snapshot().body, "done");
}

#[tokio::test]
async fn test_failure_stops_chain_and_calls_hook_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hook_calls);

    let mut dispatcher = Dispatcher::default();
    dispatcher.set_error_hook(Arc::new(
        move |err: &anyhow::Error, req: &Request, _res: &Response, ctx: &Context| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(err.to_string(), "nope");
            assert_eq!(req.method(), Method::GET);
            assert!(!ctx.finished());
        },
    ));

    let chain = HandlerChain::from([
        record(&log, "before"),
        handler(|_req, _res, _ctx| Box::pin(async { Err::<(), _>(anyhow::anyhow!("nope")) })),
        record(&log, "after"),
    ]);

    let mut req = request(Method::GET, "/");
    let res = Response::new();
    let mut ctx = context(&req, &res);
    let outcome = dispatcher.run(&mut req, &res, &mut ctx, &chain).await;

    assert_eq!(outcome, ChainOutcome::Failed);
    assert_eq!(*log.lock(), vec!["before"]);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message(&res), "Internal server error");
}

#[tokio::test]
async fn test_failure_after_finish_keeps_written_response() {
    let chain = HandlerChain::from([handler(|_req, _res, ctx| {
        Box::pin(async move {
            ctx.err(StatusCode::CONFLICT, "already exists");
            Err::<(), _>(anyhow::anyhow!("late failure"))
        })
    })]);

    let mut req = request(Method::GET, "/");
    let res = Response::new();
    let mut ctx = context(&req, &res);
    let outcome = Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(outcome, ChainOutcome::Failed);
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(message(&res), "already exists");
}

#[tokio::test]
async fn test_panic_inside_async_handler_is_contained() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::from([
        handler(|_req, _res, ctx| {
            Box::pin(async move {
                if ctx.route().is_empty() {
                    panic!("async kaboom");
                }
                Ok::<(), anyhow::Error>(())
            })
        }),
        record(&log, "after"),
    ]);

    let mut req = request(Method::GET, "/");
    let res = Response::new();
    let mut ctx = context(&req, &res);
    let outcome = Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(outcome, ChainOutcome::Failed);
    assert!(log.lock().is_empty());
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_oversized_body_rejected_before_handlers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let chain = HandlerChain::from(sync_handler(move |_req, _res, _ctx| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let body = r#"{"a":1,"a":1,"a":1,"a":1,"a":1}"#;
    let mut req = json(Method::POST, "/", body);
    let res = Response::new();
    let mut ctx = context(&req, &res);
    ctx.bind(
        Arc::from("/"),
        Params::new(),
        RouteOptions::default().with_max_post(10),
    );
    let outcome = Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(outcome, ChainOutcome::Finished);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(ctx.body.is_none());
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        message(&res),
        "Payload size exceeds maximum size for requests"
    );
}

#[tokio::test]
async fn test_understated_length_caught_while_streaming() {
    let config = Arc::new(AppConfig::default().with_max_post(8));
    let chain = HandlerChain::from(sync_handler(|_req, _res, ctx| ctx.ok("unreachable")));

    let mut req = streamed(
        Method::POST,
        "/",
        "application/json",
        4,
        vec!["[1,2,", "3,4,5", ",6]"],
    );
    let res = Response::new();
    let mut ctx = context(&req, &res);
    let outcome = Dispatcher::new(config)
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(outcome, ChainOutcome::Finished);
    assert!(ctx.body.is_none());
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(message(&res), "Payload size exceeds maximum body length");
}

#[tokio::test]
async fn test_unsupported_type_drains_body() {
    let chain = HandlerChain::from(sync_handler(|_req, _res, ctx| ctx.ok("unreachable")));
    let mut req = streamed(Method::PUT, "/", "text/csv", 6, vec!["a,b", "\n1,2"]);
    let res = Response::new();
    let mut ctx = context(&req, &res);
    Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(req.body().is_exhausted());
}

#[tokio::test]
async fn test_body_decoded_for_later_handlers() {
    let chain = HandlerChain::from(handler(|_req, _res, ctx| {
        Box::pin(async move {
            let name = ctx.body.as_ref().map(|b| b["name"].clone());
            ctx.ok(&json!({ "got": name }))
        })
    }));

    let mut req = streamed(
        Method::PATCH,
        "/",
        "application/json; charset=utf-8",
        16,
        vec![r#"{"name""#, r#":"tobi"}"#],
    );
    let res = Response::new();
    let mut ctx = context(&req, &res);
    Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(ctx.body, Some(json!({"name": "tobi"})));
    assert_eq!(common::requests::body_json(&res), json!({"got": "tobi"}));
}

#[tokio::test]
async fn test_body_methods_only() {
    let chain = HandlerChain::from(sync_handler(|_req, _res, ctx| {
        let has_body = ctx.body.is_some();
        ctx.ok(&json!({ "has_body": has_body }))
    }));

    let mut req = json(Method::GET, "/", "{not json");
    let res = Response::new();
    let mut ctx = context(&req, &res);
    Dispatcher::default()
        .run(&mut req, &res, &mut ctx, &chain)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(common::requests::body_json(&res), json!({"has_body": false}));
}

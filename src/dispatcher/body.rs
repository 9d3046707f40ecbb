//! Body verification: the internal first step of every chain whose request
//! carries a body.
//!
//! Enforces the effective size limit and content-type allow-list, then
//! decodes the payload into `ctx.body` through the parser registry. A
//! rejection writes the error response itself, which finishes the context
//! and stops the chain before any user handler runs.

use anyhow::{Context as _, Result};
use bytes::BytesMut;
use std::sync::Arc;
use tracing::{debug, warn};

use super::core::{Handler, HandlerFuture};
use crate::config::AppConfig;
use crate::context::Context;
use crate::error::RequestError;
use crate::server::{content_length, media_type, Request, Response};

/// Initial buffer reservation cap, so a large declared length cannot make
/// us allocate before any bytes arrive.
const MAX_INITIAL_CAPACITY: u64 = 64 * 1024;

/// Size, type and decode checks for request bodies
pub struct BodyVerifier {
    config: Arc<AppConfig>,
}

impl BodyVerifier {
    #[must_use]
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    async fn verify(&self, req: &mut Request, ctx: &mut Context) -> Result<()> {
        let limit = ctx.options().effective_max_post(&self.config);
        let declared = content_length(req.headers());
        let content_type = media_type(req.headers());

        if declared > limit {
            reject(
                ctx,
                RequestError::PayloadTooLarge {
                    limit,
                    size: declared,
                    streaming: false,
                },
            );
            return Ok(());
        }

        let allowed = ctx.options().effective_content_types(&self.config);
        if !allowed.contains(&content_type) {
            let drained = req.body_mut().drain().await;
            debug!(
                request_id = %ctx.request_id(),
                drained_bytes = drained,
                "Drained body of unsupported content type"
            );
            reject(
                ctx,
                RequestError::UnsupportedContentType {
                    found: content_type,
                    allowed,
                },
            );
            return Ok(());
        }

        let mut buf = BytesMut::with_capacity(declared.min(MAX_INITIAL_CAPACITY) as usize);
        while let Some(chunk) = req.body_mut().next_chunk().await {
            let chunk = chunk.context("failed to read request body")?;
            let seen = (buf.len() + chunk.len()) as u64;
            if seen > limit {
                reject(
                    ctx,
                    RequestError::PayloadTooLarge {
                        limit,
                        size: seen,
                        streaming: true,
                    },
                );
                return Ok(());
            }
            buf.extend_from_slice(&chunk);
        }

        let decoded = ctx.parsers().decode(&content_type, &buf, ctx.route());
        match decoded {
            Ok(value) => {
                debug!(
                    request_id = %ctx.request_id(),
                    content_type = %content_type,
                    body_bytes = buf.len(),
                    "Request body decoded"
                );
                ctx.body = Some(value);
            }
            Err(err) => {
                debug!(
                    request_id = %ctx.request_id(),
                    error = %format!("{err:#}"),
                    "Parser rejected request body"
                );
                reject(ctx, RequestError::MalformedPayload { content_type });
            }
        }
        Ok(())
    }
}

impl Handler for BodyVerifier {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        _res: &'a Response,
        ctx: &'a mut Context,
    ) -> HandlerFuture<'a> {
        Box::pin(self.verify(req, ctx))
    }
}

fn reject(ctx: &Context, error: RequestError) {
    warn!(
        request_id = %ctx.request_id(),
        route = %ctx.route(),
        status = %error.status(),
        error = %error,
        "Request body rejected"
    );
    ctx.fail(&error);
}

//! Per-request flow context for axum services.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use flowtrace_core::{scope_async, FlowContext};
use tracing::{info_span, warn, Instrument};

/// Request and response header carrying the correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Flow context for a request: the incoming correlation ID, or a fresh one
pub fn context_from_request(headers: &HeaderMap) -> FlowContext {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(FlowContext::with_correlation_id)
        .unwrap_or_default()
}

/// Middleware running each request inside its own flow context.
///
/// Use with `axum::middleware::from_fn(flow_context_middleware)`.
pub async fn flow_context_middleware(req: Request, next: Next) -> Response {
    let ctx = context_from_request(req.headers());
    let correlation_id = ctx.correlation_id().to_string();

    let span = info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = scope_async(ctx, next.run(req)).instrument(span).await;

    match HeaderValue::from_str(&correlation_id) {
        Ok(value) => {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        Err(e) => warn!(error = %e, "correlation ID is not a valid header value"),
    }

    response
}

//! Carry a flow's correlation ID through message headers.
//!
//! The producer side adds [`CORRELATION_HEADER`] to outgoing message
//! headers; the worker side restores a context from them for the duration of
//! the job.

use crate::context::FlowContext;
use crate::scope;
use std::collections::HashMap;
use std::future::Future;
use tracing::debug;

/// Header name carrying the correlation ID
pub const CORRELATION_HEADER: &str = "flowtrace_correlation_id";

/// Message headers
pub type Headers = HashMap<String, String>;

/// Headers to attach to an outgoing message. Empty outside a flow.
pub fn outgoing_headers() -> Headers {
    let mut headers = Headers::new();
    inject_headers(&mut headers);
    headers
}

/// Add the current correlation ID to `headers` if a flow is active
pub fn inject_headers(headers: &mut Headers) {
    if let Some(correlation_id) = scope::current_correlation_id() {
        headers.insert(CORRELATION_HEADER.to_string(), correlation_id);
    }
}

/// Build a context from incoming headers.
///
/// A missing header yields a context with a fresh correlation ID.
pub fn context_from_headers(headers: &Headers) -> FlowContext {
    match headers.get(CORRELATION_HEADER) {
        Some(correlation_id) => FlowContext::with_correlation_id(correlation_id.clone()),
        None => {
            debug!("no correlation header on incoming message, starting new flow");
            FlowContext::new()
        }
    }
}

/// Run a job under the context carried by `headers`
pub fn run_with_headers<R>(headers: &Headers, f: impl FnOnce() -> R) -> R {
    scope::scope(context_from_headers(headers), f)
}

/// Run an async job under the context carried by `headers`
pub async fn run_with_headers_async<F>(headers: &Headers, future: F) -> F::Output
where
    F: Future,
{
    scope::scope_async(context_from_headers(headers), future).await
}

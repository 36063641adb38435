//! Strand-local "current flow context" slot.
//!
//! Synchronous code sees a per-thread slot. Futures run through
//! [`scope_async`] (and async entrypoints) see a task-local slot instead,
//! which follows the future across suspension points and worker threads and
//! shadows the thread slot while the future is polled.
//!
//! A tokio task that was spawned without a scope gets a slot keyed by its
//! task ID, so worker threads never carry one task's context into another.
//! Such a slot lives until it is cleared; prefer [`scope_async`] or
//! [`propagate`] for long-running services that spawn many bare tasks.

use crate::context::FlowContext;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use tokio::task;

thread_local! {
    static THREAD_SLOT: RefCell<Option<FlowContext>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_SLOT: RefCell<Option<FlowContext>>;
}

static UNSCOPED_TASKS: Lazy<Mutex<HashMap<task::Id, FlowContext>>> = Lazy::new(Default::default);

/// Where the calling strand keeps its context
enum Slot {
    Scoped,
    Unscoped(task::Id),
    Thread,
}

impl Slot {
    fn current() -> Self {
        if TASK_SLOT.try_with(|_| ()).is_ok() {
            Slot::Scoped
        } else if let Some(id) = task::try_id() {
            Slot::Unscoped(id)
        } else {
            Slot::Thread
        }
    }

    fn with_cell<R>(self, f: impl FnOnce(&RefCell<Option<FlowContext>>) -> R) -> Option<R> {
        match self {
            Slot::Scoped => Some(TASK_SLOT.with(f)),
            Slot::Thread => Some(THREAD_SLOT.with(f)),
            Slot::Unscoped(_) => None,
        }
    }
}

fn read_context() -> Option<FlowContext> {
    match Slot::current() {
        Slot::Unscoped(id) => UNSCOPED_TASKS.lock().get(&id).cloned(),
        slot => slot.with_cell(|cell| cell.borrow().clone()).flatten(),
    }
}

fn replace_context(ctx: Option<FlowContext>) -> Option<FlowContext> {
    match Slot::current() {
        Slot::Unscoped(id) => {
            let mut tasks = UNSCOPED_TASKS.lock();
            match ctx {
                Some(ctx) => tasks.insert(id, ctx),
                None => tasks.remove(&id),
            }
        }
        slot => slot
            .with_cell(|cell| std::mem::replace(&mut *cell.borrow_mut(), ctx))
            .flatten(),
    }
}

/// Return the current correlation ID, or `None` outside a flow
pub fn current_correlation_id() -> Option<String> {
    read_context().map(|ctx| ctx.correlation_id().to_string())
}

/// Return the current flow context, or `None` outside a flow
pub fn current_context() -> Option<FlowContext> {
    read_context()
}

/// Return the current flow context, installing a new one if none exists
pub fn get_or_create_context() -> FlowContext {
    match Slot::current() {
        Slot::Unscoped(id) => UNSCOPED_TASKS
            .lock()
            .entry(id)
            .or_insert_with(FlowContext::new)
            .clone(),
        slot => slot
            .with_cell(|cell| {
                cell.borrow_mut()
                    .get_or_insert_with(FlowContext::new)
                    .clone()
            })
            .unwrap_or_default(),
    }
}

/// Replace the current flow context
pub fn set_context(ctx: FlowContext) {
    replace_context(Some(ctx));
}

/// Clear the current flow context
pub fn clear_context() {
    replace_context(None);
}

/// Install `ctx` as current until the returned guard is dropped.
///
/// The slot's previous value is restored on drop, so nested guards unwind in
/// stack order on every exit path, panics included.
pub fn enter(ctx: FlowContext) -> ContextGuard {
    let previous = replace_context(Some(ctx));
    ContextGuard {
        previous,
        _not_send: std::marker::PhantomData,
    }
}

/// Restores the previously installed context when dropped
#[must_use = "the context is removed as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<FlowContext>,
    // The guard must be dropped on the strand that created it
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        replace_context(self.previous.take());
    }
}

/// Run `f` with `ctx` as the current context
pub fn scope<R>(ctx: FlowContext, f: impl FnOnce() -> R) -> R {
    let _guard = enter(ctx);
    f()
}

/// Run `future` with `ctx` as its task-local current context.
///
/// Dropping the returned future before completion tears the context down
/// along with it.
pub async fn scope_async<F>(ctx: FlowContext, future: F) -> F::Output
where
    F: Future,
{
    TASK_SLOT.scope(RefCell::new(Some(ctx)), future).await
}

/// Hand the caller's current context (if any) to `future`.
///
/// Useful before `tokio::spawn`, since spawned tasks start with an empty
/// slot. The context is shared, not forked; fork it first for isolation.
pub fn propagate<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let ctx = current_context();
    TASK_SLOT.scope(RefCell::new(ctx), future)
}

/// Hand a fork of the caller's current context (if any) to `future`.
///
/// The spawned work shares the correlation ID but owns its metadata, so
/// values it sets never show up in the caller's context and vice versa.
pub fn propagate_forked<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let ctx = current_context().map(|ctx| ctx.fork());
    TASK_SLOT.scope(RefCell::new(ctx), future)
}

/// Set a metadata value on the current flow context.
///
/// Creates a new context automatically if none exists.
pub fn set_flow_context_value(key: impl Into<String>, value: impl Into<Value>) {
    get_or_create_context().set_value(key, value);
}

/// Get a metadata value from the current flow context.
///
/// Returns `default` if there is no active context or the key is absent.
pub fn get_flow_context_value(key: &str, default: impl Into<Value>) -> Value {
    match current_context() {
        Some(ctx) => ctx.get_value_or(key, default),
        None => default.into(),
    }
}

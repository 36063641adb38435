//! Step declaration and traced execution.
//!
//! A [`Flow`] hands out [`StepBuilder`]s; registering a builder records the
//! step in the registry and returns a [`StepHandle`] that wraps the step's
//! logic with context management and a backend span.
//!
//! ```ignore
//! let flow = Flow::new("order");
//! let receive = flow.entrypoint("receive").register()?;
//! let charge = flow.step("charge").after("receive").register()?;
//!
//! receive.run(|| {
//!     charge.run(|| bill_customer())
//! })??;
//! ```

use crate::backend::{Attributes, StepSpan, TracingBackend};
use crate::config::get_backend;
use crate::context::FlowContext;
use crate::error::{FlowError, Result};
use crate::registry::{registry, FlowRegistry};
use crate::scope::{self, ContextGuard};
use crate::types::{FlowInfo, StepInfo};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A named flow bound to a registry
#[derive(Debug, Clone)]
pub struct Flow<'r> {
    name: String,
    registry: &'r FlowRegistry,
}

impl Flow<'static> {
    /// Create a flow in the process-wide registry
    pub fn new(name: impl Into<String>) -> Self {
        Self::in_registry(name, registry())
    }
}

impl<'r> Flow<'r> {
    /// Create a flow in a specific registry
    pub fn in_registry(name: impl Into<String>, registry: &'r FlowRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    /// Flow name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a step that starts a new flow instance
    pub fn entrypoint(&self, step_name: impl Into<String>) -> StepBuilder<'r> {
        self.builder(step_name.into(), true)
    }

    /// Declare a step that runs inside an existing flow instance
    pub fn step(&self, step_name: impl Into<String>) -> StepBuilder<'r> {
        self.builder(step_name.into(), false)
    }

    fn builder(&self, name: String, is_entrypoint: bool) -> StepBuilder<'r> {
        StepBuilder {
            registry: self.registry,
            flow_name: self.name.clone(),
            name,
            after: Vec::new(),
            is_entrypoint,
            attributes: Attributes::new(),
            backend: None,
        }
    }

    /// Resolved snapshot of this flow
    pub fn info(&self) -> Result<FlowInfo> {
        self.registry.get_flow(&self.name)
    }

    /// Check that every predecessor reference resolves
    pub fn validate(&self) -> Result<()> {
        self.registry.validate_flow(&self.name)
    }

    /// Render this flow as a diagram
    pub fn dag(&self, format: &str) -> Result<String> {
        crate::dag::generate_dag(self.registry, &self.name, format)
    }
}

/// Collects a step's declaration before registration
#[must_use = "a step is only recorded once `register` is called"]
pub struct StepBuilder<'r> {
    registry: &'r FlowRegistry,
    flow_name: String,
    name: String,
    after: Vec<String>,
    is_entrypoint: bool,
    attributes: Attributes,
    backend: Option<Arc<dyn TracingBackend>>,
}

impl<'r> StepBuilder<'r> {
    /// Add a predecessor step
    pub fn after(mut self, step_name: impl Into<String>) -> Self {
        self.after.push(step_name.into());
        self
    }

    /// Add several predecessor steps
    pub fn after_all(mut self, step_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.after.extend(step_names.into_iter().map(Into::into));
        self
    }

    /// Attach an attribute to every span this step emits
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Use `backend` instead of the globally configured one
    pub fn backend(mut self, backend: Arc<dyn TracingBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Record the step in the registry
    pub fn register(self) -> Result<StepHandle> {
        let info = StepInfo::new(self.name, self.flow_name, self.after, self.is_entrypoint);
        self.registry.register(info.clone())?;

        Ok(StepHandle {
            info: Arc::new(info),
            attributes: Arc::new(self.attributes),
            backend: self.backend,
        })
    }
}

impl fmt::Debug for StepBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepBuilder")
            .field("flow_name", &self.flow_name)
            .field("name", &self.name)
            .field("after", &self.after)
            .field("is_entrypoint", &self.is_entrypoint)
            .finish_non_exhaustive()
    }
}

/// Runs a registered step's logic under its flow context and span
#[derive(Clone)]
pub struct StepHandle {
    info: Arc<StepInfo>,
    attributes: Arc<Attributes>,
    backend: Option<Arc<dyn TracingBackend>>,
}

impl StepHandle {
    /// The registered step metadata
    pub fn info(&self) -> &StepInfo {
        &self.info
    }

    /// Step name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Whether this step starts a new flow instance
    pub fn is_entrypoint(&self) -> bool {
        self.info.is_entrypoint
    }

    /// The backend spans are sent to. The global backend is looked up at
    /// call time, so reconfiguring affects existing handles.
    pub fn backend(&self) -> Arc<dyn TracingBackend> {
        self.backend.clone().unwrap_or_else(get_backend)
    }

    fn open_span(&self) -> StepSpan {
        self.backend()
            .span(&self.info.name, &self.info.flow_name, &self.attributes)
    }

    fn require_context(&self) -> Result<()> {
        match scope::current_context() {
            Some(_) => Ok(()),
            None => Err(FlowError::NoActiveContext {
                step: self.info.name.clone(),
            }),
        }
    }

    fn enter_context(&self) -> Result<Option<ContextGuard>> {
        if self.info.is_entrypoint {
            Ok(Some(scope::enter(FlowContext::new())))
        } else {
            self.require_context().map(|_| None)
        }
    }

    fn traced<T>(&self, f: impl FnOnce() -> T, failure: impl FnOnce(&T) -> Option<String>) -> T {
        let span = self.open_span();
        let output = span.in_scope(f);
        match failure(&output) {
            Some(error) => span.fail(error),
            None => span.complete(),
        }
        output
    }

    async fn traced_async<F>(
        &self,
        future: F,
        failure: impl FnOnce(&F::Output) -> Option<String>,
    ) -> F::Output
    where
        F: Future,
    {
        let (output, span) = self.open_span().instrument(future).await;
        match failure(&output) {
            Some(error) => span.fail(error),
            None => span.complete(),
        }
        output
    }

    async fn run_scoped<F>(
        &self,
        future: F,
        failure: impl FnOnce(&F::Output) -> Option<String>,
    ) -> Result<F::Output>
    where
        F: Future,
    {
        if self.info.is_entrypoint {
            let traced = self.traced_async(future, failure);
            Ok(scope::scope_async(FlowContext::new(), traced).await)
        } else {
            self.require_context()?;
            Ok(self.traced_async(future, failure).await)
        }
    }

    /// Run synchronous step logic.
    ///
    /// Fails with [`FlowError::NoActiveContext`] when a non-entrypoint step
    /// runs outside a flow.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let _guard = self.enter_context()?;
        Ok(self.traced(f, |_| None))
    }

    /// Run fallible synchronous step logic, recording errors on the span
    pub fn try_run<T, E>(&self, f: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<FlowError> + fmt::Display,
    {
        let _guard = self.enter_context()?;
        self.traced(f, |output| output.as_ref().err().map(ToString::to_string))
    }

    /// Run asynchronous step logic.
    ///
    /// Entrypoints give the future its own task-local context, which is
    /// dropped with the future if it is cancelled.
    pub async fn run_async<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.run_scoped(future, |_| None).await
    }

    /// Run fallible asynchronous step logic, recording errors on the span
    pub async fn try_run_async<F, T, E>(&self, future: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<FlowError> + fmt::Display,
    {
        self.run_scoped(future, |output| output.as_ref().err().map(ToString::to_string))
            .await?
    }
}

impl fmt::Debug for StepHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepHandle")
            .field("info", &self.info)
            .field("attributes", &self.attributes)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

use flowtrace_core::{
    configure, current_context, get_backend, BackendChoice, Flow, FlowError, FlowRegistry,
    LoggingBackend, SpanOutcome,
};
use flowtrace_tests::{CapturedLogs, RecordingBackend};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
enum OrderError {
    Flow(FlowError),
    OutOfStock(String),
}

impl From<FlowError> for OrderError {
    fn from(err: FlowError) -> Self {
        OrderError::Flow(err)
    }
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::Flow(err) => write!(f, "{}", err),
            OrderError::OutOfStock(item) => write!(f, "out of stock: {}", item),
        }
    }
}

#[test]
fn test_steps_share_one_correlation_id() {
    let registry = FlowRegistry::new();
    let backend = RecordingBackend::new();
    let flow = Flow::in_registry("order", &registry);

    let receive = flow.entrypoint("receive").backend(backend.shared()).register().unwrap();
    let charge = flow
        .step("charge")
        .after("receive")
        .attribute("currency", "EUR")
        .backend(backend.shared())
        .register()
        .unwrap();
    let ship = flow.step("ship").after("charge").backend(backend.shared()).register().unwrap();

    receive
        .run(|| {
            charge.run(|| ()).unwrap();
            ship.run(|| ()).unwrap();
        })
        .unwrap();

    let spans = backend.spans();
    assert_eq!(spans.len(), 3);
    assert!(spans.iter().all(|s| s.correlation_id == spans[0].correlation_id));
    assert!(spans.iter().all(|s| s.outcome == SpanOutcome::Completed));
    assert_eq!(spans[0].attributes.get("currency"), Some(&json!("EUR")));
    assert_eq!(spans[2].step, "receive");

    // Every entrypoint call is a new flow instance
    receive.run(|| ()).unwrap();
    assert_ne!(backend.spans()[3].correlation_id, spans[0].correlation_id);
    assert!(current_context().is_none());
}

#[test]
fn test_failure_is_recorded_and_returned() {
    let registry = FlowRegistry::new();
    let backend = RecordingBackend::new();
    let reserve = Flow::in_registry("order", &registry)
        .entrypoint("reserve")
        .backend(backend.shared())
        .register()
        .unwrap();

    let result: Result<(), OrderError> =
        reserve.try_run(|| Err(OrderError::OutOfStock("widget".to_string())));

    assert!(matches!(result, Err(OrderError::OutOfStock(_))));
    assert_eq!(
        backend.spans()[0].outcome,
        SpanOutcome::Failed("out of stock: widget".to_string())
    );
    assert!(current_context().is_none());
}

#[test]
fn test_step_outside_flow_is_rejected() {
    let registry = FlowRegistry::new();
    let backend = RecordingBackend::new();
    let ship = Flow::in_registry("order", &registry)
        .step("ship")
        .backend(backend.shared())
        .register()
        .unwrap();

    let result: Result<(), OrderError> = ship.try_run(|| Ok(()));
    match result {
        Err(OrderError::Flow(FlowError::NoActiveContext { step })) => assert_eq!(step, "ship"),
        other => panic!("Expected NoActiveContext, got {:?}", other),
    }
    assert!(backend.spans().is_empty());
}

#[test]
fn test_logging_backend_output() {
    let registry = FlowRegistry::new();
    let flow = Flow::in_registry("order", &registry);
    let logging: Arc<LoggingBackend> = Arc::new(LoggingBackend::new());

    let receive = flow.entrypoint("receive").backend(logging.clone()).register().unwrap();
    let charge = flow.step("charge").after("receive").backend(logging).register().unwrap();

    let logs = CapturedLogs::new();
    let id = logs.capture(|| {
        receive
            .run(|| {
                let id = flowtrace_core::current_correlation_id().unwrap();
                let _: Result<(), OrderError> =
                    charge.try_run(|| Err(OrderError::OutOfStock("widget".to_string())));
                tracing::info!("between steps");
                id
            })
            .unwrap()
    });

    let lines = logs.lines();
    let starts = lines.iter().filter(|l| l.contains("step.start")).count();
    let ends: Vec<_> = lines.iter().filter(|l| l.contains("step.end")).collect();

    assert_eq!(starts, 2);
    assert_eq!(ends.len(), 2);
    assert!(ends.iter().all(|l| l.contains(&format!("correlation_id={}", id))));
    assert!(ends[0].contains("out of stock: widget"));

    // Application events inside a step carry the flow prefix
    let between = lines.iter().find(|l| l.contains("between steps")).unwrap();
    assert!(between.starts_with(&format!("flow_id={} ", id)), "{}", between);
}

#[tokio::test]
async fn test_async_pipeline() {
    let registry = FlowRegistry::new();
    let backend = RecordingBackend::new();
    let flow = Flow::in_registry("order", &registry);

    let receive = flow.entrypoint("receive").backend(backend.shared()).register().unwrap();
    let ship = flow.step("ship").after("receive").backend(backend.shared()).register().unwrap();

    let shipped: Result<u32, OrderError> = receive
        .try_run_async(async {
            tokio::task::yield_now().await;
            ship.try_run_async(async { Ok::<_, OrderError>(3) }).await
        })
        .await;

    assert_eq!(shipped.unwrap(), 3);
    let spans = backend.spans();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].correlation_id, spans[1].correlation_id);
}

#[test]
fn test_global_backend_selection() {
    configure(BackendChoice::Logging).unwrap();
    assert_eq!(get_backend().name(), "logging");

    let recorder = RecordingBackend::new();
    configure(recorder.shared()).unwrap();

    let registry = FlowRegistry::new();
    let start = Flow::in_registry("global", &registry).entrypoint("start").register().unwrap();
    start.run(|| ()).unwrap();
    assert_eq!(recorder.spans().len(), 1);

    assert_eq!(
        "zipkin".parse::<BackendChoice>().unwrap_err(),
        FlowError::UnknownBackend("zipkin".to_string())
    );
    flowtrace_core::config::reset();
}

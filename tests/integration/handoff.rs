use flowtrace_core::{
    current_correlation_id, outgoing_headers, run_with_headers, run_with_headers_async, Flow,
    FlowRegistry, Headers, CORRELATION_HEADER,
};
use flowtrace_tests::RecordingBackend;
use std::sync::mpsc;
use std::thread;

#[test]
fn test_queue_handoff_between_threads() {
    let registry = FlowRegistry::new();
    let backend = RecordingBackend::new();
    let flow = Flow::in_registry("order", &registry);

    let receive = flow.entrypoint("receive").backend(backend.shared()).register().unwrap();
    let fulfil = flow.step("fulfil").after("receive").backend(backend.shared()).register().unwrap();

    let (tx, rx) = mpsc::channel::<(Headers, String)>();
    let worker = thread::spawn(move || {
        let (headers, item) = rx.recv().unwrap();
        run_with_headers(&headers, || fulfil.run(|| item.len()).unwrap())
    });

    let producer_id = receive
        .run(|| {
            tx.send((outgoing_headers(), "widget".to_string())).unwrap();
            current_correlation_id().unwrap()
        })
        .unwrap();

    assert_eq!(worker.join().unwrap(), 6);

    let spans = backend.spans();
    let fulfil_span = spans.iter().find(|s| s.step == "fulfil").unwrap();
    assert_eq!(fulfil_span.correlation_id, producer_id);
}

#[test]
fn test_headers_without_flow() {
    assert!(current_correlation_id().is_none());
    assert!(!outgoing_headers().contains_key(CORRELATION_HEADER));
}

#[tokio::test]
async fn test_async_worker_restores_id() {
    let headers = Headers::from([(CORRELATION_HEADER.to_string(), "job-99".to_string())]);

    let handle = tokio::spawn(async move {
        run_with_headers_async(&headers, async { current_correlation_id() }).await
    });

    assert_eq!(handle.await.unwrap().as_deref(), Some("job-99"));
}

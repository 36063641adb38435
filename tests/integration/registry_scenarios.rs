use flowtrace_core::{generate_dag, registry, write_dag, Flow, FlowError, FlowRegistry, StepInfo};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

#[test]
fn test_order_flow_end_to_end() {
    let registry = FlowRegistry::new();
    let flow = Flow::in_registry("order", &registry);

    flow.entrypoint("a").register().unwrap();
    flow.step("b").after("a").register().unwrap();

    let info = registry.get_flow("order").unwrap();
    assert_eq!(
        info.steps.keys().cloned().collect::<BTreeSet<_>>(),
        ["a", "b"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
    );
    assert_eq!(
        info.entrypoints,
        ["a"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
    );
    assert!(registry.validate_flow("order").is_ok());
    assert_eq!(
        generate_dag(&registry, "order", "mermaid").unwrap(),
        "graph TD\n    a --> b\n"
    );
}

#[test]
fn test_missing_predecessor_is_named() {
    let registry = FlowRegistry::new();
    registry
        .register(StepInfo::new("x", "f", ["missing"], true))
        .unwrap();

    let err = registry.validate_flow("f").unwrap_err();
    assert_eq!(err.error_code(), "ERR_FLOW_INVALID_REFERENCES");

    let message = err.to_string();
    assert!(message.contains("'x'"));
    assert!(message.contains("'missing'"));
}

#[test]
fn test_three_missing_predecessors() {
    let registry = FlowRegistry::new();
    let flow = Flow::in_registry("f", &registry);
    flow.entrypoint("a").after_all(["m1", "m2"]).register().unwrap();
    flow.step("b").after("a").after("m3").register().unwrap();

    match flow.validate() {
        Err(FlowError::InvalidReferences { violations, .. }) => assert_eq!(violations.len(), 3),
        other => panic!("Expected InvalidReferences, got {:?}", other),
    }
}

#[test]
fn test_concurrent_disjoint_registration() {
    let registry = Arc::new(FlowRegistry::new());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let flow = Flow::in_registry("load", &registry);
                for i in 0..50 {
                    flow.step(format!("worker{}_step{}", t, i)).register()?;
                }
                Ok::<(), FlowError>(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(registry.get_flow("load").unwrap().steps.len(), 200);
}

#[test]
fn test_dag_independent_of_registration_order() {
    let forward = FlowRegistry::new();
    let backward = FlowRegistry::new();

    let steps = [
        ("receive", vec![], true),
        ("charge", vec!["receive"], false),
        ("pack", vec!["receive"], false),
        ("ship", vec!["charge", "pack"], false),
    ];

    for (name, after, entry) in steps.iter() {
        forward
            .register(StepInfo::new(*name, "order", after.iter().copied(), *entry))
            .unwrap();
    }
    for (name, after, entry) in steps.iter().rev() {
        backward
            .register(StepInfo::new(*name, "order", after.iter().rev().copied(), *entry))
            .unwrap();
    }

    assert_eq!(
        generate_dag(&forward, "order", "mermaid").unwrap(),
        generate_dag(&backward, "order", "mermaid").unwrap()
    );
}

#[test]
fn test_write_dag_to_file() {
    let registry = FlowRegistry::new();
    let flow = Flow::in_registry("order", &registry);
    flow.entrypoint("a").register().unwrap();
    flow.step("b").after("a").register().unwrap();

    let path = std::env::temp_dir().join(format!(
        "flowtrace-order-{}.mmd",
        flowtrace_core::generate_correlation_id()
    ));
    write_dag(&registry, "order", "mermaid", &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(written, "graph TD\n    a --> b\n");
}

#[test]
fn test_global_registry() {
    // Unique flow name so parallel tests in this binary don't interfere
    let flow = Flow::new("global-registry-scenario");
    flow.entrypoint("start").register().unwrap();

    assert!(registry()
        .get_all_flow_names()
        .contains(&"global-registry-scenario".to_string()));
    assert_eq!(flow.dag("mermaid").unwrap(), "graph TD\n    start\n");
}

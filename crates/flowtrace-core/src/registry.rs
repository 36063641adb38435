//! Thread-safe flow registry for load-time DAG construction.

use crate::error::{FlowError, Result};
use crate::types::{FlowInfo, StepInfo};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

type StepMap = BTreeMap<String, StepInfo>;

/// Stores step metadata and resolves full flows
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: Mutex<BTreeMap<String, StepMap>>,
}

static GLOBAL_REGISTRY: Lazy<FlowRegistry> = Lazy::new(FlowRegistry::new);

/// The process-wide registry used by [`crate::Flow::new`] and the DAG helpers
pub fn registry() -> &'static FlowRegistry {
    &GLOBAL_REGISTRY
}

impl FlowRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step.
    ///
    /// Registering an identical step again is a no-op. Registering a
    /// different step under an existing `(flow, step)` key fails and keeps
    /// the original entry.
    pub fn register(&self, info: StepInfo) -> Result<()> {
        let mut flows = self.flows.lock();
        let steps = flows.entry(info.flow_name.clone()).or_default();

        match steps.get(&info.name) {
            Some(existing) if *existing == info => Ok(()),
            Some(_) => {
                warn!(flow = %info.flow_name, step = %info.name, "conflicting step registration");
                Err(FlowError::ConflictingRegistration {
                    flow: info.flow_name,
                    step: info.name,
                })
            }
            None => {
                debug!(flow = %info.flow_name, step = %info.name, entrypoint = info.is_entrypoint, "registered step");
                steps.insert(info.name.clone(), info);
                Ok(())
            }
        }
    }

    /// Return a resolved snapshot of a flow
    pub fn get_flow(&self, name: &str) -> Result<FlowInfo> {
        let steps = {
            let flows = self.flows.lock();
            flows
                .get(name)
                .cloned()
                .ok_or_else(|| FlowError::FlowNotFound(name.to_string()))?
        };

        Ok(FlowInfo::new(name, steps))
    }

    /// Return names of all registered flows
    pub fn get_all_flow_names(&self) -> Vec<String> {
        self.flows.lock().keys().cloned().collect()
    }

    /// Verify all `after` references resolve to registered step names.
    ///
    /// Every unresolved reference is reported, not just the first. Cycles
    /// are not checked; see [`FlowInfo::find_cycle`].
    pub fn validate_flow(&self, name: &str) -> Result<()> {
        let flow = self.get_flow(name)?;
        let known = &flow.steps;

        let violations: Vec<String> = known
            .values()
            .flat_map(|step| {
                step.after
                    .iter()
                    .filter(move |pred| !known.contains_key(pred.as_str()))
                    .map(move |pred| {
                        format!("Step '{}' references unknown step '{}'", step.name, pred)
                    })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(FlowError::InvalidReferences {
                flow: name.to_string(),
                violations,
            })
        }
    }

    /// Remove all registered flows. Intended for test isolation.
    pub fn clear(&self) {
        self.flows.lock().clear();
    }
}

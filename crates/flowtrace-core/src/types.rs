use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Metadata for a single step within a flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepInfo {
    /// Step name, unique within its flow
    pub name: String,

    /// Name of the owning flow
    pub flow_name: String,

    /// Steps that precede this one
    pub after: Vec<String>,

    /// Whether this step starts a flow instance
    pub is_entrypoint: bool,
}

impl StepInfo {
    /// Create a new step record
    pub fn new(
        name: impl Into<String>,
        flow_name: impl Into<String>,
        after: impl IntoIterator<Item = impl Into<String>>,
        is_entrypoint: bool,
    ) -> Self {
        Self {
            name: name.into(),
            flow_name: flow_name.into(),
            after: after.into_iter().map(Into::into).collect(),
            is_entrypoint,
        }
    }
}

/// Resolved metadata for a complete flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    /// Flow name
    pub name: String,

    /// Steps keyed by name
    pub steps: BTreeMap<String, StepInfo>,

    /// Names of the entrypoint steps
    pub entrypoints: BTreeSet<String>,
}

impl FlowInfo {
    /// Build a snapshot, deriving entrypoints from the steps
    pub fn new(name: impl Into<String>, steps: BTreeMap<String, StepInfo>) -> Self {
        let entrypoints = steps
            .values()
            .filter(|step| step.is_entrypoint)
            .map(|step| step.name.clone())
            .collect();

        Self {
            name: name.into(),
            steps,
            entrypoints,
        }
    }

    /// `(predecessor, step)` pairs declared through `after`
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.steps
            .values()
            .flat_map(|step| {
                step.after
                    .iter()
                    .map(move |pred| (pred.as_str(), step.name.as_str()))
            })
            .collect()
    }

    /// Find one cycle among the `after` references, if any.
    ///
    /// Returns the step names along the cycle, starting and ending with the
    /// same step. References to unknown steps are ignored. Validation does
    /// not call this; cyclic flows are accepted by the registry.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut finished: HashSet<&str> = HashSet::new();

        for root in self.steps.keys() {
            if finished.contains(root.as_str()) {
                continue;
            }

            // Depth-first over `after` edges: (step, next predecessor index)
            let mut path: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            let mut on_path: HashSet<&str> = HashSet::from([root.as_str()]);

            while let Some((name, next)) = path.last_mut() {
                let preds = self
                    .steps
                    .get(*name)
                    .map(|step| step.after.as_slice())
                    .unwrap_or_default();

                match preds.get(*next) {
                    Some(pred) => {
                        *next += 1;
                        let pred = pred.as_str();

                        if on_path.contains(pred) {
                            let start = path.iter().position(|(seen, _)| *seen == pred).unwrap_or(0);
                            let mut cycle: Vec<String> =
                                path[start..].iter().map(|(seen, _)| seen.to_string()).collect();
                            cycle.push(pred.to_string());
                            return Some(cycle);
                        }
                        if self.steps.contains_key(pred) && !finished.contains(pred) {
                            on_path.insert(pred);
                            path.push((pred, 0));
                        }
                    }
                    None => {
                        let done = *name;
                        on_path.remove(done);
                        finished.insert(done);
                        path.pop();
                    }
                }
            }
        }

        None
    }
}

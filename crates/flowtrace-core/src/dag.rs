//! DAG generation and visualization for registered flows.

use crate::error::{FlowError, Result};
use crate::registry::FlowRegistry;
use crate::types::FlowInfo;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Supported diagram formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DagFormat {
    /// Mermaid flowchart (`graph TD`)
    #[default]
    Mermaid,
}

impl FromStr for DagFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mermaid" => Ok(DagFormat::Mermaid),
            other => Err(FlowError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DagFormat::Mermaid => f.write_str("mermaid"),
        }
    }
}

/// Render a resolved flow as a Mermaid diagram.
///
/// Edges are sorted by `(predecessor, step)` so the output is identical for
/// identical flows regardless of registration order. A flow without edges
/// lists each step as a standalone node.
pub fn render_mermaid(info: &FlowInfo) -> String {
    let mut lines = vec!["graph TD".to_string()];

    let mut edges = info.edges();
    edges.sort_unstable();

    if edges.is_empty() {
        // BTreeMap keys are already sorted
        lines.extend(info.steps.keys().map(|name| format!("    {}", name)));
    } else {
        lines.extend(
            edges
                .into_iter()
                .map(|(src, dst)| format!("    {} --> {}", src, dst)),
        );
    }

    let mut diagram = lines.join("\n");
    diagram.push('\n');
    diagram
}

/// Render a flow in the given format
pub fn render(info: &FlowInfo, format: DagFormat) -> String {
    match format {
        DagFormat::Mermaid => render_mermaid(info),
    }
}

/// Generate a diagram for a registered flow.
///
/// The format is checked before the registry is consulted.
pub fn generate_dag(registry: &FlowRegistry, flow_name: &str, format: &str) -> Result<String> {
    let format: DagFormat = format.parse()?;
    let info = registry.get_flow(flow_name)?;
    Ok(render(&info, format))
}

/// Generate a diagram for a registered flow and write it to `path`
pub fn write_dag(
    registry: &FlowRegistry,
    flow_name: &str,
    format: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    let diagram = generate_dag(registry, flow_name, format)?;
    let path = path.as_ref();
    std::fs::write(path, diagram)?;
    debug!(flow = %flow_name, path = %path.display(), "wrote flow diagram");
    Ok(())
}

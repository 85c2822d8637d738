use std::collections::HashSet;
use std::fmt;

use super::GraphProto;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyError {
    pub missing_value: String,
    pub node_name: String,
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value '{}' is missing before node '{}'",
            self.missing_value, self.node_name
        )
    }
}

impl std::error::Error for TopologyError {}

/// Checks that every node input is defined before the node consumes it.
///
/// Values are defined by graph inputs, initializers, or outputs of earlier nodes. Empty input
/// names denote omitted optional inputs and are skipped.
pub fn validate_graph_topology(graph: &GraphProto) -> Result<(), TopologyError> {
    let mut available: HashSet<&str> = HashSet::new();
    for input in &graph.inputs {
        available.insert(input.name.as_str());
    }
    for init in &graph.initializers {
        available.insert(init.name.as_str());
    }

    for node in &graph.nodes {
        for input in &node.inputs {
            if input.is_empty() {
                continue;
            }
            if !available.contains(input.as_str()) {
                return Err(TopologyError {
                    missing_value: input.clone(),
                    node_name: node.name.clone(),
                });
            }
        }
        for output in &node.outputs {
            available.insert(output.as_str());
        }
    }

    Ok(())
}

//! Mutable accumulator of nodes, values and initializers for one materialization pass.

use crate::proto::{DType, NodeProto, TensorProto, ValueInfo, DEFAULT_DOMAIN};

use super::variable::Variable;

/// Node emitted into a container together with the operator version it was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedNode {
    pub node: NodeProto,
    pub op_version: u32,
}

/// Collects graph pieces until the document is assembled.
///
/// `dtype` is the floating type constants flagged for implicit casting are converted to.
#[derive(Debug, Clone)]
pub struct ModelContainer {
    target_opset: u32,
    dtype: DType,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
    pub initializers: Vec<TensorProto>,
    pub nodes: Vec<EmittedNode>,
}

impl ModelContainer {
    pub fn new(target_opset: u32, dtype: DType) -> Self {
        ModelContainer {
            target_opset,
            dtype,
            inputs: Vec::new(),
            outputs: Vec::new(),
            initializers: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn target_opset(&self) -> u32 {
        self.target_opset
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Registers a graph input; registering the same name twice is a no-op.
    pub fn add_input(&mut self, variable: &Variable) {
        if self.inputs.iter().any(|info| info.name == variable.onnx_name) {
            return;
        }
        self.inputs.push(variable.value_info());
    }

    /// Registers a graph output; registering the same name twice is a no-op.
    pub fn add_output(&mut self, variable: &Variable) {
        if self.outputs.iter().any(|info| info.name == variable.onnx_name) {
            return;
        }
        self.outputs.push(variable.value_info());
    }

    pub fn add_initializer(&mut self, tensor: TensorProto) {
        self.initializers.push(tensor);
    }

    /// Appends a node and returns its position in emission order.
    pub fn add_node(&mut self, node: NodeProto, op_version: u32) -> usize {
        self.nodes.push(EmittedNode { node, op_version });
        self.nodes.len() - 1
    }

    pub fn node_protos(&self) -> Vec<NodeProto> {
        self.nodes.iter().map(|emitted| emitted.node.clone()).collect()
    }

    /// Highest operator version required per domain, in order of first appearance.
    ///
    /// The default domain never drops below the container's target opset.
    pub fn domain_versions(&self) -> Vec<(String, u32)> {
        let mut versions: Vec<(String, u32)> = Vec::new();
        for emitted in &self.nodes {
            let domain = emitted.node.domain.as_str();
            match versions.iter_mut().find(|(known, _)| known == domain) {
                Some((_, version)) => *version = (*version).max(emitted.op_version),
                None => {
                    let floor = if domain == DEFAULT_DOMAIN {
                        self.target_opset
                    } else {
                        emitted.op_version
                    };
                    versions.push((domain.to_string(), floor.max(emitted.op_version)));
                }
            }
        }
        if versions.is_empty() {
            versions.push((DEFAULT_DOMAIN.to_string(), self.target_opset));
        }
        versions
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::proto::make_node;

    fn node(op_type: &str, domain: &str) -> NodeProto {
        make_node(op_type, Vec::new(), Vec::new(), op_type, domain, BTreeMap::new())
    }

    #[test]
    fn domain_versions_keep_target_floor_for_default_domain() {
        let mut container = ModelContainer::new(11, DType::Float);
        container.add_node(node("Abs", ""), 9);
        container.add_node(node("Scaler", "ai.onnx.ml"), 1);
        container.add_node(node("Add", ""), 12);
        assert_eq!(
            container.domain_versions(),
            vec![("".to_string(), 12), ("ai.onnx.ml".to_string(), 1)]
        );
    }

    #[test]
    fn duplicate_inputs_are_ignored() {
        let mut container = ModelContainer::new(11, DType::Float);
        container.add_input(&Variable::new("X"));
        container.add_input(&Variable::new("X"));
        assert_eq!(container.inputs.len(), 1);
    }
}

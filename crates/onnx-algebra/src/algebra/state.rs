//! Single-node emission into a [`ModelContainer`].

use std::collections::BTreeMap;

use tracing::trace;

use crate::proto::{make_node, AttributeValue};

use super::container::ModelContainer;
use super::input::ConstantValue;
use super::scope::Scope;
use super::variable::Variable;

const INITIALIZER_SEED: &str = "init";

/// Input of a node once every upstream dependency has been emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedInput {
    /// Value referenced by name only; the document is expected to define it.
    Name(String),
    Variable(Variable),
    /// Literal that becomes an initializer.
    Constant(ConstantValue),
}

/// Emits exactly one node with already resolved inputs and output names.
pub struct GraphState<'a> {
    inputs: Vec<ResolvedInput>,
    output_names: Vec<String>,
    op_type: &'a str,
    domain: &'a str,
    op_version: u32,
    prefix: &'a str,
    attributes: &'a BTreeMap<String, AttributeValue>,
}

impl<'a> GraphState<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inputs: Vec<ResolvedInput>,
        output_names: Vec<String>,
        op_type: &'a str,
        domain: &'a str,
        op_version: u32,
        prefix: &'a str,
        attributes: &'a BTreeMap<String, AttributeValue>,
    ) -> Self {
        GraphState {
            inputs,
            output_names,
            op_type,
            domain,
            op_version,
            prefix,
            attributes,
        }
    }

    /// Writes the node, and an initializer per constant input, into `container`.
    ///
    /// Returns the position of the node in the container and its output variables.
    pub fn run(self, scope: &mut Scope, container: &mut ModelContainer) -> (usize, Vec<Variable>) {
        let mut input_names = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let name = match input {
                ResolvedInput::Name(name) => name.clone(),
                ResolvedInput::Variable(variable) => variable.onnx_name.clone(),
                ResolvedInput::Constant(constant) => add_constant(constant, scope, container),
            };
            input_names.push(name);
        }

        let node_name = scope.get_unique_operator_name(self.prefix);
        trace!(
            op_type = self.op_type,
            node = %node_name,
            inputs = ?input_names,
            outputs = ?self.output_names,
            "emitting node"
        );
        let outputs = self.output_names.iter().map(Variable::new).collect();
        let node = make_node(
            self.op_type,
            input_names,
            self.output_names,
            node_name,
            self.domain,
            self.attributes.clone(),
        );
        (container.add_node(node, self.op_version), outputs)
    }
}

fn add_constant(constant: &ConstantValue, scope: &mut Scope, container: &mut ModelContainer) -> String {
    let name = scope.get_unique_variable_name(INITIALIZER_SEED);
    let mut tensor = constant.value.clone().with_name(name.clone());
    if constant.implicit_cast && tensor.dtype().is_float() {
        tensor.data = tensor.data.cast_float(container.dtype());
    }
    container.add_initializer(tensor);
    name
}

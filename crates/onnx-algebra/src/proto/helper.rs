//! Builders assembling documents from accumulated nodes, values and initializers.

use std::collections::BTreeMap;

use super::{
    AttributeValue, GraphProto, ModelProto, NodeProto, OperatorSetId, TensorProto, TensorType,
    ValueInfo, DEFAULT_DOMAIN, IR_VERSION,
};

/// Creates a graph from nodes in topological order and its interface.
pub fn make_graph(
    nodes: Vec<NodeProto>,
    name: impl Into<String>,
    inputs: Vec<ValueInfo>,
    outputs: Vec<ValueInfo>,
    initializers: Vec<TensorProto>,
) -> GraphProto {
    GraphProto {
        name: name.into(),
        nodes,
        inputs,
        outputs,
        initializers,
    }
}

/// Wraps a graph into a model importing the default domain at the latest tested opset.
///
/// Callers overwrite `opset_import` and the metadata fields once the real requirements of the
/// graph are known.
pub fn make_model(graph: GraphProto) -> ModelProto {
    ModelProto {
        ir_version: IR_VERSION,
        producer_name: String::new(),
        producer_version: String::new(),
        domain: String::new(),
        model_version: 0,
        opset_import: vec![OperatorSetId {
            domain: DEFAULT_DOMAIN.to_string(),
            version: crate::env::latest_tested_opset(),
        }],
        graph,
    }
}

pub fn make_node(
    op_type: impl Into<String>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    name: impl Into<String>,
    domain: impl Into<String>,
    attributes: BTreeMap<String, AttributeValue>,
) -> NodeProto {
    NodeProto {
        name: name.into(),
        op_type: op_type.into(),
        domain: domain.into(),
        inputs,
        outputs,
        attributes,
    }
}

pub fn make_tensor_value_info(name: impl Into<String>, ty: Option<TensorType>) -> ValueInfo {
    ValueInfo {
        name: name.into(),
        ty,
    }
}

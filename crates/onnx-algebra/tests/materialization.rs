use std::collections::HashSet;

use anyhow::Result;
use onnx_algebra::algebra::{
    AlgebraError, ModelContainer, NodeState, OperatorGraph, OperatorVariable, Scope,
    SubstitutionOperator, ToOnnxOptions, Variable,
};
use onnx_algebra::proto::{
    validate_graph_topology, DType, TensorData, TensorProto, TensorType,
};

fn pass() -> (Scope, ModelContainer) {
    (
        Scope::new("test", 12, ["X", "Y"]),
        ModelContainer::new(12, DType::Float),
    )
}

fn float_input(name: &str) -> Variable {
    Variable::typed(name, TensorType::fixed(DType::Float, &[3]))
}

#[test]
fn emitting_twice_returns_cached_outputs() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let abs = graph.op("Abs").input("X").build()?;
    let (mut scope, mut container) = pass();

    let first = graph.add_to(abs, &mut scope, &mut container, None)?;
    let second = graph.add_to(abs, &mut scope, &mut container, None)?;
    assert_eq!(first, second);
    assert_eq!(container.nodes.len(), 1);
    assert_eq!(first[0].onnx_name, "Ab_Y");
    assert!(matches!(
        graph.node(abs)?.state(),
        NodeState::Emitted { position: 0, .. }
    ));
    Ok(())
}

#[test]
fn shared_upstream_node_is_emitted_once() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let shared = graph.op("Abs").input("X").build()?;
    let add = graph.op("Add").input(shared).input(shared).build()?;
    let (mut scope, mut container) = pass();

    graph.add_to(add, &mut scope, &mut container, None)?;
    let ops: Vec<&str> = container.nodes.iter().map(|n| n.node.op_type.as_str()).collect();
    assert_eq!(ops, vec!["Abs", "Add"]);
    let add_node = &container.nodes[1].node;
    assert_eq!(add_node.inputs, vec!["Ab_Y".to_string(), "Ab_Y".to_string()]);
    assert_eq!(add_node.outputs, vec!["Ad_C".to_string()]);
    Ok(())
}

#[test]
fn node_names_are_unique_per_prefix() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let left = graph.op("Abs").input("X").build()?;
    let right = graph.op("Abs").input("Y").build()?;
    let add = graph.op("Add").input(left).input(right).build()?;
    let (mut scope, mut container) = pass();

    graph.add_to(add, &mut scope, &mut container, None)?;
    let names: Vec<&str> = container.nodes.iter().map(|n| n.node.name.as_str()).collect();
    assert_eq!(names, vec!["Ab", "Ab1", "Ad"]);
    let outputs: Vec<&str> = container
        .nodes
        .iter()
        .map(|n| n.node.outputs[0].as_str())
        .collect();
    assert_eq!(outputs, vec!["Ab_Y", "Ab_Y1", "Ad_C"]);
    Ok(())
}

#[test]
fn unique_sentinel_yields_distinct_names() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let left = graph.op("Abs").input("X").output_name("u(Y)").build()?;
    let right = graph.op("Neg").input("X").output_name("u(Y)").build()?;
    let add = graph.op("Add").input(left).input(right).build()?;
    let (mut scope, mut container) = pass();

    graph.add_to(add, &mut scope, &mut container, None)?;
    let left_name = graph.get_output(left, 0)?;
    let right_name = graph.get_output(right, 0)?;
    assert_ne!(left_name, right_name);
    let names: HashSet<String> = [left_name, right_name].into_iter().collect();
    // "Y" is reserved by the scope, so both receive a counter.
    assert_eq!(names, HashSet::from(["Y1".to_string(), "Y2".to_string()]));
    Ok(())
}

#[test]
fn multi_output_node_contributes_all_outputs() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let topk = graph.op("TopK").inputs(["X", "K"]).build()?;
    let concat = graph.op("Concat").input(topk).attr("axis", 0i64).build()?;
    let indices = graph.item(topk, 1)?;
    let abs = graph.op("Abs").input(indices).build()?;
    let (mut scope, mut container) = pass();

    graph.add_to(concat, &mut scope, &mut container, None)?;
    graph.add_to(abs, &mut scope, &mut container, None)?;
    assert_eq!(container.nodes.len(), 3);
    assert_eq!(
        container.nodes[1].node.inputs,
        vec!["To_Values".to_string(), "To_Indices".to_string()]
    );
    assert_eq!(container.nodes[2].node.inputs, vec!["To_Indices".to_string()]);

    assert_eq!(indices.outputs(&graph)?, vec![Variable::new("To_Indices")]);
    assert_eq!(indices.get_output(&graph, 0)?, "To_Indices");
    assert!(matches!(
        indices.get_output(&graph, 1),
        Err(AlgebraError::OutputIndex { index: 1, .. })
    ));
    Ok(())
}

#[test]
fn constants_become_initializers_cast_to_container_type() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph
        .op("Add")
        .input("X")
        .input(TensorProto::from_f64([3], vec![1.0, 2.0, 3.0]))
        .build()?;
    let (mut scope, mut container) = pass();
    graph.add_to(add, &mut scope, &mut container, None)?;
    assert_eq!(container.initializers.len(), 1);
    assert_eq!(container.initializers[0].name, "init");
    assert_eq!(
        container.initializers[0].data,
        TensorData::Float(vec![1.0, 2.0, 3.0])
    );

    let mut scope = Scope::new("test", 12, ["X"]);
    let mut container = ModelContainer::new(12, DType::Double);
    graph.reset(add)?;
    graph.add_to(add, &mut scope, &mut container, None)?;
    assert_eq!(
        container.initializers[0].data,
        TensorData::Double(vec![1.0, 2.0, 3.0])
    );
    Ok(())
}

#[test]
fn placeholders_resolve_against_the_substitution_operator() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph
        .op("Add")
        .input(OperatorVariable::new(0, "input"))
        .input("Y")
        .build()?;
    let operator = SubstitutionOperator::new("LinearRegressor").with_inputs(vec![
        Variable::new("other"),
        Variable::new("input").with_onnx_name("input1"),
    ]);
    let (mut scope, mut container) = pass();

    graph.add_to(add, &mut scope, &mut container, Some(&operator))?;
    assert_eq!(
        container.nodes[0].node.inputs,
        vec!["input1".to_string(), "Y".to_string()]
    );
    Ok(())
}

#[test]
fn unresolvable_placeholders_fail() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph
        .op("Add")
        .input(OperatorVariable::new(0, "input"))
        .input("Y")
        .build()?;

    let (mut scope, mut container) = pass();
    let err = graph.add_to(add, &mut scope, &mut container, None).unwrap_err();
    assert!(matches!(err, AlgebraError::PlaceholderUnresolved { .. }));

    let empty = SubstitutionOperator::new("Scaler");
    let err = graph
        .add_to(add, &mut scope, &mut container, Some(&empty))
        .unwrap_err();
    assert!(matches!(err, AlgebraError::PlaceholderUnresolved { .. }));

    let unrelated = SubstitutionOperator::new("Scaler").with_inputs(vec![Variable::new("X")]);
    let err = graph
        .add_to(add, &mut scope, &mut container, Some(&unrelated))
        .unwrap_err();
    match err {
        AlgebraError::PlaceholderUnresolved {
            class_name,
            placeholder,
            ..
        } => {
            assert_eq!(class_name, "OnnxAdd");
            assert!(placeholder.contains("input"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}

#[test]
fn renaming_an_emitted_output_is_inconsistent() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let abs = graph.op("Abs").input("X").build()?;
    graph.update_name(abs, 0, "before")?;
    assert_eq!(graph.get_output(abs, 0)?, "before");

    let (mut scope, mut container) = pass();
    graph.add_to(abs, &mut scope, &mut container, None)?;
    graph.update_name(abs, 0, "before")?;
    let err = graph.update_name(abs, 0, "after").unwrap_err();
    assert_eq!(
        err,
        AlgebraError::InconsistentRename {
            class_name: "OnnxAbs".to_string(),
            index: 0,
            previous: "before".to_string(),
            requested: "after".to_string(),
        }
    );
    Ok(())
}

#[test]
fn outputs_before_emission_are_not_materialized() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let abs = graph.op("Abs").input("X").build()?;
    assert!(matches!(
        graph.outputs(abs),
        Err(AlgebraError::NotMaterialized { .. })
    ));
    Ok(())
}

#[test]
fn deprecated_operators_cannot_be_emitted() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let upsample = graph.op("Upsample").inputs(["X", "scales"]).build()?;
    let (mut scope, mut container) = pass();
    let err = graph
        .add_to(upsample, &mut scope, &mut container, None)
        .unwrap_err();
    assert_eq!(
        err,
        AlgebraError::DeprecatedOperator {
            class_name: "OnnxUpsample".to_string(),
        }
    );
    assert!(container.nodes.is_empty());
    Ok(())
}

#[test]
fn variadic_operator_without_inputs_fails_at_emission() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let sum = graph.op("Sum").build()?;
    let (mut scope, mut container) = pass();
    let err = graph.add_to(sum, &mut scope, &mut container, None).unwrap_err();
    assert!(matches!(err, AlgebraError::Arity { found: 0, .. }));
    Ok(())
}

#[test]
fn target_opset_below_node_version_is_a_skew() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph
        .op("Add")
        .input(float_input("X"))
        .input(float_input("Y"))
        .op_version(12)
        .build()?;
    let err = graph
        .to_onnx(add, ToOnnxOptions::new().target_opset(10))
        .unwrap_err();
    assert_eq!(
        err,
        AlgebraError::VersionSkew {
            class_name: "OnnxAdd".to_string(),
            op_version: 12,
            required: 10,
        }
    );
    Ok(())
}

#[test]
fn default_domain_requires_opset_nine() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph
        .op("Add")
        .input(float_input("X"))
        .input(float_input("Y"))
        .op_version(7)
        .build()?;
    let err = graph
        .to_onnx(add, ToOnnxOptions::new().target_opset(8))
        .unwrap_err();
    assert!(matches!(
        err,
        AlgebraError::OpsetTooLow {
            target_opset: 8,
            ..
        }
    ));
    Ok(())
}

#[test]
fn untyped_free_inputs_must_be_specified() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph.op("Add").input(float_input("X")).input("Y").build()?;
    let err = graph.to_onnx(add, ToOnnxOptions::new()).unwrap_err();
    assert_eq!(
        err,
        AlgebraError::UnknownInputType {
            class_name: "OnnxAdd".to_string(),
            input: "Y".to_string(),
        }
    );

    let model = graph.to_onnx(
        add,
        ToOnnxOptions::new()
            .input(float_input("X"))
            .input(("Y", TensorType::fixed(DType::Float, &[3]))),
    )?;
    assert_eq!(model.graph.inputs.len(), 2);
    Ok(())
}

#[test]
fn rematerializing_gives_the_same_document() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let abs = graph.op("Abs").input(float_input("X")).build()?;
    let root = graph
        .op("Add")
        .input(abs)
        .input(TensorProto::vector_f32(vec![1.0, 2.0, 3.0]))
        .build()?;

    let first = graph.to_onnx(root, ToOnnxOptions::new())?;
    let second = graph.to_onnx(root, ToOnnxOptions::new())?;
    assert_eq!(first, second);
    assert_eq!(first.graph.nodes.len(), 2);
    Ok(())
}

#[test]
fn subtree_materialized_alone_is_emitted_again_for_a_new_consumer() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let inner = graph.op("Abs").input(float_input("X")).build()?;
    let outer = graph.op("Neg").input(inner).build()?;

    let first = graph.to_onnx(inner, ToOnnxOptions::new())?;
    assert_eq!(first.graph.nodes.len(), 1);

    let second = graph.to_onnx(outer, ToOnnxOptions::new())?;
    let ops: Vec<&str> = second.graph.nodes.iter().map(|n| n.op_type.as_str()).collect();
    assert_eq!(ops, vec!["Abs", "Neg"]);
    validate_graph_topology(&second.graph)?;
    Ok(())
}

use anyhow::Result;
use onnx_algebra::algebra::{
    AlgebraError, ArityKind, NodeInput, OperatorGraph, OutputName, Variable,
};
use onnx_algebra::proto::{DType, TensorProto, TensorType};
use serde_json::json;

#[test]
fn inputs_inside_the_range_are_accepted() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let gemm_two = graph.op("Gemm").inputs(["A", "B"]).build()?;
    let gemm_three = graph.op("Gemm").inputs(["A", "B", "C"]).build()?;
    assert_eq!(graph.node(gemm_two)?.inputs().map(<[NodeInput]>::len), Some(2));
    assert_eq!(graph.node(gemm_three)?.inputs().map(<[NodeInput]>::len), Some(3));
    Ok(())
}

#[test]
fn inputs_outside_the_range_fail_with_arity() {
    let mut graph = OperatorGraph::new();
    let err = graph.op("Add").inputs(["X", "Y", "Z"]).build().unwrap_err();
    assert_eq!(
        err,
        AlgebraError::Arity {
            class_name: "OnnxAdd".to_string(),
            kind: ArityKind::Inputs,
            min: 2,
            max: 2,
            found: 3,
        }
    );

    let err = graph.op("Add").input("X").build().unwrap_err();
    assert!(matches!(err, AlgebraError::Arity { found: 1, .. }));
}

#[test]
fn fixed_arity_operator_without_inputs_uses_formal_names() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let add = graph.op("Add").build()?;
    let inputs = graph.node(add)?.inputs().expect("fixed arity defaults");
    assert_eq!(
        inputs,
        &[
            NodeInput::UnscopedName("A".to_string()),
            NodeInput::UnscopedName("B".to_string()),
        ]
    );

    let sum = graph.op("Sum").build()?;
    assert!(graph.node(sum)?.inputs().is_none());
    Ok(())
}

#[test]
fn every_input_kind_is_classified() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let abs = graph.op("Abs").input("X").build()?;
    let topk = graph.op("TopK").input("X").input(TensorProto::vector_i64(vec![2])).build()?;
    let values = graph.item(topk, 0)?;
    let typed = Variable::typed("V", TensorType::fixed(DType::Float, &[3]));
    let concat = graph
        .op("Concat")
        .input("X")
        .input(abs)
        .input(values)
        .input(typed.clone())
        .input(1.5f32)
        .input(json!("Z"))
        .input(json!([[1.0, 2.0]]))
        .attr("axis", 0i64)
        .build()?;

    let inputs = graph.node(concat)?.inputs().expect("inputs");
    assert!(matches!(&inputs[0], NodeInput::UnscopedName(name) if name == "X"));
    assert_eq!(inputs[1], NodeInput::Node(abs));
    assert_eq!(inputs[2], NodeInput::Item(values));
    assert_eq!(inputs[3], NodeInput::Variable(typed));
    assert!(matches!(&inputs[4], NodeInput::Constant(constant) if !constant.implicit_cast));
    assert!(matches!(&inputs[5], NodeInput::UnscopedName(name) if name == "Z"));
    assert!(matches!(&inputs[6], NodeInput::Constant(constant) if constant.implicit_cast));
    Ok(())
}

#[test]
fn unsupported_inputs_name_type_and_operator() {
    let mut graph = OperatorGraph::new();
    let err = graph
        .op("Add")
        .input("X")
        .input(json!({"weights": [1, 2]}))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        AlgebraError::UnsupportedInputType {
            class_name: "OnnxAdd".to_string(),
            kind: "object".to_string(),
        }
    );
    assert!(err.to_string().contains("OnnxAdd"));

    let err = graph.op("Abs").input(json!(null)).build().unwrap_err();
    assert!(matches!(err, AlgebraError::UnsupportedInputType { .. }));
}

#[test]
fn output_names_are_validated() {
    let mut graph = OperatorGraph::new();
    let err = graph.op("Abs").input("X").output_name("").build().unwrap_err();
    assert!(matches!(err, AlgebraError::InvalidOutputName { index: 0, .. }));

    let err = graph
        .op("TopK")
        .inputs(["X", "K"])
        .output_names(["V", "V"])
        .build()
        .unwrap_err();
    assert!(matches!(err, AlgebraError::InvalidOutputName { index: 1, .. }));

    let err = graph
        .op("Abs")
        .input("X")
        .output_names(["Y", "Z"])
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        AlgebraError::Arity {
            kind: ArityKind::Outputs,
            found: 2,
            ..
        }
    ));
}

#[test]
fn unique_sentinel_is_recorded_as_hint() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let abs = graph.op("Abs").input("X").output_name("u(Y)").build()?;
    assert_eq!(
        graph.node(abs)?.output_names(),
        Some(&[Some(OutputName::Unique("Y".to_string()))][..])
    );
    assert_eq!(graph.get_output(abs, 0)?, "Y");
    Ok(())
}

#[test]
fn scan_requires_output_names() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let err = graph.op("Scan").input("S").build().unwrap_err();
    assert!(matches!(err, AlgebraError::InvalidOutputName { index: 0, .. }));

    let scan = graph
        .op("Scan")
        .input("S")
        .output_names(["state", "scan_out"])
        .build()?;
    assert_eq!(graph.get_output(scan, 1)?, "scan_out");
    Ok(())
}

#[test]
fn unknown_operators_are_rejected() {
    let mut graph = OperatorGraph::new();
    let err = graph.op("Frobnicate").input("X").build().unwrap_err();
    assert_eq!(
        err,
        AlgebraError::UnknownOperator {
            op_type: "Frobnicate".to_string(),
            domain: String::new(),
        }
    );
    let err = graph.op_in_domain("Abs", "ai.onnx.ml").input("X").build().unwrap_err();
    assert!(matches!(err, AlgebraError::UnknownOperator { .. }));
}

#[test]
fn update_name_pads_missing_slots() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let topk = graph.op("TopK").inputs(["X", "K"]).build()?;
    graph.update_name(topk, 1, "indices")?;
    assert_eq!(
        graph.node(topk)?.output_names(),
        Some(&[None, Some(OutputName::Fixed("indices".to_string()))][..])
    );
    assert_eq!(graph.get_output(topk, 0)?, "Values");
    assert_eq!(graph.get_output(topk, 1)?, "indices");
    assert!(matches!(
        graph.update_name(topk, 2, "extra"),
        Err(AlgebraError::OutputIndex { index: 2, .. })
    ));
    Ok(())
}

use anyhow::Result;
use onnx_algebra::algebra::{OperatorGraph, ToOnnxOptions, Variable};
use onnx_algebra::proto::{DType, Dimension, ModelProto, Shape, TensorProto, TensorType, ML_DOMAIN};

fn typed(name: &str, dtype: DType, dims: &[usize]) -> Variable {
    Variable::typed(name, TensorType::fixed(dtype, dims))
}

fn output_type(model: &ModelProto, index: usize) -> TensorType {
    model.graph.outputs[index]
        .ty
        .clone()
        .expect("inferred output type")
}

#[test]
fn matmul_contracts_the_inner_dimension() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let matmul = graph
        .op("MatMul")
        .input(typed("X", DType::Float, &[2, 3]))
        .input(typed("W", DType::Float, &[3, 4]))
        .build()?;
    let model = graph.to_onnx(matmul, ToOnnxOptions::new())?;
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Float, &[2, 4]));
    Ok(())
}

#[test]
fn gemm_honours_transposition_flags() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let gemm = graph
        .op("Gemm")
        .input(typed("A", DType::Double, &[5, 2]))
        .input(typed("B", DType::Double, &[7, 5]))
        .attr("transA", 1i64)
        .attr("transB", 1i64)
        .build()?;
    let model = graph.to_onnx(gemm, ToOnnxOptions::new())?;
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Double, &[2, 7]));
    Ok(())
}

#[test]
fn broadcasting_and_comparisons() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let mul = graph
        .op("Mul")
        .input(typed("X", DType::Float, &[4, 3]))
        .input(TensorProto::vector_f32(vec![1.0, 2.0, 3.0]))
        .build()?;
    let less = graph.op("Less").input(mul).input(typed("Y", DType::Float, &[1, 3])).build()?;
    let model = graph.to_onnx(less, ToOnnxOptions::new())?;
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Bool, &[4, 3]));
    Ok(())
}

#[test]
fn cast_changes_only_the_element_type() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let cast = graph
        .op("Cast")
        .input(typed("X", DType::Float, &[2, 2]))
        .attr("to", DType::Int64)
        .build()?;
    let model = graph.to_onnx(cast, ToOnnxOptions::new())?;
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Int64, &[2, 2]));
    Ok(())
}

#[test]
fn reshape_reads_its_constant_shape() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let reshape = graph
        .op("Reshape")
        .input(typed("X", DType::Float, &[2, 3]))
        .input(TensorProto::vector_i64(vec![-1]))
        .build()?;
    let model = graph.to_onnx(reshape, ToOnnxOptions::new())?;
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Float, &[6]));
    assert_eq!(model.graph.initializers.len(), 1);
    Ok(())
}

#[test]
fn reductions_follow_axes_and_keepdims() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let sum = graph
        .op("ReduceSum")
        .input(typed("X", DType::Float, &[2, 3, 4]))
        .attr("axes", vec![1i64])
        .attr("keepdims", 0i64)
        .build()?;
    let argmax = graph
        .op("ArgMax")
        .input(sum)
        .attr("axis", -1i64)
        .build()?;
    let model = graph.to_onnx(argmax, ToOnnxOptions::new())?;
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Int64, &[2, 1]));
    Ok(())
}

#[test]
fn topk_types_both_outputs() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let topk = graph
        .op("TopK")
        .input(typed("X", DType::Float, &[4, 5]))
        .input(TensorProto::vector_i64(vec![2]))
        .build()?;
    let model = graph.to_onnx(topk, ToOnnxOptions::new())?;
    assert_eq!(model.graph.outputs.len(), 2);
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Float, &[4, 2]));
    assert_eq!(output_type(&model, 1), TensorType::fixed(DType::Int64, &[4, 2]));
    Ok(())
}

#[test]
fn transpose_concat_and_shape() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let transpose = graph
        .op("Transpose")
        .input(typed("X", DType::Float, &[2, 3]))
        .build()?;
    let concat = graph
        .op("Concat")
        .input(transpose)
        .input(typed("Y", DType::Float, &[3, 5]))
        .attr("axis", 1i64)
        .build()?;
    let shape = graph.op("Shape").input(concat).build()?;
    let model = graph.to_onnx(shape, ToOnnxOptions::new().other_output(concat))?;
    // Outputs follow emission order: the concatenation precedes its shape.
    assert_eq!(output_type(&model, 0), TensorType::fixed(DType::Float, &[3, 7]));
    assert_eq!(output_type(&model, 1), TensorType::fixed(DType::Int64, &[2]));
    Ok(())
}

#[test]
fn batch_dimension_of_samples_stays_unknown() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let scaler = graph
        .op_in_domain("Scaler", ML_DOMAIN)
        .input("X")
        .build()?;
    let model = graph.to_onnx(
        scaler,
        ToOnnxOptions::new().input(("X", TensorProto::from_f64([10, 4], vec![0.0; 40]))),
    )?;
    let input = model.graph.inputs[0].ty.clone().expect("typed input");
    assert_eq!(input.dtype, DType::Double);
    let expected = Shape::new(vec![Dimension::Unknown, Dimension::Static(4)]);
    assert_eq!(input.shape, Some(expected.clone()));
    assert_eq!(output_type(&model, 0), TensorType::new(DType::Float, expected));
    Ok(())
}

#[test]
fn operators_without_rule_stay_untyped() -> Result<()> {
    let mut graph = OperatorGraph::new();
    let zipmap = graph
        .op_in_domain("ZipMap", ML_DOMAIN)
        .input(typed("X", DType::Float, &[1, 2]))
        .build()?;
    let model = graph.to_onnx(zipmap, ToOnnxOptions::new())?;
    assert_eq!(model.graph.outputs.len(), 1);
    assert_eq!(model.graph.outputs[0].ty, None);
    Ok(())
}

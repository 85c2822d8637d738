//! Builds a small scaling pipeline and prints the resulting document.
//!
//! Run with `RUST_LOG=onnx_algebra=trace` to see every emitted node.

use anyhow::Result;
use onnx_algebra::algebra::{OperatorGraph, ToOnnxOptions, Variable};
use onnx_algebra::proto::{validate_graph_topology, DType, Dimension, Shape, TensorProto, TensorType};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let features = Variable::typed(
        "X",
        TensorType::new(
            DType::Float,
            Shape::new(vec![Dimension::Unknown, Dimension::Static(3)]),
        ),
    );

    let mut graph = OperatorGraph::new();
    let centered = graph
        .op("Sub")
        .input(features)
        .input(TensorProto::from_f64([3], vec![0.5, 1.0, 1.5]))
        .build()?;
    let scaled = graph
        .op("Mul")
        .input(centered)
        .input(TensorProto::from_f64([3], vec![2.0, 2.0, 2.0]))
        .output_name("variable")
        .build()?;
    graph.set_name_prefix(scaled, "Scaler")?;

    let model = graph.to_onnx(scaled, ToOnnxOptions::new())?;
    validate_graph_topology(&model.graph)?;
    println!("{model}");
    println!("{}", model.to_json_string()?);
    Ok(())
}

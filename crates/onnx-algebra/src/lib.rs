extern crate self as onnx_algebra;

pub use linkme;

pub mod algebra;
pub mod env;
pub mod proto;
pub mod schema;

pub use algebra::{
    AlgebraError, AlgebraResult, NodeId, OpInput, OperatorGraph, OutputItem, OutputName,
    ToOnnxOptions, Variable,
};
pub use proto::{DType, ModelProto, Shape, TensorProto, TensorType};

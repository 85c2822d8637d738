//! Deferred construction of operator trees and their materialization into documents.
//!
//! Operators are recorded in an [`OperatorGraph`] with symbolic inputs: names, other nodes,
//! literals or placeholders. Nothing is resolved until a tree is emitted into a
//! [`ModelContainer`], at which point every node receives scope-unique names, upstream nodes
//! are emitted first, and constants become initializers. [`OperatorGraph::to_onnx`] drives a
//! complete pass and assembles the versioned document.
mod container;
mod convert;
mod error;
mod graph;
mod infer;
mod input;
mod scope;
mod state;
mod type_helper;
mod variable;

pub use container::{EmittedNode, ModelContainer};
pub use convert::{OutputSource, RootInput, ToOnnxOptions};
pub use error::{AlgebraError, AlgebraResult, ArityKind};
pub use graph::{
    InitialType, NodeId, NodeIter, NodeState, OpBuilder, OperatorGraph, OperatorNode, OutputItem,
    OutputName,
};
pub use infer::infer_outputs;
pub use input::{classify_input, ConstantValue, NodeInput, OpInput, OperatorVariable, Scalar};
pub use scope::Scope;
pub use state::{GraphState, ResolvedInput};
pub use type_helper::{guess_type, InputSample};
pub use variable::{SubstitutionOperator, Variable};

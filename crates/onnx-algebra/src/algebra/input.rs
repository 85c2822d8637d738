//! Inputs accepted by operator nodes and their normalization.
//!
//! Callers hand [`OpInput`] values to the operator builder. Each one is classified exactly once
//! into the closed [`NodeInput`] set that the emission pass understands.

use std::fmt;

use serde_json::Value;

use crate::proto::{TensorData, TensorProto};

use super::error::{AlgebraError, AlgebraResult};
use super::graph::{NodeId, OutputItem};
use super::variable::Variable;

/// Graph-level parameter placeholder.
///
/// It is only resolvable while a node is emitted on behalf of a
/// [`SubstitutionOperator`](super::SubstitutionOperator), by matching `name` against the raw
/// names of that operator's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorVariable {
    pub index: usize,
    pub name: Option<String>,
}

impl OperatorVariable {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        OperatorVariable {
            index,
            name: Some(name.into()),
        }
    }

    pub fn unnamed(index: usize) -> Self {
        OperatorVariable { index, name: None }
    }
}

impl fmt::Display for OperatorVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "OperatorVariable('{name}')"),
            None => write!(f, "OperatorVariable(#{})", self.index),
        }
    }
}

/// Literal wrapped as a node input.
///
/// With `implicit_cast`, floating payloads are converted to the container's float type when
/// the constant is emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantValue {
    pub value: TensorProto,
    pub implicit_cast: bool,
}

impl ConstantValue {
    pub fn new(value: TensorProto, implicit_cast: bool) -> Self {
        ConstantValue {
            value,
            implicit_cast,
        }
    }
}

/// Bare scalar literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Float(f32),
    Double(f64),
    Int(i64),
    Bool(bool),
}

impl Scalar {
    fn into_tensor(self) -> TensorProto {
        let data = match self {
            Scalar::Float(value) => TensorData::Float(vec![value]),
            Scalar::Double(value) => TensorData::Double(vec![value]),
            Scalar::Int(value) => TensorData::Int64(vec![value]),
            Scalar::Bool(value) => TensorData::Bool(vec![value]),
        };
        TensorProto::new(Vec::<usize>::new(), data)
    }
}

/// Any value a caller may pass as an operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum OpInput {
    /// Forward reference to a value by name.
    Name(String),
    Node(NodeId),
    Item(OutputItem),
    Variable(Variable),
    /// Array literal; converted to the container float type on emission.
    Array(TensorProto),
    Scalar(Scalar),
    Placeholder(OperatorVariable),
    Constant(ConstantValue),
    /// Dynamically typed value, classified by its JSON shape.
    Json(Value),
}

impl OpInput {
    fn kind(&self) -> &'static str {
        match self {
            OpInput::Name(_) => "name",
            OpInput::Node(_) => "node",
            OpInput::Item(_) => "output item",
            OpInput::Variable(_) => "variable",
            OpInput::Array(_) => "array",
            OpInput::Scalar(_) => "scalar",
            OpInput::Placeholder(_) => "placeholder",
            OpInput::Constant(_) => "constant",
            OpInput::Json(value) => json_kind(value),
        }
    }
}

impl From<&str> for OpInput {
    fn from(value: &str) -> Self {
        OpInput::Name(value.to_string())
    }
}

impl From<String> for OpInput {
    fn from(value: String) -> Self {
        OpInput::Name(value)
    }
}

impl From<NodeId> for OpInput {
    fn from(value: NodeId) -> Self {
        OpInput::Node(value)
    }
}

impl From<OutputItem> for OpInput {
    fn from(value: OutputItem) -> Self {
        OpInput::Item(value)
    }
}

impl From<Variable> for OpInput {
    fn from(value: Variable) -> Self {
        OpInput::Variable(value)
    }
}

impl From<TensorProto> for OpInput {
    fn from(value: TensorProto) -> Self {
        OpInput::Array(value)
    }
}

impl From<f32> for OpInput {
    fn from(value: f32) -> Self {
        OpInput::Scalar(Scalar::Float(value))
    }
}

impl From<f64> for OpInput {
    fn from(value: f64) -> Self {
        OpInput::Scalar(Scalar::Double(value))
    }
}

impl From<i64> for OpInput {
    fn from(value: i64) -> Self {
        OpInput::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for OpInput {
    fn from(value: bool) -> Self {
        OpInput::Scalar(Scalar::Bool(value))
    }
}

impl From<OperatorVariable> for OpInput {
    fn from(value: OperatorVariable) -> Self {
        OpInput::Placeholder(value)
    }
}

impl From<ConstantValue> for OpInput {
    fn from(value: ConstantValue) -> Self {
        OpInput::Constant(value)
    }
}

impl From<Value> for OpInput {
    fn from(value: Value) -> Self {
        OpInput::Json(value)
    }
}

/// Normalized node input.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeInput {
    UnscopedName(String),
    Node(NodeId),
    Item(OutputItem),
    Variable(Variable),
    Constant(ConstantValue),
    Placeholder(OperatorVariable),
}

impl NodeInput {
    /// Upstream node this input depends on, if any.
    pub fn upstream(&self) -> Option<NodeId> {
        match self {
            NodeInput::Node(id) => Some(*id),
            NodeInput::Item(item) => Some(item.node()),
            _ => None,
        }
    }

    /// Returns `true` for inputs naming a value the tree does not compute itself.
    pub fn is_variable(&self) -> bool {
        matches!(self, NodeInput::UnscopedName(_) | NodeInput::Variable(_))
    }
}

/// Classifies a caller input for the operator `class_name`.
pub fn classify_input(input: OpInput, class_name: &str) -> AlgebraResult<NodeInput> {
    let kind = input.kind();
    let classified = match input {
        OpInput::Name(name) => NodeInput::UnscopedName(name),
        OpInput::Node(id) => NodeInput::Node(id),
        OpInput::Item(item) => NodeInput::Item(item),
        OpInput::Variable(variable) => NodeInput::Variable(variable),
        OpInput::Array(tensor) if tensor.is_consistent() => {
            NodeInput::Constant(ConstantValue::new(tensor, true))
        }
        OpInput::Array(_) => return Err(unsupported(class_name, "inconsistent array")),
        OpInput::Scalar(scalar) => NodeInput::Constant(ConstantValue::new(scalar.into_tensor(), false)),
        OpInput::Placeholder(placeholder) => NodeInput::Placeholder(placeholder),
        OpInput::Constant(constant) => NodeInput::Constant(constant),
        OpInput::Json(value) => match value {
            Value::String(name) => NodeInput::UnscopedName(name),
            Value::Bool(flag) => NodeInput::Constant(ConstantValue::new(
                Scalar::Bool(flag).into_tensor(),
                false,
            )),
            Value::Number(number) => {
                let scalar = match number.as_i64() {
                    Some(int) => Scalar::Int(int),
                    None => Scalar::Double(number.as_f64().unwrap_or(f64::NAN)),
                };
                NodeInput::Constant(ConstantValue::new(scalar.into_tensor(), false))
            }
            array @ Value::Array(_) => match json_to_tensor(&array) {
                Some(tensor) => NodeInput::Constant(ConstantValue::new(tensor, true)),
                None => return Err(unsupported(class_name, kind)),
            },
            Value::Null | Value::Object(_) => return Err(unsupported(class_name, kind)),
        },
    };
    Ok(classified)
}

fn unsupported(class_name: &str, kind: &str) -> AlgebraError {
    AlgebraError::UnsupportedInputType {
        class_name: class_name.to_string(),
        kind: kind.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Converts a rectangular, homogeneous JSON array into a tensor.
///
/// Integer-only arrays become `Int64`, arrays with any fractional number become `Double`,
/// boolean arrays become `Bool`. Ragged, empty, or mixed arrays yield `None`.
pub(crate) fn json_to_tensor(value: &Value) -> Option<TensorProto> {
    let mut dims = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        dims.push(items.len());
        cursor = items.first()?;
    }
    let mut leaves = Vec::new();
    collect_leaves(value, &dims, &mut leaves)?;

    let data = if leaves.iter().all(|leaf| leaf.is_boolean()) {
        TensorData::Bool(leaves.iter().filter_map(|leaf| leaf.as_bool()).collect())
    } else if leaves.iter().all(|leaf| leaf.as_i64().is_some()) {
        TensorData::Int64(leaves.iter().filter_map(|leaf| leaf.as_i64()).collect())
    } else if leaves.iter().all(|leaf| leaf.is_number()) {
        TensorData::Double(leaves.iter().filter_map(|leaf| leaf.as_f64()).collect())
    } else {
        return None;
    };
    Some(TensorProto::new(dims, data))
}

fn collect_leaves<'v>(value: &'v Value, dims: &[usize], leaves: &mut Vec<&'v Value>) -> Option<()> {
    match (value, dims.split_first()) {
        (Value::Array(items), Some((len, rest))) if items.len() == *len => {
            for item in items {
                collect_leaves(item, rest, leaves)?;
            }
            Some(())
        }
        (Value::Array(_), _) => None,
        (leaf, None) => {
            leaves.push(leaf);
            Some(())
        }
        (_, Some(_)) => None,
    }
}

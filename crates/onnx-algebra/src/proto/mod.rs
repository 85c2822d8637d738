//! Concrete graph document produced by the materialization pipeline.
//!
//! The types here mirror the structure of an ONNX model: a [`ModelProto`] wraps one
//! [`GraphProto`] together with the operator-set imports and producer metadata. Graphs hold
//! nodes in topological order, typed inputs/outputs, and constant initializers. Documents
//! serialize to JSON for inspection and to bincode for compact storage.

use std::{collections::BTreeMap, fmt, fs, io, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod helper;
mod topology;

pub use helper::{make_graph, make_model, make_node, make_tensor_value_info};
pub use topology::{validate_graph_topology, TopologyError};

/// IR version stamped on documents produced by this crate.
pub const IR_VERSION: i64 = 7;

/// Default (empty) operator domain.
pub const DEFAULT_DOMAIN: &str = "";

/// Domain hosting the traditional machine-learning operators.
pub const ML_DOMAIN: &str = "ai.onnx.ml";

/// Tensor element types, numbered after the interchange format's element codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Float,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Int32,
    Int64,
    String,
    Bool,
    Float16,
    Double,
    Uint32,
    Uint64,
    Bfloat16,
}

impl DType {
    /// Numeric element code used by the interchange format.
    pub fn code(self) -> i32 {
        match self {
            DType::Float => 1,
            DType::Uint8 => 2,
            DType::Int8 => 3,
            DType::Uint16 => 4,
            DType::Int16 => 5,
            DType::Int32 => 6,
            DType::Int64 => 7,
            DType::String => 8,
            DType::Bool => 9,
            DType::Float16 => 10,
            DType::Double => 11,
            DType::Uint32 => 12,
            DType::Uint64 => 13,
            DType::Bfloat16 => 16,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let dtype = match code {
            1 => DType::Float,
            2 => DType::Uint8,
            3 => DType::Int8,
            4 => DType::Uint16,
            5 => DType::Int16,
            6 => DType::Int32,
            7 => DType::Int64,
            8 => DType::String,
            9 => DType::Bool,
            10 => DType::Float16,
            11 => DType::Double,
            12 => DType::Uint32,
            13 => DType::Uint64,
            16 => DType::Bfloat16,
            _ => return None,
        };
        Some(dtype)
    }

    /// Returns `true` when the dtype is a floating-point representation.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            DType::Float | DType::Double | DType::Float16 | DType::Bfloat16
        )
    }

    /// Lower-case type name used in type constraint strings (`tensor(float)`).
    pub fn type_name(self) -> &'static str {
        match self {
            DType::Float => "float",
            DType::Uint8 => "uint8",
            DType::Int8 => "int8",
            DType::Uint16 => "uint16",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::String => "string",
            DType::Bool => "bool",
            DType::Float16 => "float16",
            DType::Double => "double",
            DType::Uint32 => "uint32",
            DType::Uint64 => "uint64",
            DType::Bfloat16 => "bfloat16",
        }
    }
}

/// Names a symbolic dynamic dimension (e.g. `N`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimSymbol(Arc<str>);

impl DimSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for DimSymbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DimSymbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(DimSymbol::new(name))
    }
}

/// Represents a single axis extent in a tensor shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Static(usize),
    Dynamic(DimSymbol),
    /// Extent not known at graph-construction time.
    Unknown,
}

impl Dimension {
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dimension::Static(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<usize> for Dimension {
    fn from(value: usize) -> Self {
        Dimension::Static(value)
    }
}

impl From<Option<usize>> for Dimension {
    fn from(value: Option<usize>) -> Self {
        value.map(Dimension::Static).unwrap_or(Dimension::Unknown)
    }
}

/// Logical tensor shape as an ordered list of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dimension>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<Dimension>>) -> Self {
        Self { dims: dims.into() }
    }

    /// Shape with only static extents.
    pub fn fixed(dims: &[usize]) -> Self {
        Self::new(dims.iter().copied().map(Dimension::Static).collect::<Vec<_>>())
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn into_dims(self) -> Vec<Dimension> {
        self.dims
    }

    /// Returns static dimensions when all dims are static.
    pub fn static_dims(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(Dimension::as_static).collect()
    }

    /// Returns element count when all dims are static.
    pub fn element_count(&self) -> Option<usize> {
        let dims = self.static_dims()?;
        let mut count = 1usize;
        for dim in dims {
            count = count.checked_mul(dim)?;
        }
        Some(count)
    }
}

/// Type descriptor of a value flowing along a graph edge.
///
/// `shape` is `None` when even the rank is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    pub dtype: DType,
    pub shape: Option<Shape>,
}

impl TensorType {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self {
            dtype,
            shape: Some(shape),
        }
    }

    pub fn unranked(dtype: DType) -> Self {
        Self { dtype, shape: None }
    }

    /// Tensor type with only static extents.
    pub fn fixed(dtype: DType, dims: &[usize]) -> Self {
        Self::new(dtype, Shape::fixed(dims))
    }

    /// Type constraint string in the schema notation, e.g. `tensor(float)`.
    pub fn constraint(&self) -> String {
        format!("tensor({})", self.dtype.type_name())
    }
}

/// Element payload of a constant tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values")]
pub enum TensorData {
    Float(Vec<f32>),
    Double(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    String(Vec<String>),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Float(_) => DType::Float,
            TensorData::Double(_) => DType::Double,
            TensorData::Int32(_) => DType::Int32,
            TensorData::Int64(_) => DType::Int64,
            TensorData::Bool(_) => DType::Bool,
            TensorData::String(_) => DType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Float(values) => values.len(),
            TensorData::Double(values) => values.len(),
            TensorData::Int32(values) => values.len(),
            TensorData::Int64(values) => values.len(),
            TensorData::Bool(values) => values.len(),
            TensorData::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts floating payloads to `target`; other payloads are returned unchanged.
    pub fn cast_float(self, target: DType) -> Self {
        match (self, target) {
            (TensorData::Double(values), DType::Float) => {
                TensorData::Float(values.into_iter().map(|v| v as f32).collect())
            }
            (TensorData::Float(values), DType::Double) => {
                TensorData::Double(values.into_iter().map(f64::from).collect())
            }
            (data, _) => data,
        }
    }

    /// Reads the payload as 64-bit integers when it holds integers.
    pub fn as_i64(&self) -> Option<Vec<i64>> {
        match self {
            TensorData::Int64(values) => Some(values.clone()),
            TensorData::Int32(values) => Some(values.iter().map(|v| i64::from(*v)).collect()),
            _ => None,
        }
    }
}

/// Dense constant tensor, used both for initializers and for constant node inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorProto {
    pub name: String,
    pub dims: Vec<usize>,
    pub data: TensorData,
}

impl TensorProto {
    /// Creates an unnamed tensor. `dims` must describe exactly `data.len()` elements.
    pub fn new(dims: impl Into<Vec<usize>>, data: TensorData) -> Self {
        Self {
            name: String::new(),
            dims: dims.into(),
            data,
        }
    }

    pub fn from_f32(dims: impl Into<Vec<usize>>, values: Vec<f32>) -> Self {
        Self::new(dims, TensorData::Float(values))
    }

    pub fn from_f64(dims: impl Into<Vec<usize>>, values: Vec<f64>) -> Self {
        Self::new(dims, TensorData::Double(values))
    }

    pub fn from_i64(dims: impl Into<Vec<usize>>, values: Vec<i64>) -> Self {
        Self::new(dims, TensorData::Int64(values))
    }

    /// One-dimensional tensor holding `values`.
    pub fn vector_f32(values: Vec<f32>) -> Self {
        Self::from_f32([values.len()], values)
    }

    pub fn vector_i64(values: Vec<i64>) -> Self {
        Self::from_i64([values.len()], values)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn tensor_type(&self) -> TensorType {
        TensorType::fixed(self.dtype(), &self.dims)
    }

    /// Returns `true` when the dims describe exactly the number of stored elements.
    pub fn is_consistent(&self) -> bool {
        self.dims.iter().product::<usize>() == self.data.len()
    }
}

/// Node attribute payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum AttributeValue {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    Tensor(TensorProto),
}

impl AttributeValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            AttributeValue::Ints(values) => Some(values),
            _ => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(values: Vec<i64>) -> Self {
        AttributeValue::Ints(values)
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(values: Vec<f32>) -> Self {
        AttributeValue::Floats(values)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        AttributeValue::Strings(values)
    }
}

impl From<TensorProto> for AttributeValue {
    fn from(value: TensorProto) -> Self {
        AttributeValue::Tensor(value)
    }
}

impl From<DType> for AttributeValue {
    fn from(value: DType) -> Self {
        AttributeValue::Int(i64::from(value.code()))
    }
}

/// Single operation in a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProto {
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Named, optionally typed graph input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub name: String,
    pub ty: Option<TensorType>,
}

/// Graph of nodes plus its interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphProto {
    pub name: String,
    pub nodes: Vec<NodeProto>,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
    pub initializers: Vec<TensorProto>,
}

/// Operator-set import entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSetId {
    pub domain: String,
    pub version: u32,
}

/// Complete versioned document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProto {
    pub ir_version: i64,
    pub producer_name: String,
    pub producer_version: String,
    pub domain: String,
    pub model_version: i64,
    pub opset_import: Vec<OperatorSetId>,
    pub graph: GraphProto,
}

#[derive(Debug, Error)]
pub enum ModelSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("model ir_version {found} is newer than supported {supported}")]
    IrVersionTooNew { found: i64, supported: i64 },
}

#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error(transparent)]
    Serialization(#[from] ModelSerdeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ModelProto {
    /// Version imported for `domain`, if any.
    pub fn opset_version(&self, domain: &str) -> Option<u32> {
        self.opset_import
            .iter()
            .find(|entry| entry.domain == domain)
            .map(|entry| entry.version)
    }

    pub fn to_json_string(&self) -> Result<String, ModelSerdeError> {
        serde_json::to_string_pretty(self).map_err(ModelSerdeError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ModelSerdeError> {
        let model: ModelProto = serde_json::from_str(src)?;
        check_ir_version(model)
    }

    pub fn to_bincode_bytes(&self) -> Result<Vec<u8>, ModelSerdeError> {
        bincode::serialize(self).map_err(ModelSerdeError::from)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, ModelSerdeError> {
        let model: ModelProto = bincode::deserialize(bytes)?;
        check_ir_version(model)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelIoError> {
        let contents = self.to_json_string()?;
        fs::write(path, contents).map_err(ModelIoError::from)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelIoError> {
        let contents = fs::read_to_string(path)?;
        ModelProto::from_json_str(&contents).map_err(ModelIoError::from)
    }

    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelIoError> {
        let bytes = self.to_bincode_bytes()?;
        fs::write(path, bytes).map_err(ModelIoError::from)
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self, ModelIoError> {
        let bytes = fs::read(path)?;
        ModelProto::from_bincode_slice(&bytes).map_err(ModelIoError::from)
    }

    pub fn to_text(&self) -> String {
        format!("{self}")
    }
}

fn check_ir_version(model: ModelProto) -> Result<ModelProto, ModelSerdeError> {
    if model.ir_version > IR_VERSION {
        return Err(ModelSerdeError::IrVersionTooNew {
            found: model.ir_version,
            supported: IR_VERSION,
        });
    }
    Ok(model)
}

impl fmt::Display for ModelProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(
            f,
            0,
            &format!(
                "model @{} (ir_version = {}, producer = {} {}) {{",
                self.graph.name, self.ir_version, self.producer_name, self.producer_version
            ),
        )?;
        let imports = self
            .opset_import
            .iter()
            .map(|entry| format!("{}:{}", display_domain(&entry.domain), entry.version))
            .collect::<Vec<_>>()
            .join(", ");
        write_line(f, 1, &format!("opset_import: [{imports}]"))?;
        fmt_graph(&self.graph, 1, f)?;
        write_line(f, 0, "}")
    }
}

fn fmt_graph(graph: &GraphProto, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !graph.inputs.is_empty() {
        write_line(f, indent, "inputs:")?;
        for input in &graph.inputs {
            write_line(f, indent + 1, &format_value_info(input))?;
        }
    }
    if !graph.initializers.is_empty() {
        write_line(f, indent, "initializers:")?;
        for init in &graph.initializers {
            write_line(
                f,
                indent + 1,
                &format!(
                    "%{} : {}",
                    init.name,
                    format_tensor_type(&init.tensor_type())
                ),
            )?;
        }
    }
    if !graph.nodes.is_empty() {
        write_line(f, indent, "nodes:")?;
        for node in &graph.nodes {
            write_line(f, indent + 1, &format_node(node))?;
        }
    }
    if !graph.outputs.is_empty() {
        write_line(f, indent, "outputs:")?;
        for output in &graph.outputs {
            write_line(f, indent + 1, &format_value_info(output))?;
        }
    }
    Ok(())
}

fn format_node(node: &NodeProto) -> String {
    let outputs = node
        .outputs
        .iter()
        .map(|name| format!("%{name}"))
        .collect::<Vec<_>>()
        .join(", ");
    let inputs = node
        .inputs
        .iter()
        .map(|name| format!("%{name}"))
        .collect::<Vec<_>>()
        .join(", ");
    let op = if node.domain.is_empty() {
        node.op_type.clone()
    } else {
        format!("{}.{}", node.domain, node.op_type)
    };
    if node.attributes.is_empty() {
        format!("{outputs} = {op}({inputs})  # {}", node.name)
    } else {
        let attrs = node
            .attributes
            .iter()
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{outputs} = {op}({inputs}) {{{attrs}}}  # {}", node.name)
    }
}

fn format_value_info(info: &ValueInfo) -> String {
    match &info.ty {
        Some(ty) => format!("%{} : {}", info.name, format_tensor_type(ty)),
        None => format!("%{} : ?", info.name),
    }
}

fn format_tensor_type(ty: &TensorType) -> String {
    match &ty.shape {
        Some(shape) => format!("tensor<{:?} x {}>", ty.dtype, format_shape(shape)),
        None => format!("tensor<{:?} x *>", ty.dtype),
    }
}

fn format_shape(shape: &Shape) -> String {
    let dims = shape
        .dims()
        .iter()
        .map(|dim| match dim {
            Dimension::Static(v) => v.to_string(),
            Dimension::Dynamic(sym) => format!("?{}", sym.as_str()),
            Dimension::Unknown => "?".to_string(),
        })
        .collect::<Vec<_>>();
    if dims.is_empty() {
        "[]".to_string()
    } else {
        dims.join("x")
    }
}

fn display_domain(domain: &str) -> &str {
    if domain.is_empty() {
        "ai.onnx"
    } else {
        domain
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_codes_round_trip() {
        for dtype in [DType::Float, DType::Int64, DType::Bool, DType::Bfloat16] {
            assert_eq!(DType::from_code(dtype.code()), Some(dtype));
        }
        assert_eq!(DType::from_code(14), None);
    }

    #[test]
    fn cast_float_converts_double_payloads() {
        let data = TensorData::Double(vec![1.5, -2.0]).cast_float(DType::Float);
        assert_eq!(data, TensorData::Float(vec![1.5, -2.0]));
        let ints = TensorData::Int64(vec![3]).cast_float(DType::Float);
        assert_eq!(ints, TensorData::Int64(vec![3]));
    }

    #[test]
    fn shape_element_count_requires_static_dims() {
        assert_eq!(Shape::fixed(&[2, 3]).element_count(), Some(6));
        let dynamic = Shape::new(vec![Dimension::Unknown, Dimension::Static(3)]);
        assert_eq!(dynamic.element_count(), None);
        assert_eq!(Shape::scalar().element_count(), Some(1));
    }
}

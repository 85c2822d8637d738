//! Shape and type inference over the nodes accumulated in a container.
//!
//! Rules cover the operators of the built-in catalogs. Operators without a rule, or whose
//! input types are unknown, produce untyped outputs rather than an error.

use std::collections::HashMap;

use crate::proto::{AttributeValue, DType, Dimension, NodeProto, Shape, TensorProto, TensorType, ValueInfo};

use super::container::ModelContainer;
use super::variable::Variable;

/// Typed output variables of every node in `container`, in emission order.
pub fn infer_outputs(
    container: &ModelContainer,
    inputs: &[ValueInfo],
    initializers: &[TensorProto],
) -> Vec<Variable> {
    let mut known: HashMap<String, TensorType> = HashMap::new();
    for input in inputs {
        if let Some(ty) = &input.ty {
            known.insert(input.name.clone(), ty.clone());
        }
    }
    let mut constants: HashMap<&str, &TensorProto> = HashMap::new();
    for tensor in initializers {
        known.insert(tensor.name.clone(), tensor.tensor_type());
        constants.insert(tensor.name.as_str(), tensor);
    }

    let mut outputs = Vec::new();
    for emitted in &container.nodes {
        let node = &emitted.node;
        let context = NodeContext {
            node,
            inputs: node.inputs.iter().map(|name| known.get(name)).collect(),
            constants: &constants,
        };
        let types = context.infer();
        let mut produced = Vec::with_capacity(node.outputs.len());
        for (index, name) in node.outputs.iter().enumerate() {
            let ty = types.get(index).cloned().flatten();
            produced.push(Variable {
                raw_name: name.clone(),
                onnx_name: name.clone(),
                ty,
            });
        }
        for variable in &produced {
            if let Some(ty) = &variable.ty {
                known.insert(variable.onnx_name.clone(), ty.clone());
            }
        }
        outputs.extend(produced);
    }
    outputs
}

struct NodeContext<'a> {
    node: &'a NodeProto,
    inputs: Vec<Option<&'a TensorType>>,
    constants: &'a HashMap<&'a str, &'a TensorProto>,
}

impl<'a> NodeContext<'a> {
    fn infer(&self) -> Vec<Option<TensorType>> {
        match self.node.op_type.as_str() {
            "Add" | "Sub" | "Mul" | "Div" | "Pow" | "Sum" | "Max" | "Min" | "Mean" => {
                self.single(self.broadcast(self.first().map(|ty| ty.dtype)))
            }
            "Equal" | "Less" | "Greater" => self.single(self.broadcast(Some(DType::Bool))),
            "Not" => self.single(self.first().map(|ty| retyped(ty, DType::Bool))),
            "Identity" | "Abs" | "Neg" | "Exp" | "Log" | "Sqrt" | "Relu" | "Sigmoid" | "Tanh"
            | "Reciprocal" | "Floor" | "Ceil" => self.single(self.first().cloned()),
            "Cast" => self.single(self.cast()),
            "MatMul" => self.single(self.matmul()),
            "Gemm" => self.single(self.gemm()),
            "Transpose" => self.single(self.transpose()),
            "Concat" => self.single(self.concat()),
            "Reshape" => self.single(self.reshape()),
            "ReduceSum" | "ReduceMean" | "ReduceMax" | "ReduceMin" => self.single(self.reduce()),
            "ArgMax" | "ArgMin" => self.single(self.arg_reduce()),
            "Shape" => self.single(
                self.first_shape()
                    .map(|shape| TensorType::fixed(DType::Int64, &[shape.rank()])),
            ),
            "TopK" => self.topk(),
            "Split" => self.split(),
            "Scaler" | "Normalizer" => self.single(self.first().map(|ty| retyped(ty, DType::Float))),
            "LinearRegressor" => self.single(self.linear_regressor()),
            _ => vec![None; self.node.outputs.len()],
        }
    }

    fn single(&self, ty: Option<TensorType>) -> Vec<Option<TensorType>> {
        let mut types = vec![None; self.node.outputs.len()];
        if let Some(slot) = types.first_mut() {
            *slot = ty;
        }
        types
    }

    fn first(&self) -> Option<&'a TensorType> {
        self.input(0)
    }

    fn input(&self, index: usize) -> Option<&'a TensorType> {
        self.inputs.get(index).copied().flatten()
    }

    fn first_shape(&self) -> Option<&'a Shape> {
        self.first().and_then(|ty| ty.shape.as_ref())
    }

    fn int_attr(&self, name: &str) -> Option<i64> {
        self.node.attributes.get(name).and_then(AttributeValue::as_int)
    }

    fn ints_attr(&self, name: &str) -> Option<Vec<i64>> {
        self.node
            .attributes
            .get(name)
            .and_then(AttributeValue::as_ints)
            .map(<[i64]>::to_vec)
    }

    /// Integer payload of input `index` when it is an initializer.
    fn constant_ints(&self, index: usize) -> Option<Vec<i64>> {
        let name = self.node.inputs.get(index)?;
        self.constants.get(name.as_str())?.data.as_i64()
    }

    fn broadcast(&self, dtype: Option<DType>) -> Option<TensorType> {
        let dtype = dtype?;
        let shapes: Option<Vec<&Shape>> = self
            .inputs
            .iter()
            .map(|ty| ty.and_then(|ty| ty.shape.as_ref()))
            .collect();
        Some(match shapes {
            Some(shapes) => TensorType::new(dtype, broadcast_shapes(&shapes)),
            None => TensorType::unranked(dtype),
        })
    }

    fn cast(&self) -> Option<TensorType> {
        let to = i32::try_from(self.int_attr("to")?).ok()?;
        let dtype = DType::from_code(to)?;
        Some(TensorType {
            dtype,
            shape: self.first_shape().cloned(),
        })
    }

    fn matmul(&self) -> Option<TensorType> {
        let a = self.first()?;
        let (Some(left), Some(right)) = (a.shape.as_ref(), self.input(1)?.shape.as_ref()) else {
            return Some(TensorType::unranked(a.dtype));
        };
        if left.rank() == 0 || right.rank() == 0 {
            return Some(TensorType::unranked(a.dtype));
        }
        let mut left_dims = left.dims().to_vec();
        let mut right_dims = right.dims().to_vec();
        let squeeze_left = left_dims.len() == 1;
        let squeeze_right = right_dims.len() == 1;
        if squeeze_left {
            left_dims.insert(0, Dimension::Static(1));
        }
        if squeeze_right {
            right_dims.push(Dimension::Static(1));
        }
        let left_batch = Shape::new(left_dims[..left_dims.len() - 2].to_vec());
        let right_batch = Shape::new(right_dims[..right_dims.len() - 2].to_vec());
        let mut dims = broadcast_shapes(&[&left_batch, &right_batch]).into_dims();
        if !squeeze_left {
            dims.push(left_dims[left_dims.len() - 2].clone());
        }
        if !squeeze_right {
            dims.push(right_dims[right_dims.len() - 1].clone());
        }
        Some(TensorType::new(a.dtype, Shape::new(dims)))
    }

    fn gemm(&self) -> Option<TensorType> {
        let a = self.first()?;
        let left = a.shape.as_ref().filter(|shape| shape.rank() == 2);
        let right = self
            .input(1)
            .and_then(|ty| ty.shape.as_ref())
            .filter(|shape| shape.rank() == 2);
        let (Some(left), Some(right)) = (left, right) else {
            return Some(TensorType::new(
                a.dtype,
                Shape::new(vec![Dimension::Unknown, Dimension::Unknown]),
            ));
        };
        let trans_a = self.int_attr("transA").unwrap_or(0) != 0;
        let trans_b = self.int_attr("transB").unwrap_or(0) != 0;
        let m = left.dims()[usize::from(trans_a)].clone();
        let n = right.dims()[usize::from(!trans_b)].clone();
        Some(TensorType::new(a.dtype, Shape::new(vec![m, n])))
    }

    fn transpose(&self) -> Option<TensorType> {
        let input = self.first()?;
        let Some(shape) = input.shape.as_ref() else {
            return Some(input.clone());
        };
        let rank = shape.rank();
        let perm: Vec<usize> = match self.ints_attr("perm") {
            Some(perm) => match perm
                .iter()
                .map(|axis| normalize_axis(*axis, rank))
                .collect::<Option<Vec<usize>>>()
            {
                Some(perm) => perm,
                None => return Some(TensorType::unranked(input.dtype)),
            },
            None => (0..rank).rev().collect(),
        };
        if perm.len() != rank {
            return Some(TensorType::unranked(input.dtype));
        }
        let dims: Vec<Dimension> = perm.iter().map(|axis| shape.dims()[*axis].clone()).collect();
        Some(TensorType::new(input.dtype, Shape::new(dims)))
    }

    fn concat(&self) -> Option<TensorType> {
        let first = self.first()?;
        let shapes: Option<Vec<&Shape>> = self
            .inputs
            .iter()
            .map(|ty| ty.and_then(|ty| ty.shape.as_ref()))
            .collect();
        let Some(shapes) = shapes else {
            return Some(TensorType::unranked(first.dtype));
        };
        let rank = shapes[0].rank();
        let axis = normalize_axis(self.int_attr("axis").unwrap_or(0), rank);
        let (Some(axis), true) = (axis, shapes.iter().all(|shape| shape.rank() == rank)) else {
            return Some(TensorType::unranked(first.dtype));
        };
        let mut dims = shapes[0].dims().to_vec();
        dims[axis] = shapes
            .iter()
            .map(|shape| shape.dims()[axis].as_static())
            .sum::<Option<usize>>()
            .map_or(Dimension::Unknown, Dimension::Static);
        Some(TensorType::new(first.dtype, Shape::new(dims)))
    }

    fn reshape(&self) -> Option<TensorType> {
        let input = self.first()?;
        let Some(target) = self.constant_ints(1).or_else(|| self.ints_attr("shape")) else {
            return Some(TensorType::unranked(input.dtype));
        };
        let source = input.shape.as_ref();
        let mut dims: Vec<Dimension> = target
            .iter()
            .enumerate()
            .map(|(index, extent)| match *extent {
                0 => source
                    .and_then(|shape| shape.dims().get(index).cloned())
                    .unwrap_or(Dimension::Unknown),
                extent if extent > 0 => Dimension::Static(extent as usize),
                _ => Dimension::Unknown,
            })
            .collect();

        if let Some(inferred) = target.iter().position(|extent| *extent == -1) {
            let total = source.and_then(Shape::element_count);
            let known: Option<usize> = dims
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != inferred)
                .map(|(_, dim)| dim.as_static())
                .product();
            if let (Some(total), Some(known)) = (total, known) {
                if known > 0 && total % known == 0 {
                    dims[inferred] = Dimension::Static(total / known);
                }
            }
        }
        Some(TensorType::new(input.dtype, Shape::new(dims)))
    }

    fn reduce(&self) -> Option<TensorType> {
        let input = self.first()?;
        let Some(shape) = input.shape.as_ref() else {
            return Some(input.clone());
        };
        let keepdims = self.int_attr("keepdims").unwrap_or(1) != 0;
        let axes: Vec<usize> = match self.ints_attr("axes") {
            Some(axes) => match axes
                .iter()
                .map(|axis| normalize_axis(*axis, shape.rank()))
                .collect::<Option<Vec<usize>>>()
            {
                Some(axes) => axes,
                None => return Some(TensorType::unranked(input.dtype)),
            },
            None => (0..shape.rank()).collect(),
        };
        Some(TensorType::new(input.dtype, reduced_shape(shape, &axes, keepdims)))
    }

    fn arg_reduce(&self) -> Option<TensorType> {
        let shape = match self.first_shape() {
            Some(shape) => shape,
            None => return Some(TensorType::unranked(DType::Int64)),
        };
        let keepdims = self.int_attr("keepdims").unwrap_or(1) != 0;
        let Some(axis) = normalize_axis(self.int_attr("axis").unwrap_or(0), shape.rank()) else {
            return Some(TensorType::unranked(DType::Int64));
        };
        Some(TensorType::new(DType::Int64, reduced_shape(shape, &[axis], keepdims)))
    }

    fn topk(&self) -> Vec<Option<TensorType>> {
        let mut types = vec![None; self.node.outputs.len()];
        let Some(input) = self.first() else {
            return types;
        };
        let shape = input.shape.as_ref().and_then(|shape| {
            let axis = normalize_axis(self.int_attr("axis").unwrap_or(-1), shape.rank())?;
            let k = self
                .constant_ints(1)
                .and_then(|values| values.first().copied())
                .or_else(|| self.int_attr("k"))
                .and_then(|k| usize::try_from(k).ok());
            let mut dims = shape.dims().to_vec();
            dims[axis] = k.map_or(Dimension::Unknown, Dimension::Static);
            Some(Shape::new(dims))
        });
        let typed = |dtype| TensorType {
            dtype,
            shape: shape.clone(),
        };
        if let Some(slot) = types.get_mut(0) {
            *slot = Some(typed(input.dtype));
        }
        if let Some(slot) = types.get_mut(1) {
            *slot = Some(typed(DType::Int64));
        }
        types
    }

    fn split(&self) -> Vec<Option<TensorType>> {
        let count = self.node.outputs.len();
        let Some(input) = self.first() else {
            return vec![None; count];
        };
        let Some(shape) = input.shape.as_ref() else {
            return vec![Some(TensorType::unranked(input.dtype)); count];
        };
        let Some(axis) = normalize_axis(self.int_attr("axis").unwrap_or(0), shape.rank()) else {
            return vec![Some(TensorType::unranked(input.dtype)); count];
        };
        let sizes = self.ints_attr("split").or_else(|| self.constant_ints(1));
        (0..count)
            .map(|index| {
                let extent = match &sizes {
                    Some(sizes) => sizes
                        .get(index)
                        .and_then(|size| usize::try_from(*size).ok())
                        .map_or(Dimension::Unknown, Dimension::Static),
                    None => match shape.dims()[axis].as_static() {
                        Some(total) if count > 0 && total % count == 0 => Dimension::Static(total / count),
                        _ => Dimension::Unknown,
                    },
                };
                let mut dims = shape.dims().to_vec();
                dims[axis] = extent;
                Some(TensorType::new(input.dtype, Shape::new(dims)))
            })
            .collect()
    }

    fn linear_regressor(&self) -> Option<TensorType> {
        let batch = self
            .first_shape()
            .and_then(|shape| shape.dims().first().cloned())
            .unwrap_or(Dimension::Unknown);
        let targets = self
            .int_attr("targets")
            .and_then(|targets| usize::try_from(targets).ok())
            .unwrap_or(1);
        Some(TensorType::new(
            DType::Float,
            Shape::new(vec![batch, Dimension::Static(targets)]),
        ))
    }
}

fn retyped(ty: &TensorType, dtype: DType) -> TensorType {
    TensorType {
        dtype,
        shape: ty.shape.clone(),
    }
}

fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = i64::try_from(rank).ok()?;
    let axis = if axis < 0 { axis + rank } else { axis };
    if (0..rank).contains(&axis) {
        usize::try_from(axis).ok()
    } else {
        None
    }
}

fn reduced_shape(shape: &Shape, axes: &[usize], keepdims: bool) -> Shape {
    let dims = shape
        .dims()
        .iter()
        .enumerate()
        .filter_map(|(index, dim)| match (axes.contains(&index), keepdims) {
            (false, _) => Some(dim.clone()),
            (true, true) => Some(Dimension::Static(1)),
            (true, false) => None,
        })
        .collect::<Vec<_>>();
    Shape::new(dims)
}

/// Numpy-style broadcast of several shapes.
pub(crate) fn broadcast_shapes(shapes: &[&Shape]) -> Shape {
    let rank = shapes.iter().map(|shape| shape.rank()).max().unwrap_or(0);
    let mut dims = vec![Dimension::Static(1); rank];
    for shape in shapes {
        let offset = rank - shape.rank();
        for (index, dim) in shape.dims().iter().enumerate() {
            dims[offset + index] = merge_dims(&dims[offset + index], dim);
        }
    }
    Shape::new(dims)
}

fn merge_dims(left: &Dimension, right: &Dimension) -> Dimension {
    match (left, right) {
        (Dimension::Static(1), other) | (other, Dimension::Static(1)) => other.clone(),
        (Dimension::Static(a), Dimension::Static(b)) if a == b => Dimension::Static(*a),
        (Dimension::Static(_), Dimension::Static(_)) => Dimension::Unknown,
        (Dimension::Static(extent), _) | (_, Dimension::Static(extent)) => Dimension::Static(*extent),
        (a, b) if a == b => a.clone(),
        _ => Dimension::Unknown,
    }
}

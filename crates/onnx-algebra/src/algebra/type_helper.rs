use serde_json::Value;

use crate::proto::{DType, Dimension, Shape, TensorProto, TensorType};

use super::input::json_to_tensor;

/// Value describing the type of a root input of a materialized document.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSample {
    Type(TensorType),
    /// Example tensor; its first dimension is treated as the batch dimension.
    Literal(TensorProto),
    Json(Value),
    Unknown,
}

impl From<TensorType> for InputSample {
    fn from(value: TensorType) -> Self {
        InputSample::Type(value)
    }
}

impl From<TensorProto> for InputSample {
    fn from(value: TensorProto) -> Self {
        InputSample::Literal(value)
    }
}

impl From<Value> for InputSample {
    fn from(value: Value) -> Self {
        InputSample::Json(value)
    }
}

/// Tensor type for an input sample, or `None` when the sample carries no usable type.
///
/// Literal samples keep their element type and trailing dimensions; the leading dimension
/// becomes unknown so any batch size is accepted.
pub fn guess_type(sample: &InputSample) -> Option<TensorType> {
    match sample {
        InputSample::Type(ty) => Some(ty.clone()),
        InputSample::Literal(tensor) => Some(batched(tensor.dtype(), &tensor.dims)),
        InputSample::Json(Value::String(_)) => Some(batched(DType::String, &[])),
        InputSample::Json(Value::Array(items))
            if !items.is_empty() && items.iter().all(Value::is_string) =>
        {
            Some(batched(DType::String, &[items.len()]))
        }
        InputSample::Json(value) => {
            json_to_tensor(value).map(|tensor| batched(tensor.dtype(), &tensor.dims))
        }
        InputSample::Unknown => None,
    }
}

fn batched(dtype: DType, dims: &[usize]) -> TensorType {
    let mut shape = vec![Dimension::Unknown];
    shape.extend(dims.iter().skip(1).copied().map(Dimension::Static));
    TensorType::new(dtype, Shape::new(shape))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn literal_samples_drop_the_batch_dimension() {
        let sample = InputSample::Literal(TensorProto::from_f32([4, 3], vec![0.0; 12]));
        let ty = guess_type(&sample).expect("typed");
        assert_eq!(ty.dtype, DType::Float);
        assert_eq!(
            ty.shape.expect("shape").dims(),
            &[Dimension::Unknown, Dimension::Static(3)]
        );
    }

    #[test]
    fn json_samples_are_typed_by_content() {
        let ty = guess_type(&InputSample::Json(json!([[1.5, 2.0]]))).expect("typed");
        assert_eq!(ty.dtype, DType::Double);
        assert!(guess_type(&InputSample::Json(json!({"x": 1}))).is_none());
        assert!(guess_type(&InputSample::Unknown).is_none());
    }
}

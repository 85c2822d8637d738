use crate::proto::{make_tensor_value_info, TensorType, ValueInfo};

/// Named slot representing a value flowing along a graph edge.
///
/// `raw_name` is the name the caller used; `onnx_name` is the name written into the document.
/// Both are equal unless a scope renamed the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub raw_name: String,
    pub onnx_name: String,
    pub ty: Option<TensorType>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Variable {
            raw_name: name.clone(),
            onnx_name: name,
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: TensorType) -> Self {
        Variable {
            ty: Some(ty),
            ..Variable::new(name)
        }
    }

    pub fn with_onnx_name(mut self, onnx_name: impl Into<String>) -> Self {
        self.onnx_name = onnx_name.into();
        self
    }

    pub fn value_info(&self) -> ValueInfo {
        make_tensor_value_info(self.onnx_name.clone(), self.ty.clone())
    }
}

/// Concrete operator whose inputs resolve operator-variable placeholders at emission time.
///
/// This is the view a converter has of the operator it is translating: the variables it
/// consumes and produces, identified by their raw names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionOperator {
    pub op_type: String,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
}

impl SubstitutionOperator {
    pub fn new(op_type: impl Into<String>) -> Self {
        SubstitutionOperator {
            op_type: op_type.into(),
            ..SubstitutionOperator::default()
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Variable>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Variable>) -> Self {
        self.outputs = outputs;
        self
    }

    /// First input whose raw name equals `raw_name`.
    pub fn find_input(&self, raw_name: &str) -> Option<&Variable> {
        self.inputs.iter().find(|input| input.raw_name == raw_name)
    }
}

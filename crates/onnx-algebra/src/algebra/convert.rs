//! Materialization of an operator tree into a complete document.

use std::collections::HashSet;

use tracing::debug;

use crate::env::{latest_tested_opset, model_metadata, ModelMetadata};
use crate::proto::{
    make_graph, make_model, DType, ModelProto, OperatorSetId, TensorType, DEFAULT_DOMAIN,
};

use super::container::ModelContainer;
use super::error::{AlgebraError, AlgebraResult};
use super::graph::{InitialType, NodeId, OperatorGraph, OutputItem};
use super::infer::infer_outputs;
use super::scope::Scope;
use super::type_helper::{guess_type, InputSample};
use super::variable::{SubstitutionOperator, Variable};

/// Lowest opset able to express default-domain operators.
const MIN_DEFAULT_DOMAIN_OPSET: u32 = 9;

/// Root input of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum RootInput {
    Variable(Variable),
    Named(String, InputSample),
}

impl From<Variable> for RootInput {
    fn from(value: Variable) -> Self {
        RootInput::Variable(value)
    }
}

impl<S, T> From<(S, T)> for RootInput
where
    S: Into<String>,
    T: Into<InputSample>,
{
    fn from((name, sample): (S, T)) -> Self {
        RootInput::Named(name.into(), sample.into())
    }
}

/// Additional node whose outputs are part of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Node(NodeId),
    Item(OutputItem),
}

impl From<NodeId> for OutputSource {
    fn from(value: NodeId) -> Self {
        OutputSource::Node(value)
    }
}

impl From<OutputItem> for OutputSource {
    fn from(value: OutputItem) -> Self {
        OutputSource::Item(value)
    }
}

/// Parameters of [`OperatorGraph::to_onnx`].
#[derive(Debug, Clone)]
pub struct ToOnnxOptions {
    inputs: Option<Vec<RootInput>>,
    outputs: Option<Vec<Variable>>,
    other_outputs: Vec<OutputSource>,
    dtype: DType,
    target_opset: Option<u32>,
    metadata: Option<ModelMetadata>,
    substitution: Option<SubstitutionOperator>,
}

impl Default for ToOnnxOptions {
    fn default() -> Self {
        ToOnnxOptions {
            inputs: None,
            outputs: None,
            other_outputs: Vec::new(),
            dtype: DType::Float,
            target_opset: None,
            metadata: None,
            substitution: None,
        }
    }
}

impl ToOnnxOptions {
    pub fn new() -> Self {
        ToOnnxOptions::default()
    }

    pub fn input(mut self, input: impl Into<RootInput>) -> Self {
        self.inputs.get_or_insert_with(Vec::new).push(input.into());
        self
    }

    /// Root inputs, either as a list or as a name-to-sample map.
    pub fn inputs<I, R>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RootInput>,
    {
        self.inputs
            .get_or_insert_with(Vec::new)
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Explicit graph output, bypassing inference.
    pub fn output(mut self, name: impl Into<String>, ty: TensorType) -> Self {
        self.outputs
            .get_or_insert_with(Vec::new)
            .push(Variable::typed(name, ty));
        self
    }

    pub fn outputs<I>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = Variable>,
    {
        self.outputs.get_or_insert_with(Vec::new).extend(outputs);
        self
    }

    pub fn other_output(mut self, source: impl Into<OutputSource>) -> Self {
        self.other_outputs.push(source.into());
        self
    }

    /// Float type used for implicitly cast constants; `Float` unless set to `Double`.
    pub fn dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn target_opset(mut self, target_opset: u32) -> Self {
        self.target_opset = Some(target_opset);
        self
    }

    pub fn metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Operator resolving operator-variable placeholders in the tree.
    pub fn substitution(mut self, operator: SubstitutionOperator) -> Self {
        self.substitution = Some(operator);
        self
    }
}

impl OperatorGraph {
    /// Materializes the tree rooted at `root` into a versioned document.
    ///
    /// Emission state reachable from `root` is cleared first, so calling this repeatedly
    /// yields equivalent documents.
    pub fn to_onnx(&mut self, root: NodeId, options: ToOnnxOptions) -> AlgebraResult<ModelProto> {
        let ToOnnxOptions {
            inputs,
            outputs,
            other_outputs,
            dtype,
            target_opset,
            metadata,
            substitution,
        } = options;

        let node = self.node(root)?;
        let class_name = node.class_name();
        if let Some(target) = target_opset {
            if node.op_version() > target {
                return Err(AlgebraError::VersionSkew {
                    class_name,
                    op_version: node.op_version(),
                    required: target,
                });
            }
        }
        let target_opset = target_opset.unwrap_or_else(latest_tested_opset);
        if target_opset < MIN_DEFAULT_DOMAIN_OPSET && node.domain() == DEFAULT_DOMAIN {
            return Err(AlgebraError::OpsetTooLow {
                class_name,
                target_opset,
                domain: node.domain().to_string(),
            });
        }

        self.reset(root)?;
        for source in &other_outputs {
            self.reset(source_node(*source))?;
        }

        let inputs = match inputs {
            Some(inputs) => typed_root_inputs(&class_name, inputs)?,
            None => self.derived_root_inputs(root, &class_name)?,
        };
        debug!(
            class_name = %class_name,
            target_opset,
            inputs = inputs.len(),
            "materializing operator tree"
        );

        let dtype = if dtype == DType::Double {
            DType::Double
        } else {
            DType::Float
        };
        let mut container = ModelContainer::new(target_opset, dtype);
        let mut scope = Scope::new(
            class_name.clone(),
            target_opset,
            inputs.iter().map(|input| input.onnx_name.clone()),
        );
        for input in &inputs {
            container.add_input(input);
        }

        let operator = substitution.as_ref();
        let root_outputs = self.add_to(root, &mut scope, &mut container, operator)?;
        let mut produced: Vec<String> = root_outputs.iter().map(|v| v.onnx_name.clone()).collect();
        for source in &other_outputs {
            let extra = match *source {
                OutputSource::Node(id) => self.add_to(id, &mut scope, &mut container, operator)?,
                OutputSource::Item(item) => {
                    vec![item.add_to(self, &mut scope, &mut container, operator)?]
                }
            };
            produced.extend(extra.into_iter().map(|v| v.onnx_name));
        }

        let graph_outputs = match outputs.filter(|outputs| !outputs.is_empty()) {
            Some(outputs) => outputs,
            None => {
                let root_node = self.node(root)?;
                let wanted: HashSet<&str> = match root_node.output_names() {
                    Some(_) => root_node
                        .resolved_output_names()
                        .unwrap_or_default()
                        .iter()
                        .map(String::as_str)
                        .collect(),
                    None => produced.iter().map(String::as_str).collect(),
                };
                let inferred = infer_outputs(&container, &container.inputs, &container.initializers);
                if inferred.is_empty() {
                    return Err(AlgebraError::ShapeInference {
                        class_name,
                        detail: "no output could be inferred".to_string(),
                    });
                }
                inferred
                    .into_iter()
                    .filter(|variable| wanted.contains(variable.onnx_name.as_str()))
                    .collect()
            }
        };
        for output in &graph_outputs {
            container.add_output(output);
        }

        let graph = make_graph(
            container.node_protos(),
            class_name.clone(),
            container.inputs.clone(),
            container.outputs.clone(),
            container.initializers.clone(),
        );
        let mut model = make_model(graph);
        model.opset_import = container
            .domain_versions()
            .into_iter()
            .map(|(domain, version)| OperatorSetId { domain, version })
            .collect();
        let metadata = metadata.unwrap_or_else(model_metadata);
        model.ir_version = metadata.ir_version;
        model.producer_name = metadata.producer_name;
        model.producer_version = metadata.producer_version;
        model.domain = metadata.domain;
        model.model_version = metadata.model_version;

        debug!(
            class_name = %class_name,
            nodes = model.graph.nodes.len(),
            outputs = model.graph.outputs.len(),
            initializers = model.graph.initializers.len(),
            "materialized document"
        );
        Ok(model)
    }

    /// Root inputs derived from the free variables of the tree.
    fn derived_root_inputs(&self, root: NodeId, class_name: &str) -> AlgebraResult<Vec<Variable>> {
        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        for (name, ty) in self.enumerate_initial_types(root) {
            if !seen.insert(name.clone()) {
                continue;
            }
            match ty {
                InitialType::Declared(ty) => inputs.push(Variable::typed(name, ty)),
                InitialType::Constraint(_) | InitialType::Unknown => {
                    return Err(AlgebraError::UnknownInputType {
                        class_name: class_name.to_string(),
                        input: name,
                    })
                }
            }
        }
        Ok(inputs)
    }
}

fn source_node(source: OutputSource) -> NodeId {
    match source {
        OutputSource::Node(id) => id,
        OutputSource::Item(item) => item.node(),
    }
}

fn typed_root_inputs(class_name: &str, inputs: Vec<RootInput>) -> AlgebraResult<Vec<Variable>> {
    inputs
        .into_iter()
        .map(|input| match input {
            RootInput::Variable(variable) if variable.ty.is_some() => Ok(variable),
            RootInput::Variable(variable) => Err(AlgebraError::UnknownInputType {
                class_name: class_name.to_string(),
                input: variable.onnx_name,
            }),
            RootInput::Named(name, sample) => match guess_type(&sample) {
                Some(ty) => Ok(Variable::typed(name, ty)),
                None => Err(AlgebraError::UnknownInputType {
                    class_name: class_name.to_string(),
                    input: name,
                }),
            },
        })
        .collect()
}

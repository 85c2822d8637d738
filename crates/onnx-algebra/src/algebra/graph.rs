//! Arena of deferred operator nodes.
//!
//! Nodes are recorded by [`OpBuilder`] and referenced through [`NodeId`]. Nothing is emitted
//! until [`OperatorGraph::add_to`] walks a node and its upstream dependencies. Nodes may be
//! shared by several consumers; the arena guarantees each one is emitted once per
//! materialization pass and cached until [`OperatorGraph::reset`] clears it.

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::env::latest_domain_opset;
use crate::proto::{AttributeValue, TensorType, DEFAULT_DOMAIN};
use crate::schema::{find_op_schema, FormalParameter, OpSchema, SchemaSnapshot};

use super::container::ModelContainer;
use super::error::{AlgebraError, AlgebraResult, ArityKind};
use super::input::{classify_input, NodeInput, OpInput, OperatorVariable};
use super::scope::Scope;
use super::state::{GraphState, ResolvedInput};
use super::variable::{SubstitutionOperator, Variable};

/// Highest output index for which a positional `O<i>` name is produced.
const MAX_GENERATED_OUTPUT: usize = 1000;

pub(crate) type NodeInputs = SmallVec<[NodeInput; 4]>;

/// Handle to a node stored in an [`OperatorGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Selects a single output of a multi-output node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputItem {
    node: NodeId,
    index: usize,
}

impl OutputItem {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the selected output. The accessor exposes a single output, so only `i == 0`
    /// is valid.
    pub fn get_output(&self, graph: &OperatorGraph, i: usize) -> AlgebraResult<String> {
        if i != 0 {
            return Err(AlgebraError::OutputIndex {
                class_name: graph.node(self.node)?.class_name(),
                index: i,
            });
        }
        graph.get_output(self.node, self.index)
    }

    /// The selected output of the parent, once the parent has been emitted.
    pub fn outputs(&self, graph: &OperatorGraph) -> AlgebraResult<Vec<Variable>> {
        let outputs = graph.outputs(self.node)?;
        match outputs.get(self.index) {
            Some(variable) => Ok(vec![variable.clone()]),
            None => Err(AlgebraError::OutputIndex {
                class_name: graph.node(self.node)?.class_name(),
                index: self.index,
            }),
        }
    }

    /// Emits the parent node and returns the selected output.
    pub fn add_to(
        &self,
        graph: &mut OperatorGraph,
        scope: &mut Scope,
        container: &mut ModelContainer,
        operator: Option<&SubstitutionOperator>,
    ) -> AlgebraResult<Variable> {
        let outputs = graph.add_to(self.node, scope, container, operator)?;
        match outputs.get(self.index) {
            Some(variable) => Ok(variable.clone()),
            None => Err(AlgebraError::OutputIndex {
                class_name: graph.node(self.node)?.class_name(),
                index: self.index,
            }),
        }
    }
}

/// Declared name of an output slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputName {
    /// Written to the document as is.
    Fixed(String),
    /// Hint passed to the scope, which returns a unique name derived from it.
    Unique(String),
}

impl OutputName {
    pub fn unique(hint: impl Into<String>) -> Self {
        OutputName::Unique(hint.into())
    }

    /// The fixed name, or the hint of a unique name.
    pub fn as_str(&self) -> &str {
        match self {
            OutputName::Fixed(name) | OutputName::Unique(name) => name,
        }
    }

    fn parse(name: String) -> Self {
        match name.strip_prefix("u(").and_then(|rest| rest.strip_suffix(')')) {
            Some(hint) => OutputName::Unique(hint.to_string()),
            None => OutputName::Fixed(name),
        }
    }
}

impl From<&str> for OutputName {
    fn from(value: &str) -> Self {
        OutputName::parse(value.to_string())
    }
}

impl From<String> for OutputName {
    fn from(value: String) -> Self {
        OutputName::parse(value)
    }
}

impl From<&Variable> for OutputName {
    fn from(value: &Variable) -> Self {
        OutputName::Fixed(value.onnx_name.clone())
    }
}

impl From<Variable> for OutputName {
    fn from(value: Variable) -> Self {
        OutputName::Fixed(value.onnx_name)
    }
}

/// Emission state of a node within the current materialization pass.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Pending,
    /// Node was written to a container at `position`.
    Emitted { outputs: Vec<Variable>, position: usize },
}

/// Type information known for a free variable before materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialType {
    /// Concrete type carried by a typed variable reference.
    Declared(TensorType),
    /// Formal type constraint of the schema input the name is bound to, e.g. `T`.
    Constraint(&'static str),
    /// Untyped variable reference.
    Unknown,
}

/// Operator recorded in the arena.
#[derive(Debug, Clone)]
pub struct OperatorNode {
    schema: &'static OpSchema,
    snapshot: &'static SchemaSnapshot,
    op_version: u32,
    domain: Option<String>,
    inputs: Option<NodeInputs>,
    attributes: BTreeMap<String, AttributeValue>,
    output_names: Option<Vec<Option<OutputName>>>,
    name_prefix: Option<String>,
    resolved_outputs: Option<Vec<String>>,
    state: NodeState,
}

impl OperatorNode {
    pub fn schema(&self) -> &'static OpSchema {
        self.schema
    }

    pub fn class_name(&self) -> String {
        self.schema.class_name()
    }

    pub fn op_type(&self) -> &'static str {
        self.schema.op_type
    }

    /// Domain written into emitted nodes: the override given at construction, else the
    /// schema's domain.
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or(self.schema.domain)
    }

    pub fn op_version(&self) -> u32 {
        self.op_version
    }

    /// `since_version` of the snapshot selected for [`op_version`](Self::op_version).
    pub fn since_version(&self) -> u32 {
        self.snapshot.since_version
    }

    pub fn expected_inputs(&self) -> &'static [FormalParameter] {
        self.snapshot.expected_inputs
    }

    pub fn expected_outputs(&self) -> &'static [FormalParameter] {
        self.snapshot.expected_outputs
    }

    pub fn input_range(&self) -> (usize, usize) {
        self.snapshot.input_range
    }

    pub fn output_range(&self) -> (usize, usize) {
        self.snapshot.output_range
    }

    /// Normalized inputs; `None` for a variadic operator built without inputs.
    pub fn inputs(&self) -> Option<&[NodeInput]> {
        self.inputs.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn output_names(&self) -> Option<&[Option<OutputName>]> {
        self.output_names.as_deref()
    }

    pub fn name_prefix(&self) -> Option<&str> {
        self.name_prefix.as_deref()
    }

    /// Seed for node and output names: the assigned prefix, else the first two characters of
    /// the operator type.
    pub fn onnx_prefix(&self) -> String {
        match self.name_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => self.schema.op_type.chars().take(2).collect(),
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self.state, NodeState::Emitted { .. })
    }

    pub fn resolved_output_names(&self) -> Option<&[String]> {
        self.resolved_outputs.as_deref()
    }

    fn has_prefix(&self) -> bool {
        self.name_prefix.as_deref().is_some_and(|prefix| !prefix.is_empty())
    }

    fn expected_output_name(&self, index: usize) -> String {
        match self.snapshot.expected_outputs.get(index) {
            Some(param) => param.name.to_string(),
            None => format!("O{index}"),
        }
    }

    fn output_index_error(&self, index: usize) -> AlgebraError {
        AlgebraError::OutputIndex {
            class_name: self.class_name(),
            index,
        }
    }
}

/// Records a node. Obtained from [`OperatorGraph::op`].
#[must_use]
pub struct OpBuilder<'g> {
    graph: &'g mut OperatorGraph,
    op_type: String,
    schema_domain: String,
    inputs: Vec<OpInput>,
    op_version: Option<u32>,
    domain: Option<String>,
    output_names: Option<Vec<OutputName>>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl<'g> OpBuilder<'g> {
    pub fn input(mut self, input: impl Into<OpInput>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn inputs<I, T>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OpInput>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Operator version to build for. Defaults to the latest tested version of the domain.
    pub fn op_version(mut self, op_version: u32) -> Self {
        self.op_version = Some(op_version);
        self
    }

    /// Overrides the domain written into the emitted node.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn output_name(mut self, name: impl Into<OutputName>) -> Self {
        self.output_names.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    pub fn output_names<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OutputName>,
    {
        self.output_names
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Validates the node against its schema and stores it in the arena.
    pub fn build(self) -> AlgebraResult<NodeId> {
        let OpBuilder {
            graph,
            op_type,
            schema_domain,
            inputs,
            op_version,
            domain,
            output_names,
            attributes,
        } = self;

        let schema = find_op_schema(&op_type, &schema_domain).ok_or_else(|| {
            AlgebraError::UnknownOperator {
                op_type: op_type.clone(),
                domain: schema_domain.clone(),
            }
        })?;
        let class_name = schema.class_name();
        let op_version = op_version.unwrap_or_else(|| latest_domain_opset(schema.domain));
        let snapshot =
            schema
                .snapshot_for(op_version)
                .ok_or_else(|| AlgebraError::UnsupportedVersion {
                    class_name: class_name.clone(),
                    requested: op_version,
                    since_version: schema.since_version(),
                })?;

        let output_names = output_names.filter(|names| !names.is_empty());
        if schema.requires_output_names && output_names.is_none() {
            return Err(AlgebraError::InvalidOutputName {
                class_name,
                index: 0,
                reason: "output names must be specified".to_string(),
            });
        }
        let output_names = output_names
            .map(|names| validate_output_names(&class_name, snapshot, names))
            .transpose()?;
        let inputs = graph.normalize_inputs(&class_name, snapshot, inputs)?;

        let id = graph.push(OperatorNode {
            schema,
            snapshot,
            op_version,
            domain,
            inputs,
            attributes,
            output_names,
            name_prefix: None,
            resolved_outputs: None,
            state: NodeState::Pending,
        })?;
        debug!(node = %id, class_name = %class_name, op_version, "recorded operator");
        Ok(id)
    }
}

fn validate_output_names(
    class_name: &str,
    snapshot: &SchemaSnapshot,
    names: Vec<OutputName>,
) -> AlgebraResult<Vec<Option<OutputName>>> {
    let (min, max) = snapshot.output_range;
    if names.len() < min || names.len() > max {
        return Err(AlgebraError::Arity {
            class_name: class_name.to_string(),
            kind: ArityKind::Outputs,
            min,
            max,
            found: names.len(),
        });
    }
    for (index, name) in names.iter().enumerate() {
        let reason = if name.as_str().is_empty() {
            "name is empty"
        } else if matches!(name, OutputName::Fixed(_)) && names[..index].contains(name) {
            "name is used twice"
        } else {
            continue;
        };
        return Err(AlgebraError::InvalidOutputName {
            class_name: class_name.to_string(),
            index,
            reason: reason.to_string(),
        });
    }
    Ok(names.into_iter().map(Some).collect())
}

fn resolve_placeholder(
    class_name: &str,
    placeholder: &OperatorVariable,
    operator: Option<&SubstitutionOperator>,
) -> AlgebraResult<Variable> {
    let unresolved = |reason: String| AlgebraError::PlaceholderUnresolved {
        class_name: class_name.to_string(),
        placeholder: placeholder.to_string(),
        reason,
    };
    let operator =
        operator.ok_or_else(|| unresolved("no substitution operator was given".to_string()))?;
    if operator.inputs.is_empty() {
        return Err(unresolved(format!("operator '{}' has no inputs", operator.op_type)));
    }
    let name = placeholder
        .name
        .as_deref()
        .ok_or_else(|| unresolved("placeholder has no name".to_string()))?;
    operator.find_input(name).cloned().ok_or_else(|| {
        let known: Vec<&str> = operator.inputs.iter().map(|v| v.raw_name.as_str()).collect();
        unresolved(format!("no input named '{name}' among {known:?}"))
    })
}

/// Owns every node of one or more operator trees.
#[derive(Debug, Clone, Default)]
pub struct OperatorGraph {
    nodes: Vec<OperatorNode>,
}

impl OperatorGraph {
    pub fn new() -> Self {
        OperatorGraph::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Starts recording an operator of the default domain.
    pub fn op(&mut self, op_type: &str) -> OpBuilder<'_> {
        self.op_in_domain(op_type, DEFAULT_DOMAIN)
    }

    /// Starts recording an operator whose schema is registered under `domain`.
    pub fn op_in_domain(&mut self, op_type: &str, domain: &str) -> OpBuilder<'_> {
        OpBuilder {
            graph: self,
            op_type: op_type.to_string(),
            schema_domain: domain.to_string(),
            inputs: Vec::new(),
            op_version: None,
            domain: None,
            output_names: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> AlgebraResult<&OperatorNode> {
        self.nodes
            .get(id.index())
            .ok_or(AlgebraError::UnknownNode { id: id.0 })
    }

    fn node_mut(&mut self, id: NodeId) -> AlgebraResult<&mut OperatorNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or(AlgebraError::UnknownNode { id: id.0 })
    }

    fn push(&mut self, node: OperatorNode) -> AlgebraResult<NodeId> {
        let raw = u32::try_from(self.nodes.len()).map_err(|_| AlgebraError::UnknownNode {
            id: u32::MAX,
        })?;
        self.nodes.push(node);
        Ok(NodeId(raw))
    }

    fn normalize_inputs(
        &self,
        class_name: &str,
        snapshot: &SchemaSnapshot,
        raw: Vec<OpInput>,
    ) -> AlgebraResult<Option<NodeInputs>> {
        if raw.is_empty() {
            if !snapshot.has_fixed_inputs() {
                return Ok(None);
            }
            let defaults = snapshot
                .expected_inputs
                .iter()
                .map(|param| NodeInput::UnscopedName(param.name.to_string()))
                .collect();
            return Ok(Some(defaults));
        }

        let mut inputs = NodeInputs::with_capacity(raw.len());
        for input in raw {
            let input = classify_input(input, class_name)?;
            if let Some(upstream) = input.upstream() {
                self.node(upstream)?;
            }
            inputs.push(input);
        }
        let (min, max) = snapshot.input_range;
        if inputs.len() < min || inputs.len() > max {
            return Err(AlgebraError::Arity {
                class_name: class_name.to_string(),
                kind: ArityKind::Inputs,
                min,
                max,
                found: inputs.len(),
            });
        }
        Ok(Some(inputs))
    }

    /// Accessor selecting output `index` of `node`.
    pub fn item(&self, node: NodeId, index: usize) -> AlgebraResult<OutputItem> {
        let record = self.node(node)?;
        if index >= record.output_range().1 {
            return Err(record.output_index_error(index));
        }
        Ok(OutputItem { node, index })
    }

    /// Name of output `i`, as far as it is known without emitting the node.
    pub fn get_output(&self, id: NodeId, i: usize) -> AlgebraResult<String> {
        let node = self.node(id)?;
        if let Some(resolved) = &node.resolved_outputs {
            return resolved
                .get(i)
                .cloned()
                .ok_or_else(|| node.output_index_error(i));
        }
        if let Some(Some(name)) = node.output_names.as_ref().and_then(|names| names.get(i)) {
            return Ok(name.as_str().to_string());
        }
        if let Some(param) = node.expected_outputs().get(i) {
            return Ok(param.name.to_string());
        }
        if i < node.output_range().1 && i <= MAX_GENERATED_OUTPUT {
            return Ok(format!("O{i}"));
        }
        Err(node.output_index_error(i))
    }

    /// Declares the name of output slot `i`.
    ///
    /// Fails with `InconsistentRename` when the slot already carries a different resolved
    /// name, i.e. the node was emitted under the old name.
    pub fn update_name(&mut self, id: NodeId, i: usize, name: &str) -> AlgebraResult<()> {
        let node = self.node_mut(id)?;
        if i >= node.output_range().1 {
            return Err(node.output_index_error(i));
        }
        if let Some(previous) = node.resolved_outputs.as_ref().and_then(|names| names.get(i)) {
            if previous != name {
                return Err(AlgebraError::InconsistentRename {
                    class_name: node.class_name(),
                    index: i,
                    previous: previous.clone(),
                    requested: name.to_string(),
                });
            }
        }
        let names = node.output_names.get_or_insert_with(Vec::new);
        if names.len() <= i {
            names.resize(i + 1, None);
        }
        names[i] = Some(OutputName::Fixed(name.to_string()));
        Ok(())
    }

    /// Assigns `prefix` to `id` and every upstream node that has no prefix yet.
    ///
    /// Propagation stops at nodes that already carry a non-empty prefix, so the first setter
    /// wins for shared subtrees.
    pub fn set_name_prefix(&mut self, id: NodeId, prefix: &str) -> AlgebraResult<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current)?;
            if node.has_prefix() {
                continue;
            }
            trace!(node = %current, prefix, "assigning name prefix");
            node.name_prefix = Some(prefix.to_string());
            stack.extend(node.inputs.iter().flatten().filter_map(NodeInput::upstream));
        }
        Ok(())
    }

    /// Outputs produced by the last emission of `id`.
    pub fn outputs(&self, id: NodeId) -> AlgebraResult<&[Variable]> {
        let node = self.node(id)?;
        match &node.state {
            NodeState::Emitted { outputs, .. } => Ok(outputs),
            NodeState::Pending => Err(AlgebraError::NotMaterialized {
                class_name: node.class_name(),
            }),
        }
    }

    /// Clears resolved names and emission state of `root` and everything upstream of it.
    pub fn reset(&mut self, root: NodeId) -> AlgebraResult<()> {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current)?;
            if std::mem::replace(&mut visited[current.index()], true) {
                continue;
            }
            node.resolved_outputs = None;
            node.state = NodeState::Pending;
            stack.extend(node.inputs.iter().flatten().filter_map(NodeInput::upstream));
        }
        trace!(root = %root, "reset emission state");
        Ok(())
    }

    /// Emits `id` into `container`, after every node it depends on.
    ///
    /// Returns the node's outputs. A node emitted earlier in the same pass is not emitted
    /// again; its cached outputs are returned. `operator` resolves operator-variable
    /// placeholders.
    pub fn add_to(
        &mut self,
        id: NodeId,
        scope: &mut Scope,
        container: &mut ModelContainer,
        operator: Option<&SubstitutionOperator>,
    ) -> AlgebraResult<Vec<Variable>> {
        let node = self.node(id)?;
        if let NodeState::Emitted { outputs, .. } = &node.state {
            return Ok(outputs.clone());
        }
        let class_name = node.class_name();
        if node.schema.deprecated {
            return Err(AlgebraError::DeprecatedOperator { class_name });
        }
        if node.op_version < node.since_version() {
            return Err(AlgebraError::VersionSkew {
                class_name,
                op_version: node.op_version,
                required: node.since_version(),
            });
        }
        let inputs = match &node.inputs {
            Some(inputs) => inputs.clone(),
            None => {
                let (min, max) = node.input_range();
                return Err(AlgebraError::Arity {
                    class_name,
                    kind: ArityKind::Inputs,
                    min,
                    max,
                    found: 0,
                });
            }
        };

        let output_names = self.resolve_output_names(id, scope)?;

        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            match input {
                NodeInput::UnscopedName(name) => resolved.push(ResolvedInput::Name(name)),
                NodeInput::Variable(variable) => resolved.push(ResolvedInput::Variable(variable)),
                NodeInput::Constant(constant) => resolved.push(ResolvedInput::Constant(constant)),
                NodeInput::Placeholder(placeholder) => {
                    let variable = resolve_placeholder(&class_name, &placeholder, operator)?;
                    resolved.push(ResolvedInput::Variable(variable));
                }
                NodeInput::Node(upstream) => {
                    let outputs = self.add_to(upstream, scope, container, operator)?;
                    resolved.extend(outputs.into_iter().map(ResolvedInput::Variable));
                }
                NodeInput::Item(item) => {
                    let variable = item.add_to(self, scope, container, operator)?;
                    resolved.push(ResolvedInput::Variable(variable));
                }
            }
        }

        let node = self.node(id)?;
        let prefix = node.onnx_prefix();
        let state = GraphState::new(
            resolved,
            output_names,
            node.op_type(),
            node.domain(),
            node.op_version,
            &prefix,
            &node.attributes,
        );
        let (position, outputs) = state.run(scope, container);

        self.node_mut(id)?.state = NodeState::Emitted {
            outputs: outputs.clone(),
            position,
        };
        Ok(outputs)
    }

    /// Output names used for the next emission of `id`, resolving them on first use.
    fn resolve_output_names(&mut self, id: NodeId, scope: &mut Scope) -> AlgebraResult<Vec<String>> {
        let node = self.node(id)?;
        if let Some(resolved) = &node.resolved_outputs {
            return Ok(resolved.clone());
        }
        let prefix = node.onnx_prefix();
        let names = match &node.output_names {
            Some(declared) => declared
                .iter()
                .enumerate()
                .map(|(index, name)| match name {
                    Some(OutputName::Fixed(name)) => {
                        scope.reserve_variable_name(name);
                        name.clone()
                    }
                    Some(OutputName::Unique(hint)) => scope.get_unique_variable_name(hint),
                    None => scope.get_unique_variable_name(&format!(
                        "{prefix}_{}",
                        node.expected_output_name(index)
                    )),
                })
                .collect::<Vec<_>>(),
            None => node
                .expected_outputs()
                .iter()
                .map(|param| scope.get_unique_variable_name(&format!("{prefix}_{}", param.name)))
                .collect(),
        };
        self.node_mut(id)?.resolved_outputs = Some(names.clone());
        Ok(names)
    }

    /// Depth-first preorder walk from `root`, following upstream nodes and the parents of
    /// output accessors. Shared nodes are yielded once per path reaching them.
    pub fn enumerate_nodes(&self, root: NodeId) -> NodeIter<'_> {
        NodeIter {
            graph: self,
            stack: vec![root],
        }
    }

    /// Every `(node, input position)` whose input is a free variable of the tree.
    pub fn enumerate_variables(&self, root: NodeId) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        self.enumerate_nodes(root).flat_map(move |id| {
            self.nodes[id.index()]
                .inputs
                .iter()
                .flatten()
                .enumerate()
                .filter(|(_, input)| input.is_variable())
                .map(move |(position, _)| (id, position))
        })
    }

    /// Name and known type of every free variable of the tree.
    pub fn enumerate_initial_types(&self, root: NodeId) -> Vec<(String, InitialType)> {
        let mut found = Vec::new();
        for (id, position) in self.enumerate_variables(root) {
            let node = &self.nodes[id.index()];
            let Some(input) = node.inputs().and_then(|inputs| inputs.get(position)) else {
                continue;
            };
            match input {
                NodeInput::Variable(variable) => {
                    let ty = match &variable.ty {
                        Some(ty) => InitialType::Declared(ty.clone()),
                        None => InitialType::Unknown,
                    };
                    found.push((variable.onnx_name.clone(), ty));
                }
                NodeInput::UnscopedName(name) => {
                    let formal = node
                        .expected_inputs()
                        .get(position)
                        .or_else(|| node.expected_inputs().last());
                    let ty = match formal {
                        Some(param) => InitialType::Constraint(param.type_constraint),
                        None => InitialType::Unknown,
                    };
                    found.push((name.clone(), ty));
                }
                _ => {}
            }
        }
        found
    }
}

/// Iterator returned by [`OperatorGraph::enumerate_nodes`].
pub struct NodeIter<'g> {
    graph: &'g OperatorGraph,
    stack: Vec<NodeId>,
}

impl Iterator for NodeIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let id = self.stack.pop()?;
            let Some(node) = self.graph.nodes.get(id.index()) else {
                continue;
            };
            let upstream: SmallVec<[NodeId; 4]> =
                node.inputs.iter().flatten().filter_map(NodeInput::upstream).collect();
            self.stack.extend(upstream.into_iter().rev());
            return Some(id);
        }
    }
}

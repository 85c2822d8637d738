//! Static operator metadata consumed by the operator builder.
//!
//! Every operator type exposes the arity and formal parameters of its current schema plus an
//! optional table of older snapshots keyed by version. Building a node for an opset older than
//! the current schema selects the newest snapshot whose `since_version` does not exceed the
//! requested version.
//!
//! Schemas are registered at link time through [`OP_SCHEMA_SETS`]; downstream crates can add
//! their own domains the same way the built-in catalogs do.

use std::collections::BTreeMap;

mod onnx_ml_ops;
mod onnx_ops;
mod registry;

pub use registry::{find_op_schema, OP_SCHEMA_SETS};

/// Upper bound used by variadic inputs and outputs.
pub const VARIADIC_MAX: usize = 2_147_483_647;

/// Named formal input or output together with its type constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormalParameter {
    pub name: &'static str,
    pub type_constraint: &'static str,
}

pub const fn param(name: &'static str, type_constraint: &'static str) -> FormalParameter {
    FormalParameter {
        name,
        type_constraint,
    }
}

/// Shape of an operator schema at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub since_version: u32,
    pub expected_inputs: &'static [FormalParameter],
    pub expected_outputs: &'static [FormalParameter],
    pub input_range: (usize, usize),
    pub output_range: (usize, usize),
}

impl SchemaSnapshot {
    /// Snapshot whose arity is exactly the number of formal inputs and outputs.
    pub const fn new(
        since_version: u32,
        expected_inputs: &'static [FormalParameter],
        expected_outputs: &'static [FormalParameter],
    ) -> Self {
        SchemaSnapshot {
            since_version,
            expected_inputs,
            expected_outputs,
            input_range: (expected_inputs.len(), expected_inputs.len()),
            output_range: (expected_outputs.len(), expected_outputs.len()),
        }
    }

    pub const fn with_input_range(mut self, min: usize, max: usize) -> Self {
        self.input_range = (min, max);
        self
    }

    pub const fn with_output_range(mut self, min: usize, max: usize) -> Self {
        self.output_range = (min, max);
        self
    }

    /// Returns `true` when the number of inputs cannot vary.
    pub fn has_fixed_inputs(&self) -> bool {
        self.input_range.0 == self.input_range.1
    }
}

/// Complete metadata of one operator type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSchema {
    pub op_type: &'static str,
    pub domain: &'static str,
    pub current: SchemaSnapshot,
    /// Older snapshots keyed by their `since_version`; `None` when the operator never changed.
    pub past_versions: Option<BTreeMap<u32, SchemaSnapshot>>,
    pub deprecated: bool,
    /// Set for operators whose output count cannot be derived from the schema.
    pub requires_output_names: bool,
}

impl OpSchema {
    pub fn new(op_type: &'static str, domain: &'static str, current: SchemaSnapshot) -> Self {
        OpSchema {
            op_type,
            domain,
            current,
            past_versions: None,
            deprecated: false,
            requires_output_names: false,
        }
    }

    pub fn with_past_version(mut self, snapshot: SchemaSnapshot) -> Self {
        self.past_versions
            .get_or_insert_with(BTreeMap::new)
            .insert(snapshot.since_version, snapshot);
        self
    }

    pub fn mark_deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn mark_requires_output_names(mut self) -> Self {
        self.requires_output_names = true;
        self
    }

    /// Name of the operator class, used in diagnostics (`OnnxAdd`).
    pub fn class_name(&self) -> String {
        format!("Onnx{}", self.op_type)
    }

    pub fn since_version(&self) -> u32 {
        self.current.since_version
    }

    /// Newest past snapshot applicable at `op_version`.
    ///
    /// Returns `None` when there is no past-version table or when every snapshot is newer than
    /// the requested version.
    pub fn find_schema(&self, op_version: u32) -> Option<&SchemaSnapshot> {
        self.past_versions
            .as_ref()?
            .values()
            .filter(|snapshot| snapshot.since_version <= op_version)
            .max_by_key(|snapshot| snapshot.since_version)
    }

    /// Snapshot in effect at `op_version`: the current one when recent enough, else a past one.
    pub fn snapshot_for(&self, op_version: u32) -> Option<&SchemaSnapshot> {
        if op_version >= self.current.since_version {
            Some(&self.current)
        } else {
            self.find_schema(op_version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: &[FormalParameter] = &[param("X", "T")];
    const XK: &[FormalParameter] = &[param("X", "T"), param("K", "tensor(int64)")];
    const Y: &[FormalParameter] = &[param("Y", "T")];

    fn sample() -> OpSchema {
        OpSchema::new("Sample", "", SchemaSnapshot::new(11, XK, Y))
            .with_past_version(SchemaSnapshot::new(1, X, Y))
            .with_past_version(SchemaSnapshot::new(6, XK, Y))
    }

    #[test]
    fn find_schema_picks_newest_snapshot_not_above_request() {
        let schema = sample();
        assert_eq!(schema.find_schema(7).map(|s| s.since_version), Some(6));
        assert_eq!(schema.find_schema(5).map(|s| s.since_version), Some(1));
        assert_eq!(schema.find_schema(6).map(|s| s.since_version), Some(6));
    }

    #[test]
    fn find_schema_without_table_is_none() {
        let schema = OpSchema::new("Plain", "", SchemaSnapshot::new(3, X, Y));
        assert!(schema.find_schema(2).is_none());
        assert!(schema.snapshot_for(2).is_none());
        assert_eq!(schema.snapshot_for(3).map(|s| s.since_version), Some(3));
    }

    #[test]
    fn snapshot_ranges_follow_formal_parameters() {
        let snapshot = SchemaSnapshot::new(1, XK, Y).with_input_range(1, 2);
        assert_eq!(snapshot.input_range, (1, 2));
        assert_eq!(snapshot.output_range, (1, 1));
        assert!(!snapshot.has_fixed_inputs());
    }
}

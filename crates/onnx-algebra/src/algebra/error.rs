use std::fmt;

use thiserror::Error;

/// Which side of an operator an arity violation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityKind {
    Inputs,
    Outputs,
}

impl fmt::Display for ArityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityKind::Inputs => f.write_str("inputs"),
            ArityKind::Outputs => f.write_str("outputs"),
        }
    }
}

/// Construction and materialization failures.
///
/// None of these are recoverable: the container accumulated by a failed pass is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgebraError {
    #[error("unable to interpret the input of type {kind} in operator '{class_name}'")]
    UnsupportedInputType { class_name: String, kind: String },

    #[error("operator '{class_name}' expects a number of {kind} in [{min}, {max}] not {found}")]
    Arity {
        class_name: String,
        kind: ArityKind,
        min: usize,
        max: usize,
        found: usize,
    },

    #[error("invalid output name {index} for operator '{class_name}': {reason}")]
    InvalidOutputName {
        class_name: String,
        index: usize,
        reason: String,
    },

    #[error("operator '{class_name}': requested version {requested} < {since_version} schema version")]
    UnsupportedVersion {
        class_name: String,
        requested: u32,
        since_version: u32,
    },

    #[error("incompatible versions for node '{class_name}': op_version {op_version} vs required {required}")]
    VersionSkew {
        class_name: String,
        op_version: u32,
        required: u32,
    },

    #[error("node '{class_name}' is deprecated and cannot be materialized")]
    DeprecatedOperator { class_name: String },

    #[error("operator '{class_name}' requires op_set >= 9 (target_opset={target_opset}, domain='{domain}')")]
    OpsetTooLow {
        class_name: String,
        target_opset: u32,
        domain: String,
    },

    #[error("placeholder {placeholder} in operator '{class_name}' cannot be resolved: {reason}")]
    PlaceholderUnresolved {
        class_name: String,
        placeholder: String,
        reason: String,
    },

    #[error("type of input '{input}' for operator '{class_name}' is unknown, input types must be specified")]
    UnknownInputType { class_name: String, input: String },

    #[error("operator '{class_name}': cannot change output {index} from '{previous}' to '{requested}' after it was used")]
    InconsistentRename {
        class_name: String,
        index: usize,
        previous: String,
        requested: String,
    },

    #[error("no schema registered for operator '{op_type}' in domain '{domain}'")]
    UnknownOperator { op_type: String, domain: String },

    #[error("node id {id} does not belong to this graph")]
    UnknownNode { id: u32 },

    #[error("operator '{class_name}' was not materialized yet")]
    NotMaterialized { class_name: String },

    #[error("operator '{class_name}' has no output {index}")]
    OutputIndex { class_name: String, index: usize },

    #[error("shape inference failed for '{class_name}': {detail}")]
    ShapeInference { class_name: String, detail: String },
}

/// Convenience alias for results returned by the materialization core.
pub type AlgebraResult<T> = Result<T, AlgebraError>;

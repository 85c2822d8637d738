//! Operators of the `ai.onnx.ml` domain.

use linkme::distributed_slice;

use super::{param, FormalParameter, OpSchema, SchemaSnapshot, OP_SCHEMA_SETS};
use crate::proto::ML_DOMAIN;

const X: &[FormalParameter] = &[param("X", "T")];
const Y_FLOAT: &[FormalParameter] = &[param("Y", "tensor(float)")];
const Z: &[FormalParameter] = &[param("Z", "T")];
const FEATURES: &[FormalParameter] = &[param("X", "T"), param("Y", "tensor(int64)")];
const LABELS: &[FormalParameter] = &[param("Y", "T2")];
const ZIPPED: &[FormalParameter] = &[param("Z", "T")];
const ZIP_IN: &[FormalParameter] = &[param("X", "tensor(float)")];
const ENCODER_IN: &[FormalParameter] = &[param("X", "T1")];

fn ml_domain_schemas() -> Vec<OpSchema> {
    vec![
        OpSchema::new("Scaler", ML_DOMAIN, SchemaSnapshot::new(1, X, Y_FLOAT)),
        OpSchema::new("Normalizer", ML_DOMAIN, SchemaSnapshot::new(1, X, Y_FLOAT)),
        OpSchema::new("LinearRegressor", ML_DOMAIN, SchemaSnapshot::new(1, X, Y_FLOAT)),
        OpSchema::new("ZipMap", ML_DOMAIN, SchemaSnapshot::new(1, ZIP_IN, ZIPPED)),
        OpSchema::new(
            "ArrayFeatureExtractor",
            ML_DOMAIN,
            SchemaSnapshot::new(1, FEATURES, Z),
        ),
        OpSchema::new(
            "LabelEncoder",
            ML_DOMAIN,
            SchemaSnapshot::new(2, ENCODER_IN, LABELS),
        )
        .with_past_version(SchemaSnapshot::new(1, ENCODER_IN, LABELS)),
    ]
}

#[distributed_slice(OP_SCHEMA_SETS)]
static ML_DOMAIN_SCHEMAS: fn() -> Vec<OpSchema> = ml_domain_schemas;

//! Default-domain operator catalog.

use linkme::distributed_slice;

use super::{param, FormalParameter, OpSchema, SchemaSnapshot, OP_SCHEMA_SETS, VARIADIC_MAX};
use crate::proto::DEFAULT_DOMAIN;

const AB: &[FormalParameter] = &[param("A", "T"), param("B", "T")];
const C: &[FormalParameter] = &[param("C", "T1")];
const C_SAME: &[FormalParameter] = &[param("C", "T")];
const X: &[FormalParameter] = &[param("X", "T")];
const Y: &[FormalParameter] = &[param("Y", "T")];
const INPUT: &[FormalParameter] = &[param("input", "T")];
const OUTPUT: &[FormalParameter] = &[param("output", "T")];
const CAST_OUT: &[FormalParameter] = &[param("output", "T2")];
const GEMM_IN: &[FormalParameter] = &[param("A", "T"), param("B", "T"), param("C", "T")];
const GEMM_OUT: &[FormalParameter] = &[param("Y", "T")];
const DATA: &[FormalParameter] = &[param("data", "T")];
const RESHAPE_IN: &[FormalParameter] = &[param("data", "T"), param("shape", "tensor(int64)")];
const RESHAPED: &[FormalParameter] = &[param("reshaped", "T")];
const TRANSPOSED: &[FormalParameter] = &[param("transposed", "T")];
const REDUCED: &[FormalParameter] = &[param("reduced", "T")];
const ARG_REDUCED: &[FormalParameter] = &[param("reduced", "tensor(int64)")];
const SHAPE_OUT: &[FormalParameter] = &[param("shape", "T1")];
const CONCAT_IN: &[FormalParameter] = &[param("inputs", "T")];
const CONCAT_OUT: &[FormalParameter] = &[param("concat_result", "T")];
const SUM_IN: &[FormalParameter] = &[param("data_0", "T")];
const SUM_OUT: &[FormalParameter] = &[param("sum", "T")];
const MAX_OUT: &[FormalParameter] = &[param("max", "T")];
const MIN_OUT: &[FormalParameter] = &[param("min", "T")];
const MEAN_OUT: &[FormalParameter] = &[param("mean", "T")];
const TOPK_IN: &[FormalParameter] = &[param("X", "T"), param("K", "tensor(int64)")];
const TOPK_OUT: &[FormalParameter] = &[param("Values", "T"), param("Indices", "I")];
const SPLIT_IN: &[FormalParameter] = &[param("input", "T"), param("split", "T")];
const SPLIT_OUT: &[FormalParameter] = &[param("outputs", "T")];
const SCAN_IN: &[FormalParameter] = &[param("initial_state_and_scan_inputs", "V")];
const SCAN_OUT: &[FormalParameter] = &[param("final_state_and_scan_outputs", "V")];
const UPSAMPLE_IN: &[FormalParameter] = &[param("X", "T"), param("scales", "tensor(float)")];
const SCATTER_IN: &[FormalParameter] = &[
    param("data", "T"),
    param("indices", "Tind"),
    param("updates", "T"),
];
const NO_INPUTS: &[FormalParameter] = &[];
const POW_IN: &[FormalParameter] = &[param("X", "T"), param("Y", "T1")];
const POW_IN_V7: &[FormalParameter] = &[param("X", "T"), param("Y", "T")];
const POW_OUT: &[FormalParameter] = &[param("Z", "T")];
const CAST_IN: &[FormalParameter] = &[param("input", "T1")];
const MATMUL_OUT: &[FormalParameter] = &[param("Y", "T")];
const SCATTER_OUT: &[FormalParameter] = &[param("output", "T")];

fn binary_arithmetic(op_type: &'static str) -> OpSchema {
    OpSchema::new(op_type, DEFAULT_DOMAIN, SchemaSnapshot::new(7, AB, C_SAME))
        .with_past_version(SchemaSnapshot::new(6, AB, C_SAME))
        .with_past_version(SchemaSnapshot::new(1, AB, C_SAME))
}

fn comparison(op_type: &'static str, since_version: u32) -> OpSchema {
    OpSchema::new(op_type, DEFAULT_DOMAIN, SchemaSnapshot::new(since_version, AB, C))
        .with_past_version(SchemaSnapshot::new(7, AB, C))
        .with_past_version(SchemaSnapshot::new(1, AB, C))
}

fn unary(op_type: &'static str) -> OpSchema {
    OpSchema::new(op_type, DEFAULT_DOMAIN, SchemaSnapshot::new(6, X, Y))
        .with_past_version(SchemaSnapshot::new(1, X, Y))
}

fn reduction(op_type: &'static str, since_version: u32) -> OpSchema {
    let mut schema = OpSchema::new(
        op_type,
        DEFAULT_DOMAIN,
        SchemaSnapshot::new(since_version, DATA, REDUCED),
    )
    .with_past_version(SchemaSnapshot::new(1, DATA, REDUCED));
    if since_version > 11 {
        schema = schema.with_past_version(SchemaSnapshot::new(11, DATA, REDUCED));
    }
    schema
}

fn arg_reduction(op_type: &'static str) -> OpSchema {
    OpSchema::new(op_type, DEFAULT_DOMAIN, SchemaSnapshot::new(12, DATA, ARG_REDUCED))
        .with_past_version(SchemaSnapshot::new(11, DATA, ARG_REDUCED))
        .with_past_version(SchemaSnapshot::new(1, DATA, ARG_REDUCED))
}

fn variadic(
    op_type: &'static str,
    since_version: u32,
    outputs: &'static [FormalParameter],
    past: &[u32],
) -> OpSchema {
    let snapshot = |version| {
        SchemaSnapshot::new(version, SUM_IN, outputs).with_input_range(1, VARIADIC_MAX)
    };
    past.iter().fold(
        OpSchema::new(op_type, DEFAULT_DOMAIN, snapshot(since_version)),
        |schema, version| schema.with_past_version(snapshot(*version)),
    )
}

fn default_domain_schemas() -> Vec<OpSchema> {
    let mut schemas = vec![
        binary_arithmetic("Add"),
        binary_arithmetic("Sub"),
        binary_arithmetic("Mul"),
        binary_arithmetic("Div"),
        OpSchema::new("Pow", DEFAULT_DOMAIN, SchemaSnapshot::new(12, POW_IN, POW_OUT))
            .with_past_version(SchemaSnapshot::new(7, POW_IN_V7, POW_OUT)),
        comparison("Equal", 11),
        comparison("Less", 9),
        comparison("Greater", 9),
        OpSchema::new("Not", DEFAULT_DOMAIN, SchemaSnapshot::new(1, X, Y)),
        OpSchema::new("Identity", DEFAULT_DOMAIN, SchemaSnapshot::new(1, INPUT, OUTPUT)),
        OpSchema::new("Cast", DEFAULT_DOMAIN, SchemaSnapshot::new(9, CAST_IN, CAST_OUT))
            .with_past_version(SchemaSnapshot::new(6, CAST_IN, CAST_OUT))
            .with_past_version(SchemaSnapshot::new(1, CAST_IN, CAST_OUT)),
        OpSchema::new("MatMul", DEFAULT_DOMAIN, SchemaSnapshot::new(9, AB, MATMUL_OUT))
            .with_past_version(SchemaSnapshot::new(1, AB, MATMUL_OUT)),
        OpSchema::new(
            "Gemm",
            DEFAULT_DOMAIN,
            SchemaSnapshot::new(11, GEMM_IN, GEMM_OUT).with_input_range(2, 3),
        )
        .with_past_version(SchemaSnapshot::new(9, GEMM_IN, GEMM_OUT))
        .with_past_version(SchemaSnapshot::new(7, GEMM_IN, GEMM_OUT))
        .with_past_version(SchemaSnapshot::new(6, GEMM_IN, GEMM_OUT))
        .with_past_version(SchemaSnapshot::new(1, GEMM_IN, GEMM_OUT)),
        OpSchema::new("Transpose", DEFAULT_DOMAIN, SchemaSnapshot::new(1, DATA, TRANSPOSED)),
        OpSchema::new(
            "Concat",
            DEFAULT_DOMAIN,
            SchemaSnapshot::new(11, CONCAT_IN, CONCAT_OUT).with_input_range(1, VARIADIC_MAX),
        )
        .with_past_version(
            SchemaSnapshot::new(4, CONCAT_IN, CONCAT_OUT).with_input_range(1, VARIADIC_MAX),
        )
        .with_past_version(
            SchemaSnapshot::new(1, CONCAT_IN, CONCAT_OUT).with_input_range(1, VARIADIC_MAX),
        ),
        OpSchema::new("Reshape", DEFAULT_DOMAIN, SchemaSnapshot::new(5, RESHAPE_IN, RESHAPED))
            .with_past_version(SchemaSnapshot::new(1, DATA, RESHAPED)),
        OpSchema::new("Shape", DEFAULT_DOMAIN, SchemaSnapshot::new(1, DATA, SHAPE_OUT)),
        reduction("ReduceSum", 11),
        reduction("ReduceMean", 11),
        reduction("ReduceMax", 12),
        reduction("ReduceMin", 12),
        arg_reduction("ArgMax"),
        arg_reduction("ArgMin"),
        variadic("Sum", 8, SUM_OUT, &[6, 1]),
        variadic("Max", 12, MAX_OUT, &[8, 6, 1]),
        variadic("Min", 12, MIN_OUT, &[8, 6, 1]),
        variadic("Mean", 8, MEAN_OUT, &[6, 1]),
        OpSchema::new("TopK", DEFAULT_DOMAIN, SchemaSnapshot::new(11, TOPK_IN, TOPK_OUT))
            .with_past_version(SchemaSnapshot::new(10, TOPK_IN, TOPK_OUT))
            .with_past_version(SchemaSnapshot::new(1, X, TOPK_OUT)),
        OpSchema::new(
            "Split",
            DEFAULT_DOMAIN,
            SchemaSnapshot::new(11, SPLIT_IN, SPLIT_OUT)
                .with_input_range(1, 2)
                .with_output_range(1, VARIADIC_MAX),
        )
        .with_past_version(
            SchemaSnapshot::new(2, INPUT, SPLIT_OUT).with_output_range(1, VARIADIC_MAX),
        )
        .with_past_version(
            SchemaSnapshot::new(1, SPLIT_IN, SPLIT_OUT)
                .with_input_range(1, 2)
                .with_output_range(1, VARIADIC_MAX),
        ),
        OpSchema::new(
            "Scan",
            DEFAULT_DOMAIN,
            SchemaSnapshot::new(11, SCAN_IN, SCAN_OUT)
                .with_input_range(1, VARIADIC_MAX)
                .with_output_range(1, VARIADIC_MAX),
        )
        .with_past_version(
            SchemaSnapshot::new(9, SCAN_IN, SCAN_OUT)
                .with_input_range(1, VARIADIC_MAX)
                .with_output_range(1, VARIADIC_MAX),
        )
        .mark_requires_output_names(),
        OpSchema::new("Upsample", DEFAULT_DOMAIN, SchemaSnapshot::new(9, UPSAMPLE_IN, Y))
            .with_past_version(SchemaSnapshot::new(7, X, Y))
            .mark_deprecated(),
        OpSchema::new("Scatter", DEFAULT_DOMAIN, SchemaSnapshot::new(11, SCATTER_IN, SCATTER_OUT))
            .with_past_version(SchemaSnapshot::new(9, SCATTER_IN, SCATTER_OUT))
            .mark_deprecated(),
        OpSchema::new("Constant", DEFAULT_DOMAIN, SchemaSnapshot::new(12, NO_INPUTS, OUTPUT))
            .with_past_version(SchemaSnapshot::new(11, NO_INPUTS, OUTPUT))
            .with_past_version(SchemaSnapshot::new(9, NO_INPUTS, OUTPUT))
            .with_past_version(SchemaSnapshot::new(1, NO_INPUTS, OUTPUT)),
    ];
    for op_type in [
        "Abs", "Neg", "Exp", "Log", "Sqrt", "Relu", "Sigmoid", "Tanh", "Reciprocal", "Floor",
        "Ceil",
    ] {
        schemas.push(unary(op_type));
    }
    schemas
}

#[distributed_slice(OP_SCHEMA_SETS)]
static DEFAULT_DOMAIN_SCHEMAS: fn() -> Vec<OpSchema> = default_domain_schemas;

//! Process-wide defaults: target opsets and document metadata.

use std::env;
use std::sync::{OnceLock, RwLock};

use crate::proto::{DEFAULT_DOMAIN, IR_VERSION, ML_DOMAIN};

const DEFAULT_TARGET_OPSET: u32 = 12;
const ML_TARGET_OPSET: u32 = 2;

static TARGET_OPSET: OnceLock<u32> = OnceLock::new();
static MODEL_METADATA: OnceLock<RwLock<ModelMetadata>> = OnceLock::new();

fn parse_opset(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|version| *version > 0)
}

/// Latest default-domain opset this crate is tested against.
///
/// `ONNX_ALGEBRA_TARGET_OPSET` overrides the value for the whole process; it is read once.
pub fn latest_tested_opset() -> u32 {
    *TARGET_OPSET.get_or_init(|| match env::var("ONNX_ALGEBRA_TARGET_OPSET") {
        Ok(value) if !value.trim().is_empty() => {
            parse_opset(&value).unwrap_or(DEFAULT_TARGET_OPSET)
        }
        _ => DEFAULT_TARGET_OPSET,
    })
}

/// Default operator version used for nodes of `domain` when none is requested.
pub fn latest_domain_opset(domain: &str) -> u32 {
    match domain {
        DEFAULT_DOMAIN | "ai.onnx" => latest_tested_opset(),
        ML_DOMAIN => ML_TARGET_OPSET,
        _ => 1,
    }
}

/// Metadata stamped on every produced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub ir_version: i64,
    pub producer_name: String,
    pub producer_version: String,
    pub domain: String,
    pub model_version: i64,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        let domain = match env::var("ONNX_ALGEBRA_MODEL_DOMAIN") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => "ai.onnx".to_string(),
        };
        ModelMetadata {
            ir_version: IR_VERSION,
            producer_name: env!("CARGO_PKG_NAME").to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            domain,
            model_version: 0,
        }
    }
}

fn metadata_cell() -> &'static RwLock<ModelMetadata> {
    MODEL_METADATA.get_or_init(|| RwLock::new(ModelMetadata::default()))
}

/// Returns the current process-wide document metadata.
pub fn model_metadata() -> ModelMetadata {
    metadata_cell()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Replaces the process-wide document metadata used by subsequent conversions.
pub fn set_model_metadata(metadata: ModelMetadata) {
    let mut guard = metadata_cell()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = metadata;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_opset_rejects_zero_and_garbage() {
        assert_eq!(parse_opset(" 11 "), Some(11));
        assert_eq!(parse_opset("0"), None);
        assert_eq!(parse_opset("eleven"), None);
    }

    #[test]
    fn ml_domain_has_its_own_default() {
        assert_eq!(latest_domain_opset(ML_DOMAIN), ML_TARGET_OPSET);
        assert_eq!(latest_domain_opset("com.example"), 1);
        assert_eq!(latest_domain_opset(""), latest_tested_opset());
    }
}

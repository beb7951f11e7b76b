//! Quantization schemes and presets
//!
//! A scheme bundles the weight/input/output policies applied to a list of
//! target modules (layer names, layer types, or regular expressions — target
//! resolution happens in the model-loading collaborator, not here).

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::args::QuantizationArgs;

/// Policies for the weights, inputs and outputs of a set of target modules
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizationScheme {
    /// Modules the policies apply to
    pub targets: Vec<String>,
    /// Policy for layer weights
    #[serde(default)]
    pub weights: Option<QuantizationArgs>,
    /// Policy for layer inputs
    #[serde(default)]
    pub input_activations: Option<QuantizationArgs>,
    /// Policy for layer outputs
    #[serde(default)]
    pub output_activations: Option<QuantizationArgs>,
}

/// Resolve a preset scheme name (case-insensitive) for the given targets
pub fn preset_name_to_scheme(name: &str, targets: &[String]) -> Result<QuantizationScheme> {
    let scheme = match name.to_uppercase().as_str() {
        // 8-bit weights and activations
        "W8A8" => QuantizationScheme {
            targets: targets.to_vec(),
            weights: Some(QuantizationArgs::default()),
            input_activations: Some(QuantizationArgs {
                symmetric: false,
                ..Default::default()
            }),
            output_activations: None,
        },
        // 4-bit weights, full-precision activations
        "W4A16" => QuantizationScheme {
            targets: targets.to_vec(),
            weights: Some(QuantizationArgs {
                num_bits: 4,
                symmetric: false,
                ..Default::default()
            }),
            input_activations: None,
            output_activations: None,
        },
        other => {
            return Err(Error::Config(format!(
                "unknown preset scheme name {other}, available names: W8A8, W4A16"
            )))
        }
    };
    Ok(scheme)
}

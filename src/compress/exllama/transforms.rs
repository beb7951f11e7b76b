//! Ordered state-dict transformations for the exllama 4-bit format
//!
//! The translation runs a fixed pipeline of steps, each consuming the
//! previous step's output map and producing a fresh one:
//!
//! 1. `*.weight` -> `*.qweight`, bit-packed along the input-channel axis
//! 2. `*.scale` -> `*.qscale`, reshaped and packed the same way
//! 3. `*.zero_point` -> `*.qzero_point`, reshaped without packing
//! 4. a zero-filled `*.g_idx` per packed weight (single-group index)
//! 5. all remaining keys dropped (fake-quantization bookkeeping)
//!
//! Sibling keys are validated up front, so translation is all-or-nothing:
//! a weight without its scale or zero-point aborts before any output exists.

use crate::tensor::{NamedTensorMap, TensorData};
use crate::{Error, Result};

use super::pack::{pack_scale, pack_tensor, reshape_zero_point, CODES_PER_WORD};

pub const WEIGHT_SUFFIX: &str = ".weight";
pub const SCALE_SUFFIX: &str = ".scale";
pub const ZERO_POINT_SUFFIX: &str = ".zero_point";
pub const QWEIGHT_SUFFIX: &str = ".qweight";
pub const QSCALE_SUFFIX: &str = ".qscale";
pub const QZERO_POINT_SUFFIX: &str = ".qzero_point";
pub const GROUP_INDEX_SUFFIX: &str = ".g_idx";

/// Keys the packed format keeps; everything else is dropped in the last step
const PACKED_SUFFIXES: [&str; 4] = [
    QWEIGHT_SUFFIX,
    QSCALE_SUFFIX,
    QZERO_POINT_SUFFIX,
    GROUP_INDEX_SUFFIX,
];

/// One stage of the unpacked-to-packed translation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranslationStep {
    /// Rename and bit-pack weight tensors
    PackWeights,
    /// Rename, reshape and bit-pack scale tensors
    PackScales,
    /// Rename and reshape zero-point tensors
    ReshapeZeroPoints,
    /// Synthesize a trivial all-zero group index per packed weight
    AddGroupIndex,
    /// Drop keys with no place in the packed format
    DropUnmatched,
}

/// The fixed pipeline, in required order
pub const TRANSLATION_PIPELINE: [TranslationStep; 5] = [
    TranslationStep::PackWeights,
    TranslationStep::PackScales,
    TranslationStep::ReshapeZeroPoints,
    TranslationStep::AddGroupIndex,
    TranslationStep::DropUnmatched,
];

impl TranslationStep {
    /// Apply this step, producing a fresh map; total on its input
    pub fn apply(self, state: &NamedTensorMap) -> Result<NamedTensorMap> {
        match self {
            TranslationStep::PackWeights => {
                map_suffix(state, WEIGHT_SUFFIX, QWEIGHT_SUFFIX, pack_tensor)
            }
            TranslationStep::PackScales => {
                map_suffix(state, SCALE_SUFFIX, QSCALE_SUFFIX, pack_scale)
            }
            TranslationStep::ReshapeZeroPoints => map_suffix(
                state,
                ZERO_POINT_SUFFIX,
                QZERO_POINT_SUFFIX,
                reshape_zero_point,
            ),
            TranslationStep::AddGroupIndex => add_group_index(state),
            TranslationStep::DropUnmatched => Ok(drop_unmatched(state)),
        }
    }
}

/// Translate an unpacked 4-bit quantized state dict to the exllama layout
///
/// All-or-nothing: any malformed parameter group fails the whole call and no
/// partial map is returned.
pub fn translate_state_dict_to_exllama_4bit(
    model_state: NamedTensorMap,
) -> Result<NamedTensorMap> {
    validate_quantized_groups(&model_state)?;

    let mut state = model_state;
    for step in TRANSLATION_PIPELINE {
        state = step.apply(&state)?;
    }
    Ok(state)
}

/// Check every `<base>.weight` has well-shaped `scale`/`zero_point` siblings
fn validate_quantized_groups(state: &NamedTensorMap) -> Result<()> {
    for (name, weight) in state.iter() {
        let Some(base) = name.strip_suffix(WEIGHT_SUFFIX) else {
            continue;
        };

        let shape = weight.shape();
        if shape.len() != 2 || !shape[1].is_multiple_of(CODES_PER_WORD) {
            return Err(Error::MalformedState(format!(
                "weight {name} must have shape [rows, 8k], got {shape:?}"
            )));
        }

        let scale_key = format!("{base}{SCALE_SUFFIX}");
        let scale = state.get(&scale_key).ok_or_else(|| {
            Error::MalformedState(format!("{name} has no matching {scale_key}"))
        })?;
        if scale.shape().len() != 1 || !scale.len().is_multiple_of(CODES_PER_WORD) {
            return Err(Error::MalformedState(format!(
                "scale {scale_key} must have shape [8x], got {:?}",
                scale.shape()
            )));
        }

        let zero_point_key = format!("{base}{ZERO_POINT_SUFFIX}");
        let zero_point = state.get(&zero_point_key).ok_or_else(|| {
            Error::MalformedState(format!("{name} has no matching {zero_point_key}"))
        })?;
        if zero_point.shape().len() != 1 {
            return Err(Error::MalformedState(format!(
                "zero-point {zero_point_key} must have shape [x], got {:?}",
                zero_point.shape()
            )));
        }
    }
    Ok(())
}

/// Rename keys ending in `from` to end in `to`, transforming their tensors;
/// all other entries carry through unchanged
fn map_suffix<F>(
    state: &NamedTensorMap,
    from: &str,
    to: &str,
    transform: F,
) -> Result<NamedTensorMap>
where
    F: Fn(&TensorData) -> Result<TensorData>,
{
    let mut out = NamedTensorMap::new();
    for (name, tensor) in state.iter() {
        match name.strip_suffix(from) {
            Some(base) => out.insert(format!("{base}{to}"), transform(tensor)?),
            None => out.insert(name.clone(), tensor.clone()),
        }
    }
    Ok(out)
}

/// Append a zero-filled `g_idx` for every packed weight
///
/// Length equals the unpacked input-channel count; downstream kernels read
/// an all-zero index as a single quantization group.
fn add_group_index(state: &NamedTensorMap) -> Result<NamedTensorMap> {
    let mut out = NamedTensorMap::new();
    for (name, tensor) in state.iter() {
        out.insert(name.clone(), tensor.clone());
    }
    for (name, qweight) in state.iter() {
        if let Some(base) = name.strip_suffix(QWEIGHT_SUFFIX) {
            let packed_cols = qweight.shape().last().copied().unwrap_or(0);
            let num_channels = packed_cols * CODES_PER_WORD;
            let g_idx = TensorData::from_i32(vec![0; num_channels], vec![num_channels])?;
            out.insert(format!("{base}{GROUP_INDEX_SUFFIX}"), g_idx);
        }
    }
    Ok(out)
}

/// Keep only keys the packed format defines
fn drop_unmatched(state: &NamedTensorMap) -> NamedTensorMap {
    let mut out = NamedTensorMap::new();
    for (name, tensor) in state.iter() {
        if PACKED_SUFFIXES
            .iter()
            .any(|suffix| name.ends_with(suffix))
        {
            out.insert(name.clone(), tensor.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantized_group(base: &str, rows: usize, cols: usize) -> Vec<(String, TensorData)> {
        let weight: Vec<i32> = (0..rows * cols).map(|i| (i % 16) as i32 - 8).collect();
        let scales: Vec<i32> = (0..cols).map(|i| (i % 16) as i32).collect();
        let zero_points: Vec<i32> = vec![0; cols / CODES_PER_WORD];
        vec![
            (
                format!("{base}.weight"),
                TensorData::from_i32(weight, vec![rows, cols]).unwrap(),
            ),
            (
                format!("{base}.scale"),
                TensorData::from_i32(scales, vec![cols]).unwrap(),
            ),
            (
                format!("{base}.zero_point"),
                TensorData::from_i32(zero_points, vec![cols / CODES_PER_WORD]).unwrap(),
            ),
        ]
    }

    #[test]
    fn test_translation_renames_and_packs() {
        let state = NamedTensorMap::from(quantized_group("layer", 4, 16));
        let packed = translate_state_dict_to_exllama_4bit(state).unwrap();

        let qweight = packed.get("layer.qweight").unwrap();
        assert_eq!(qweight.shape(), &[4, 2]);

        let qscale = packed.get("layer.qscale").unwrap();
        assert_eq!(qscale.shape(), &[1, 2]);

        let qzero_point = packed.get("layer.qzero_point").unwrap();
        assert_eq!(qzero_point.shape(), &[1, 2]);

        let g_idx = packed.get("layer.g_idx").unwrap();
        assert_eq!(g_idx.shape(), &[16]);
        assert!(g_idx.as_i32().unwrap().iter().all(|&v| v == 0));

        assert!(!packed.contains_key("layer.weight"));
        assert!(!packed.contains_key("layer.scale"));
        assert!(!packed.contains_key("layer.zero_point"));
    }

    #[test]
    fn test_translation_drops_bookkeeping() {
        let mut entries = quantized_group("layer", 2, 8);
        entries.push((
            "layer.fake_quant_enabled".to_string(),
            TensorData::from_f32(vec![1.0], vec![1]).unwrap(),
        ));
        entries.push((
            "layer.observer_min".to_string(),
            TensorData::from_f32(vec![-1.0], vec![1]).unwrap(),
        ));

        let packed =
            translate_state_dict_to_exllama_4bit(NamedTensorMap::from(entries)).unwrap();
        assert!(!packed.contains_key("layer.fake_quant_enabled"));
        assert!(!packed.contains_key("layer.observer_min"));
        assert_eq!(packed.len(), 4);
    }

    #[test]
    fn test_weight_without_scale_aborts() {
        let weight: Vec<i32> = vec![1; 16];
        let mut state = NamedTensorMap::new();
        state.insert(
            "layer.weight",
            TensorData::from_i32(weight, vec![2, 8]).unwrap(),
        );

        let err = translate_state_dict_to_exllama_4bit(state);
        assert!(matches!(err, Err(Error::MalformedState(_))));
    }

    #[test]
    fn test_weight_without_zero_point_aborts() {
        let mut entries = quantized_group("layer", 2, 8);
        entries.retain(|(name, _)| name != "layer.zero_point");

        let err = translate_state_dict_to_exllama_4bit(NamedTensorMap::from(entries));
        assert!(matches!(err, Err(Error::MalformedState(_))));
    }

    #[test]
    fn test_bad_weight_shape_aborts() {
        let mut entries = quantized_group("layer", 2, 8);
        entries[0].1 = TensorData::from_i32(vec![1; 12], vec![2, 6]).unwrap();

        let err = translate_state_dict_to_exllama_4bit(NamedTensorMap::from(entries));
        assert!(matches!(err, Err(Error::MalformedState(_))));
    }

    #[test]
    fn test_multiple_layers_translate_together() {
        let mut entries = quantized_group("model.0", 2, 8);
        entries.extend(quantized_group("model.1", 4, 32));

        let packed =
            translate_state_dict_to_exllama_4bit(NamedTensorMap::from(entries)).unwrap();
        assert_eq!(packed.len(), 8);
        assert_eq!(packed.get("model.0.qweight").unwrap().shape(), &[2, 1]);
        assert_eq!(packed.get("model.1.qweight").unwrap().shape(), &[4, 4]);
        assert_eq!(packed.get("model.1.g_idx").unwrap().shape(), &[32]);
    }

    #[test]
    fn test_pipeline_order() {
        assert_eq!(
            TRANSLATION_PIPELINE,
            [
                TranslationStep::PackWeights,
                TranslationStep::PackScales,
                TranslationStep::ReshapeZeroPoints,
                TranslationStep::AddGroupIndex,
                TranslationStep::DropUnmatched,
            ]
        );
    }

    #[test]
    fn test_steps_are_total_on_unrelated_keys() {
        let mut state = NamedTensorMap::new();
        state.insert(
            "norm.gamma",
            TensorData::from_f32(vec![1.0, 1.0], vec![2]).unwrap(),
        );

        // Every step except the final drop passes unrelated keys through
        for step in &TRANSLATION_PIPELINE[..4] {
            let out = step.apply(&state).unwrap();
            assert!(out.contains_key("norm.gamma"));
        }
        let out = TranslationStep::DropUnmatched.apply(&state).unwrap();
        assert!(out.is_empty());
    }
}

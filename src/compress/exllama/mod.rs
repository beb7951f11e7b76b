//! Exllama 4-bit model compressor
//!
//! Converts a 4-bit quantized state dict into the dense bit-packed layout
//! the exllama kernel family loads: renamed keys, weights and scales packed
//! eight nibbles per u32, zero-points reshaped, and a trivial group index
//! added per layer.

mod pack;
mod transforms;

pub use pack::{
    pack_row, pack_scale, pack_tensor, reshape_zero_point, unpack_row, CODES_PER_WORD,
};
pub use transforms::{
    translate_state_dict_to_exllama_4bit, TranslationStep, GROUP_INDEX_SUFFIX,
    QSCALE_SUFFIX, QWEIGHT_SUFFIX, QZERO_POINT_SUFFIX, TRANSLATION_PIPELINE,
};

use crate::tensor::NamedTensorMap;
use crate::{Error, Result};

/// Compressor producing the exllama 4-bit wire format
#[derive(Clone, Copy, Debug, Default)]
pub struct Exllama4BitCompressor;

impl Exllama4BitCompressor {
    /// Translate an unpacked quantized state dict to the packed layout
    pub fn compress(&self, model_state: NamedTensorMap) -> Result<NamedTensorMap> {
        translate_state_dict_to_exllama_4bit(model_state)
    }

    /// Packed-to-dense inversion is a named gap in this format
    ///
    /// The bit layout has no validated dense consumer yet, so this fails
    /// loudly instead of returning a silently empty result.
    pub fn decompress(&self, _packed: &NamedTensorMap) -> Result<NamedTensorMap> {
        Err(Error::Unsupported(
            "exllama 4-bit decompression is not implemented".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorData;

    #[test]
    fn test_compress_entry_point() {
        let mut state = NamedTensorMap::new();
        state.insert(
            "layer.weight",
            TensorData::from_i32((0..16).map(|i| i % 16).collect(), vec![2, 8]).unwrap(),
        );
        state.insert(
            "layer.scale",
            TensorData::from_i32((0..8).collect(), vec![8]).unwrap(),
        );
        state.insert(
            "layer.zero_point",
            TensorData::from_i32(vec![0], vec![1]).unwrap(),
        );

        let packed = Exllama4BitCompressor.compress(state).unwrap();
        assert!(packed.contains_key("layer.qweight"));
        assert!(packed.contains_key("layer.g_idx"));
    }

    #[test]
    fn test_decompress_is_named_gap() {
        let err = Exllama4BitCompressor.decompress(&NamedTensorMap::new());
        assert!(matches!(err, Err(Error::Unsupported(_))));
    }
}

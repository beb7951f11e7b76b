//! 4-bit code packing into 32-bit storage words
//!
//! Eight consecutive 4-bit codes along the packed axis are concatenated,
//! least-significant nibble first, into one u32:
//! `word[i] = OR over j in 0..8 of (code[8i+j] & 0xF) << (4*j)`.
//!
//! Packing is a pure layout transform over linear memory: no value changes,
//! no rounding, no saturation. Saturation already happened upstream when the
//! codes were produced from real values.

use crate::tensor::TensorData;
use crate::{Error, Result};

/// Number of 4-bit codes stored per u32 word
pub const CODES_PER_WORD: usize = 8;

const NIBBLE_MASK: u32 = 0xF;

/// Pack a row of 4-bit codes into u32 words
///
/// The row length must be divisible by [`CODES_PER_WORD`]; only the low
/// nibble of each code is stored.
pub fn pack_row(codes: &[i32]) -> Result<Vec<u32>> {
    if !codes.len().is_multiple_of(CODES_PER_WORD) {
        return Err(Error::ShapeMismatch {
            expected: vec![codes.len().next_multiple_of(CODES_PER_WORD)],
            got: vec![codes.len()],
        });
    }
    let words = codes
        .chunks_exact(CODES_PER_WORD)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0u32, |word, (j, &code)| {
                word | ((code as u32 & NIBBLE_MASK) << (4 * j as u32))
            })
        })
        .collect();
    Ok(words)
}

/// Unpack u32 words back into 4-bit codes
///
/// With `signed` set, nibbles with the high bit set are sign-extended to the
/// range [-8, 7]; otherwise codes land in [0, 15]. Exact inverse of
/// [`pack_row`] for codes that fit 4 bits.
pub fn unpack_row(words: &[u32], signed: bool) -> Vec<i32> {
    words
        .iter()
        .flat_map(|&word| {
            (0..CODES_PER_WORD).map(move |j| {
                let nibble = ((word >> (4 * j as u32)) & NIBBLE_MASK) as i32;
                if signed && nibble & 0x8 != 0 {
                    nibble - 16
                } else {
                    nibble
                }
            })
        })
        .collect()
}

/// Pack an i32 code tensor along its last axis
///
/// A logical `[rows, 8k]` tensor becomes a `[rows, k]` u32 tensor. The last
/// axis length must be divisible by [`CODES_PER_WORD`].
pub fn pack_tensor(tensor: &TensorData) -> Result<TensorData> {
    let codes = tensor.as_i32().ok_or_else(|| {
        Error::MalformedState(format!(
            "expected i32 codes for packing, got {:?}",
            tensor.dtype()
        ))
    })?;
    let shape = tensor.shape();
    let last = shape.last().copied().ok_or_else(|| Error::ShapeMismatch {
        expected: vec![CODES_PER_WORD],
        got: vec![],
    })?;
    if !last.is_multiple_of(CODES_PER_WORD) {
        return Err(Error::ShapeMismatch {
            expected: vec![last.next_multiple_of(CODES_PER_WORD)],
            got: shape.to_vec(),
        });
    }

    // Rows are contiguous and individually divisible, so the whole buffer
    // packs in one pass.
    let words = pack_row(codes)?;
    let mut packed_shape = shape.to_vec();
    *packed_shape.last_mut().unwrap() = last / CODES_PER_WORD;
    TensorData::from_u32(words, packed_shape)
}

/// Pack a 1-d scale tensor: `[8x]` reshapes to `[1, 8x]` and packs to `[1, x]`
///
/// Scales in this format are stored at reduced precision and packed with the
/// same nibble scheme as weights.
pub fn pack_scale(tensor: &TensorData) -> Result<TensorData> {
    require_1d(tensor)?;
    let reshaped = tensor.reshape(vec![1, tensor.len()])?;
    pack_tensor(&reshaped)
}

/// Reshape a 1-d zero-point tensor `[x]` to `[1, x]` without bit packing
///
/// Zero-points remain at full per-group granularity in integer form.
pub fn reshape_zero_point(tensor: &TensorData) -> Result<TensorData> {
    require_1d(tensor)?;
    if tensor.as_i32().is_none() {
        return Err(Error::MalformedState(format!(
            "expected i32 zero-points, got {:?}",
            tensor.dtype()
        )));
    }
    tensor.reshape(vec![1, tensor.len()])
}

fn require_1d(tensor: &TensorData) -> Result<()> {
    if tensor.shape().len() != 1 {
        return Err(Error::ShapeMismatch {
            expected: vec![tensor.len()],
            got: tensor.shape().to_vec(),
        });
    }
    Ok(())
}

//! Representable quantization ranges

use crate::{Error, Result};

use super::args::{QuantizationArgs, QuantizationType};

/// Largest finite value representable in FP8 E4M3
pub const FP8_E4M3_MAX: f32 = 448.0;
/// Smallest finite value representable in FP8 E4M3
pub const FP8_E4M3_MIN: f32 = -448.0;

/// Compute the representable interval `(qmin, qmax)` for a policy
///
/// Integer targets cover the signed two's-complement range for `num_bits`;
/// the floating-point target is fixed to the FP8 E4M3 extremes and only
/// supports 8 bits. Pure; recomputed per call.
pub fn calculate_range(args: &QuantizationArgs) -> Result<(f32, f32)> {
    match args.kind {
        QuantizationType::Int => {
            let bit_range = 2f64.powi(args.num_bits as i32);
            let q_max = (bit_range / 2.0 - 1.0) as f32;
            let q_min = (-bit_range / 2.0) as f32;
            Ok((q_min, q_max))
        }
        QuantizationType::Float => {
            if args.num_bits != 8 {
                return Err(Error::Config(format!(
                    "floating point quantization is only supported for 8 bits, got {}",
                    args.num_bits
                )));
            }
            Ok((FP8_E4M3_MIN, FP8_E4M3_MAX))
        }
    }
}

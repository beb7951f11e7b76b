//! Quantization policies, ranges, parameters and observers
//!
//! Provides the math that maps observed value ranges to scale/zero-point
//! pairs under a quantization policy:
//! - Policy records with validation (`QuantizationArgs`)
//! - Representable ranges per bit-width and target kind
//! - Scale/zero-point calculation for tensor/channel/group axes
//! - Running and memoryless calibration observers
//! - Scheme presets (W8A8, W4A16)

mod args;
mod observer;
mod qparams;
mod range;
mod scheme;

pub use args::{
    parse_block_structure, ObserverKind, QuantizationArgs, QuantizationStrategy,
    QuantizationType,
};
pub use observer::{MemorylessObserver, MinMaxObserver, Observer};
pub use qparams::{
    calculate_qparams, min_max_per_channel, min_max_per_group, min_max_per_tensor,
    QuantizationParams, ZeroPoints,
};
pub use range::{calculate_range, FP8_E4M3_MAX, FP8_E4M3_MIN};
pub use scheme::{preset_name_to_scheme, QuantizationScheme};

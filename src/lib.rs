//! # Apretar: Quantization & Weight Repacking Library
//!
//! Apretar derives scale/zero-point quantization parameters from observed
//! value ranges and repacks 4-bit quantized state dicts into the dense
//! bit-packed layout consumed by the exllama kernel family.
//!
//! ## Architecture
//!
//! - **quant**: Quantization policies, ranges, qparam calculation, observers
//! - **compress**: Compression formats and the exllama 4-bit translator
//! - **tensor**: Dense tensors and ordered named-tensor maps
//! - **error**: Crate-wide error types

pub mod compress;
pub mod quant;
pub mod tensor;

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
pub use tensor::{NamedTensorMap, TensorData};

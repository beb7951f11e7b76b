//! Scale and zero-point calculation
//!
//! Maps observed value intervals to affine dequantization parameters:
//! `real ≈ (code - zero_point) * scale`. One interval per quantization axis
//! (tensor, channel, or group); intervals are widened to include zero before
//! derivation so that zero is always exactly representable.

use crate::{Error, Result};

use super::args::{QuantizationArgs, QuantizationType};
use super::range::calculate_range;

/// Floor applied to the float-target dynamic range before division
const FLOAT_RANGE_FLOOR: f32 = 1e-12;

/// Zero-point storage, integer or floating-point per the policy's target kind
#[derive(Clone, Debug, PartialEq)]
pub enum ZeroPoints {
    /// Integer codes, clamped into `[qmin, qmax]`
    Int(Vec<i32>),
    /// Floating-point codes (always zero for the FP8 target)
    Float(Vec<f32>),
}

impl ZeroPoints {
    /// Number of zero-points (one per quantization axis)
    pub fn len(&self) -> usize {
        match self {
            ZeroPoints::Int(v) => v.len(),
            ZeroPoints::Float(v) => v.len(),
        }
    }

    /// True if no zero-points are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as integer codes, if that is the storage type
    pub fn as_int(&self) -> Option<&[i32]> {
        match self {
            ZeroPoints::Int(v) => Some(v),
            ZeroPoints::Float(_) => None,
        }
    }
}

/// Derived quantization parameters, one scale/zero-point per axis
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizationParams {
    /// Scale factors, strictly positive
    pub scales: Vec<f32>,
    /// Zero-points in the storage type implied by the target kind
    pub zero_points: ZeroPoints,
}

impl QuantizationParams {
    /// Number of quantization axes covered
    pub fn num_axes(&self) -> usize {
        self.scales.len()
    }
}

/// Calculate scales and zero-points from observed per-axis intervals
///
/// `min_vals` and `max_vals` carry one entry per quantization axis and must
/// have equal length. Pure and stateless; safe to call concurrently.
pub fn calculate_qparams(
    min_vals: &[f32],
    max_vals: &[f32],
    args: &QuantizationArgs,
) -> Result<QuantizationParams> {
    if min_vals.len() != max_vals.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![min_vals.len()],
            got: vec![max_vals.len()],
        });
    }

    let (q_min, q_max) = calculate_range(args)?;
    let bit_range = q_max - q_min;
    let n = min_vals.len();

    let widened: Vec<(f32, f32)> = min_vals
        .iter()
        .zip(max_vals.iter())
        .map(|(&lo, &hi)| (lo.min(0.0), hi.max(0.0)))
        .collect();

    if args.kind == QuantizationType::Float {
        let scales = widened
            .iter()
            .map(|&(lo, hi)| (-lo).max(hi).max(FLOAT_RANGE_FLOOR) / q_max)
            .collect();
        return Ok(QuantizationParams {
            scales,
            zero_points: ZeroPoints::Float(vec![0.0; n]),
        });
    }

    if args.symmetric {
        let scales = widened
            .iter()
            .map(|&(lo, hi)| ((-lo).max(hi) / (bit_range / 2.0)).max(f32::EPSILON))
            .collect();
        Ok(QuantizationParams {
            scales,
            zero_points: ZeroPoints::Int(vec![0; n]),
        })
    } else {
        let mut scales = Vec::with_capacity(n);
        let mut zero_points = Vec::with_capacity(n);
        for (lo, hi) in widened {
            let scale = ((hi - lo) / bit_range).max(f32::EPSILON);
            let zero_point = (q_min - (lo / scale).round()).clamp(q_min, q_max) as i32;
            scales.push(scale);
            zero_points.push(zero_point);
        }
        Ok(QuantizationParams {
            scales,
            zero_points: ZeroPoints::Int(zero_points),
        })
    }
}

/// Per-tensor interval: a single (min, max) pair over all values
///
/// Empty input reduces to the degenerate `[0, 0]` interval.
pub fn min_max_per_tensor(values: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let (lo, hi) = fold_min_max(values);
    (vec![lo], vec![hi])
}

/// Per-channel intervals over a row-major `[channels, features]` layout
pub fn min_max_per_channel(
    values: &[f32],
    num_channels: usize,
) -> Result<(Vec<f32>, Vec<f32>)> {
    if num_channels == 0 || !values.len().is_multiple_of(num_channels) {
        return Err(Error::ShapeMismatch {
            expected: vec![num_channels],
            got: vec![values.len()],
        });
    }
    let features = values.len() / num_channels;
    let mut mins = Vec::with_capacity(num_channels);
    let mut maxs = Vec::with_capacity(num_channels);
    for chunk in values.chunks_exact(features) {
        let (lo, hi) = fold_min_max(chunk);
        mins.push(lo);
        maxs.push(hi);
    }
    Ok((mins, maxs))
}

/// Per-group intervals over consecutive groups of `group_size` values
///
/// The trailing group may be short when the length is not a multiple of the
/// group size.
pub fn min_max_per_group(values: &[f32], group_size: usize) -> Result<(Vec<f32>, Vec<f32>)> {
    if group_size == 0 {
        return Err(Error::Config(
            "group_size must be positive for per-group calibration".to_string(),
        ));
    }
    let num_groups = values.len().div_ceil(group_size);
    let mut mins = Vec::with_capacity(num_groups);
    let mut maxs = Vec::with_capacity(num_groups);
    for chunk in values.chunks(group_size) {
        let (lo, hi) = fold_min_max(chunk);
        mins.push(lo);
        maxs.push(hi);
    }
    Ok((mins, maxs))
}

fn fold_min_max(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

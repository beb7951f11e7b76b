//! Calibration observers
//!
//! Observers turn batches of observed values into quantization parameters.
//! Two kinds exist: the running min/max observer folds every batch into a
//! monotonically widening global interval, while the memoryless observer
//! discards history and recomputes from each batch alone. Policies resolve
//! to a concrete kind through [`QuantizationArgs::observer`].
//!
//! An observer instance is single-writer: `observe` takes `&mut self`.
//! Parallel calibration shards one observer per worker and folds the shards
//! together with [`MinMaxObserver::merge`], which is commutative and
//! associative.

use crate::Result;

use super::args::QuantizationArgs;
use super::qparams::{calculate_qparams, QuantizationParams};

/// Concrete observer bound to a quantization policy
#[derive(Clone, Debug)]
pub enum Observer {
    /// Running min/max accumulated across batches
    MinMax(MinMaxObserver),
    /// Recomputed per batch, no history
    Memoryless(MemorylessObserver),
}

impl Observer {
    /// Observe a batch and return the current quantization parameters
    pub fn observe(&mut self, batch: &[f32]) -> Result<QuantizationParams> {
        match self {
            Observer::MinMax(observer) => observer.observe(batch),
            Observer::Memoryless(observer) => observer.observe(batch),
        }
    }

    /// The policy this observer was built from
    pub fn args(&self) -> &QuantizationArgs {
        match self {
            Observer::MinMax(observer) => &observer.args,
            Observer::Memoryless(observer) => &observer.args,
        }
    }
}

/// Observer that tracks the overall min and max across all observed batches
///
/// The running interval only ever widens: after k batches it is a superset
/// of the interval after k-1 batches.
#[derive(Clone, Debug)]
pub struct MinMaxObserver {
    args: QuantizationArgs,
    min_val: f32,
    max_val: f32,
    counter: usize,
}

impl MinMaxObserver {
    /// Create a fresh observer with an empty interval
    pub fn new(args: QuantizationArgs) -> Self {
        Self {
            args,
            min_val: f32::INFINITY,
            max_val: f32::NEG_INFINITY,
            counter: 0,
        }
    }

    /// Fold a batch into the running interval and derive current qparams
    ///
    /// An empty batch leaves the interval unchanged but still counts as an
    /// observation.
    pub fn observe(&mut self, batch: &[f32]) -> Result<QuantizationParams> {
        if !batch.is_empty() {
            let (batch_min, batch_max) = batch
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            if self.counter == 0 {
                self.min_val = batch_min;
                self.max_val = batch_max;
            } else {
                self.min_val = self.min_val.min(batch_min);
                self.max_val = self.max_val.max(batch_max);
            }
        }
        self.counter += 1;
        self.current_qparams()
    }

    /// Derive qparams from the current running interval without observing
    pub fn current_qparams(&self) -> Result<QuantizationParams> {
        let (lo, hi) = self.interval();
        qparams_for_interval(lo, hi, &self.args)
    }

    /// Fold another shard's running interval into this one
    ///
    /// Elementwise min/max, so merge order does not matter. Sample counts
    /// add.
    pub fn merge(&mut self, other: &MinMaxObserver) {
        self.min_val = self.min_val.min(other.min_val);
        self.max_val = self.max_val.max(other.max_val);
        self.counter += other.counter;
    }

    /// The running interval, zero-width for a fresh observer
    pub fn interval(&self) -> (f32, f32) {
        if self.min_val.is_finite() && self.max_val.is_finite() {
            (self.min_val, self.max_val)
        } else {
            (0.0, 0.0)
        }
    }

    /// Number of `observe` calls so far (diagnostics only)
    pub fn sample_count(&self) -> usize {
        self.counter
    }

    /// Discard all accumulated state
    pub fn reset(&mut self) {
        self.min_val = f32::INFINITY;
        self.max_val = f32::NEG_INFINITY;
        self.counter = 0;
    }
}

/// Observer that derives qparams from each batch alone
///
/// Used by dynamic quantization, where parameters are recomputed per
/// inference call and must not depend on earlier samples.
#[derive(Clone, Debug)]
pub struct MemorylessObserver {
    args: QuantizationArgs,
}

impl MemorylessObserver {
    /// Create a memoryless observer for a policy
    pub fn new(args: QuantizationArgs) -> Self {
        Self { args }
    }

    /// Derive qparams from this batch only
    pub fn observe(&mut self, batch: &[f32]) -> Result<QuantizationParams> {
        let (lo, hi) = if batch.is_empty() {
            (0.0, 0.0)
        } else {
            batch
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
        };
        qparams_for_interval(lo, hi, &self.args)
    }
}

/// Derive qparams for a scalar interval, correcting degenerate ranges
///
/// A zero-width observed range yields a scale of exactly 1 so that
/// dequantization stays well-defined for never-activated layers.
fn qparams_for_interval(lo: f32, hi: f32, args: &QuantizationArgs) -> Result<QuantizationParams> {
    let (lo, hi) = (lo.min(0.0), hi.max(0.0));
    let mut params = calculate_qparams(&[lo], &[hi], args)?;
    if hi - lo == 0.0 {
        for scale in &mut params.scales {
            *scale = 1.0;
        }
    }
    Ok(params)
}

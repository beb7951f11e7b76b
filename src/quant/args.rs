//! User-facing quantization policy arguments
//!
//! A `QuantizationArgs` record describes how one set of weights or
//! activations maps to reduced-precision codes. Records are validated at
//! construction time; compute paths assume a validated policy and never
//! re-raise configuration errors.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::observer::{MemorylessObserver, MinMaxObserver, Observer};

/// Numeric target of quantization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationType {
    /// Signed two's-complement integer codes
    #[default]
    Int,
    /// 8-bit floating-point (E4M3) codes
    Float,
}

/// Scope of each scale/zero-point pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationStrategy {
    /// One pair for the entire tensor
    #[default]
    Tensor,
    /// One pair per output channel
    Channel,
    /// One pair per fixed-size group of input channels
    Group,
    /// One pair per 2d block
    Block,
}

/// Observer implementation a policy binds to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObserverKind {
    /// Running min/max accumulated across calibration batches
    #[default]
    MinMax,
    /// Recomputed from each batch alone, no history
    Memoryless,
}

/// Quantization policy for one group of weights or activations
///
/// `dynamic` selects per-call recomputation of quantization parameters at
/// inference time; it changes which observer the policy binds to, never the
/// qparam math itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationArgs {
    /// Quantization bit depth
    pub num_bits: u32,
    /// Target numeric kind, integer or floating point
    pub kind: QuantizationType,
    /// Whether the zero-point is fixed at the representable midpoint
    pub symmetric: bool,
    /// Scope of each scale/zero-point pair
    pub strategy: QuantizationStrategy,
    /// Group length for the group strategy; -1 selects the channel strategy
    pub group_size: Option<i64>,
    /// 2d block shape for the block strategy, e.g. "8x16"
    pub block_structure: Option<String>,
    /// Recompute parameters per inference call instead of calibrating once
    pub dynamic: bool,
    /// Observer used to compute scale and zero-point
    pub observer: ObserverKind,
}

impl Default for QuantizationArgs {
    fn default() -> Self {
        Self {
            num_bits: 8,
            kind: QuantizationType::Int,
            symmetric: true,
            strategy: QuantizationStrategy::Tensor,
            group_size: None,
            block_structure: None,
            dynamic: false,
            observer: ObserverKind::MinMax,
        }
    }
}

impl QuantizationArgs {
    /// Normalize and validate the record, consuming it builder-style
    ///
    /// `group_size > 0` forces the group strategy and `group_size == -1`
    /// forces the channel strategy; an explicit conflicting strategy or any
    /// other group size is a configuration error.
    pub fn validated(mut self) -> Result<Self> {
        if self.num_bits == 0 {
            return Err(Error::Config("num_bits must be positive".to_string()));
        }
        if self.kind == QuantizationType::Float && self.num_bits != 8 {
            return Err(Error::Config(format!(
                "floating point quantization is only supported for 8 bits, got {}",
                self.num_bits
            )));
        }

        match self.group_size {
            Some(size) if size > 0 => {
                if self.strategy != QuantizationStrategy::Group
                    && self.strategy != QuantizationStrategy::Tensor
                {
                    return Err(Error::Config(format!(
                        "group_size={size} conflicts with strategy {:?}; \
                         group_size > 0 requires the group strategy",
                        self.strategy
                    )));
                }
                self.strategy = QuantizationStrategy::Group;
            }
            Some(-1) => {
                if self.strategy != QuantizationStrategy::Channel
                    && self.strategy != QuantizationStrategy::Tensor
                {
                    return Err(Error::Config(format!(
                        "group_size=-1 conflicts with strategy {:?}; \
                         group_size = -1 requires the channel strategy",
                        self.strategy
                    )));
                }
                self.strategy = QuantizationStrategy::Channel;
            }
            Some(size) => {
                return Err(Error::Config(format!(
                    "invalid group_size={size}; use group_size > 0 for the group \
                     strategy or group_size = -1 for the channel strategy"
                )));
            }
            None => {
                if self.strategy == QuantizationStrategy::Group {
                    return Err(Error::Config(
                        "the group strategy requires a positive group_size".to_string(),
                    ));
                }
            }
        }

        if let Some(structure) = &self.block_structure {
            parse_block_structure(structure)?;
            if self.strategy != QuantizationStrategy::Block {
                return Err(Error::Config(format!(
                    "block_structure={structure} requires the block strategy, \
                     got {:?}",
                    self.strategy
                )));
            }
        }

        Ok(self)
    }

    /// Build the observer this policy binds to
    ///
    /// A dynamic policy must never accumulate state across samples, so the
    /// running min/max kind is replaced by the memoryless one.
    pub fn observer(&self) -> Observer {
        let kind = if self.dynamic {
            ObserverKind::Memoryless
        } else {
            self.observer
        };
        match kind {
            ObserverKind::MinMax => Observer::MinMax(MinMaxObserver::new(self.clone())),
            ObserverKind::Memoryless => {
                Observer::Memoryless(MemorylessObserver::new(self.clone()))
            }
        }
    }
}

/// Parse a block structure string of the form "NxM" into (rows, cols)
pub fn parse_block_structure(structure: &str) -> Result<(usize, usize)> {
    let invalid = || {
        Error::Config(format!(
            "invalid block_structure '{structure}'; expected the form '2x4', '8x16', ..."
        ))
    };
    let (rows, cols) = structure.split_once('x').ok_or_else(invalid)?;
    let rows: usize = rows.parse().map_err(|_| invalid())?;
    let cols: usize = cols.parse().map_err(|_| invalid())?;
    if rows == 0 || cols == 0 {
        return Err(invalid());
    }
    Ok((rows, cols))
}

//! Compression formats and dispatch
//!
//! Formats are a closed sum resolved through an explicit match rather than a
//! runtime registry; external config layers address them by their string
//! names (`"dense"`, `"exllama-4bit"`).

pub mod exllama;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tensor::NamedTensorMap;
use crate::{Error, Result};

pub use exllama::Exllama4BitCompressor;

/// Known compression formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionFormat {
    /// Uncompressed pass-through
    #[serde(rename = "dense")]
    Dense,
    /// Exllama-compatible 4-bit packed layout
    #[serde(rename = "exllama-4bit")]
    Exllama4Bit,
}

impl CompressionFormat {
    /// The format's wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionFormat::Dense => "dense",
            CompressionFormat::Exllama4Bit => "exllama-4bit",
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dense" => Ok(CompressionFormat::Dense),
            "exllama-4bit" => Ok(CompressionFormat::Exllama4Bit),
            other => Err(Error::Config(format!(
                "unknown compression format '{other}'"
            ))),
        }
    }
}

/// Model compressor, one variant per format
#[derive(Clone, Copy, Debug)]
pub enum Compressor {
    /// Identity: the dense format stores parameters as-is
    Dense,
    /// Exllama 4-bit repacking
    Exllama4Bit(Exllama4BitCompressor),
}

impl Compressor {
    /// Build the compressor for a format
    pub fn from_format(format: CompressionFormat) -> Self {
        match format {
            CompressionFormat::Dense => Compressor::Dense,
            CompressionFormat::Exllama4Bit => {
                Compressor::Exllama4Bit(Exllama4BitCompressor)
            }
        }
    }

    /// The format this compressor produces
    pub fn format(&self) -> CompressionFormat {
        match self {
            Compressor::Dense => CompressionFormat::Dense,
            Compressor::Exllama4Bit(_) => CompressionFormat::Exllama4Bit,
        }
    }

    /// Compress a model state dict into this format
    pub fn compress(&self, model_state: NamedTensorMap) -> Result<NamedTensorMap> {
        match self {
            Compressor::Dense => Ok(model_state),
            Compressor::Exllama4Bit(compressor) => compressor.compress(model_state),
        }
    }

    /// Recover a dense state dict from a compressed one, where supported
    pub fn decompress(&self, compressed: NamedTensorMap) -> Result<NamedTensorMap> {
        match self {
            Compressor::Dense => Ok(compressed),
            Compressor::Exllama4Bit(compressor) => compressor.decompress(&compressed),
        }
    }
}

//! Dense tensors and ordered named-tensor maps
//!
//! State dicts are exchanged between compression stages as ordered maps from
//! parameter name to a flat, row-major buffer with an explicit shape. Element
//! types are a closed sum: f32 for real-valued parameters, i32 for quantized
//! codes and index tensors, u32 for packed storage words.

use crate::{Error, Result};

/// Element type of a tensor buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dtype {
    /// 32-bit float (real-valued parameters)
    F32,
    /// 32-bit signed integer (quantized codes, group indices)
    I32,
    /// 32-bit unsigned integer (packed storage words)
    U32,
}

/// Flat element buffer, one variant per supported dtype
#[derive(Clone, Debug, PartialEq)]
pub enum Elements {
    F32(Vec<f32>),
    I32(Vec<i32>),
    U32(Vec<u32>),
}

impl Elements {
    fn len(&self) -> usize {
        match self {
            Elements::F32(v) => v.len(),
            Elements::I32(v) => v.len(),
            Elements::U32(v) => v.len(),
        }
    }
}

/// Dense row-major tensor: flat buffer plus shape
#[derive(Clone, Debug, PartialEq)]
pub struct TensorData {
    elements: Elements,
    shape: Vec<usize>,
}

impl TensorData {
    /// Create an f32 tensor, checking that the buffer matches the shape
    pub fn from_f32(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        Self::new(Elements::F32(data), shape)
    }

    /// Create an i32 tensor, checking that the buffer matches the shape
    pub fn from_i32(data: Vec<i32>, shape: Vec<usize>) -> Result<Self> {
        Self::new(Elements::I32(data), shape)
    }

    /// Create a u32 tensor, checking that the buffer matches the shape
    pub fn from_u32(data: Vec<u32>, shape: Vec<usize>) -> Result<Self> {
        Self::new(Elements::U32(data), shape)
    }

    fn new(elements: Elements, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if elements.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: shape,
                got: vec![elements.len()],
            });
        }
        Ok(Self { elements, shape })
    }

    /// Tensor shape (row-major)
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.elements.len() == 0
    }

    /// Element type
    pub fn dtype(&self) -> Dtype {
        match self.elements {
            Elements::F32(_) => Dtype::F32,
            Elements::I32(_) => Dtype::I32,
            Elements::U32(_) => Dtype::U32,
        }
    }

    /// Borrow the buffer as f32 values, if that is the dtype
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.elements {
            Elements::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the buffer as i32 values, if that is the dtype
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.elements {
            Elements::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the buffer as u32 values, if that is the dtype
    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.elements {
            Elements::U32(v) => Some(v),
            _ => None,
        }
    }

    /// Return the same buffer under a new shape with equal element count
    pub fn reshape(&self, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.len() {
            return Err(Error::ShapeMismatch {
                expected: shape,
                got: self.shape.clone(),
            });
        }
        Ok(Self {
            elements: self.elements.clone(),
            shape,
        })
    }
}

/// Ordered mapping from parameter name to tensor
///
/// Insertion order is preserved; each pipeline stage consumes one map and
/// produces a fresh one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedTensorMap {
    entries: Vec<(String, TensorData)>,
}

impl NamedTensorMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor, replacing any existing entry with the same name
    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorData) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = tensor;
        } else {
            self.entries.push((name, tensor));
        }
    }

    /// Get tensor by name
    pub fn get(&self, name: &str) -> Option<&TensorData> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// True if an entry with this name exists
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TensorData)> {
        self.entries.iter().map(|(n, t)| (n, t))
    }

    /// Iterate entry names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(n, _)| n)
    }
}

impl From<Vec<(String, TensorData)>> for NamedTensorMap {
    fn from(entries: Vec<(String, TensorData)>) -> Self {
        let mut map = Self::new();
        for (name, tensor) in entries {
            map.insert(name, tensor);
        }
        map
    }
}

impl IntoIterator for NamedTensorMap {
    type Item = (String, TensorData);
    type IntoIter = std::vec::IntoIter<(String, TensorData)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

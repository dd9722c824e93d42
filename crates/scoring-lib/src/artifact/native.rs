//! Native boosted-tree binary codec
//!
//! Layout (little-endian):
//!
//! ```text
//! magic      "CBMF"
//! version    u16 (= 1)
//! n_features u32, then n_features x (u32 length, UTF-8 bytes)
//! bias       f64
//! n_trees    u32, then per tree:
//!   depth    u32
//!   splits   depth x (u32 feature_index, f64 threshold)
//!   leaves   2^depth x f64
//! ```

use crate::model::{ObliviousTree, Split, TreeEnsemble, MAX_TREE_DEPTH};
use thiserror::Error;

/// Leading bytes of every native artifact
pub const MAGIC: &[u8; 4] = b"CBMF";

/// Only layout version understood by this decoder
pub const FORMAT_VERSION: u16 = 1;

/// Upper bound on any length prefix, guards allocations on corrupt input
const MAX_LENGTH_PREFIX: usize = 1 << 24;

/// Native decode failures
///
/// `BadDescriptor` means the bytes are not a native artifact at all, which is
/// the only case where the loader tries another format.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeDecodeError {
    #[error("bad descriptor: expected magic {expected:?}, found {found:?}")]
    BadDescriptor { expected: Vec<u8>, found: Vec<u8> },

    #[error("unsupported native format version {0}")]
    UnsupportedVersion(u16),

    #[error("truncated at byte {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid UTF-8 in feature name {index}")]
    InvalidFeatureName { index: usize },

    #[error("length prefix {0} exceeds limit")]
    LengthOverflow(usize),

    #[error("malformed ensemble: {0}")]
    Malformed(String),

    #[error("{0} trailing bytes after ensemble")]
    TrailingBytes(usize),
}

impl NativeDecodeError {
    pub fn is_bad_descriptor(&self) -> bool {
        matches!(self, NativeDecodeError::BadDescriptor { .. })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], NativeDecodeError> {
        let remaining = self.bytes.len() - self.offset;
        if len > remaining {
            return Err(NativeDecodeError::Truncated {
                offset: self.offset,
                needed: len - remaining,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], NativeDecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u16(&mut self) -> Result<u16, NativeDecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, NativeDecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, NativeDecodeError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn length(&mut self) -> Result<usize, NativeDecodeError> {
        let len = self.u32()? as usize;
        if len > MAX_LENGTH_PREFIX {
            return Err(NativeDecodeError::LengthOverflow(len));
        }
        Ok(len)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}

/// Decode a native artifact into a tree ensemble
pub fn decode(bytes: &[u8]) -> Result<TreeEnsemble, NativeDecodeError> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NativeDecodeError::BadDescriptor {
            expected: MAGIC.to_vec(),
            found: bytes.iter().take(MAGIC.len()).copied().collect(),
        });
    }

    let mut reader = Reader::new(&bytes[MAGIC.len()..]);
    let version = reader.u16()?;
    if version != FORMAT_VERSION {
        return Err(NativeDecodeError::UnsupportedVersion(version));
    }

    let n_features = reader.length()?;
    let mut feature_names = Vec::with_capacity(n_features.min(1024));
    for index in 0..n_features {
        let len = reader.length()?;
        let raw = reader.take(len)?;
        let name = std::str::from_utf8(raw)
            .map_err(|_| NativeDecodeError::InvalidFeatureName { index })?;
        feature_names.push(name.to_string());
    }

    let bias = reader.f64()?;

    let n_trees = reader.length()?;
    let mut trees = Vec::with_capacity(n_trees.min(1024));
    for tree_index in 0..n_trees {
        let depth = reader.length()?;
        if depth > MAX_TREE_DEPTH {
            return Err(NativeDecodeError::Malformed(format!(
                "tree {} has depth {} (max {})",
                tree_index, depth, MAX_TREE_DEPTH
            )));
        }
        let mut splits = Vec::with_capacity(depth);
        for _ in 0..depth {
            let feature_index = reader.u32()? as usize;
            let threshold = reader.f64()?;
            splits.push(Split {
                feature_index,
                threshold,
            });
        }
        let leaf_values = (0..1usize << depth)
            .map(|_| reader.f64())
            .collect::<Result<Vec<_>, _>>()?;
        trees.push(ObliviousTree {
            splits,
            leaf_values,
        });
    }

    if reader.remaining() > 0 {
        return Err(NativeDecodeError::TrailingBytes(reader.remaining()));
    }

    let ensemble = TreeEnsemble {
        feature_names,
        bias,
        trees,
    };
    ensemble
        .validate()
        .map_err(|e| NativeDecodeError::Malformed(e.to_string()))?;
    Ok(ensemble)
}

/// Encode a tree ensemble in the native layout
pub fn encode(ensemble: &TreeEnsemble) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(ensemble.feature_names.len() as u32).to_le_bytes());
    for name in &ensemble.feature_names {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }
    out.extend_from_slice(&ensemble.bias.to_le_bytes());
    out.extend_from_slice(&(ensemble.trees.len() as u32).to_le_bytes());
    for tree in &ensemble.trees {
        out.extend_from_slice(&(tree.splits.len() as u32).to_le_bytes());
        for split in &tree.splits {
            out.extend_from_slice(&(split.feature_index as u32).to_le_bytes());
            out.extend_from_slice(&split.threshold.to_le_bytes());
        }
        for leaf in &tree.leaf_values {
            out.extend_from_slice(&leaf.to_le_bytes());
        }
    }
    out
}

impl TreeEnsemble {
    /// Serialize into the native artifact layout
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self)
    }
}

//! Model artifacts: location, decoding and caching
//!
//! This module provides:
//! - Mapping of model identifiers to artifact files
//! - Codecs for the native boosted-tree binary and the generic object format
//! - Loading with fallback when an artifact's suffix lies about its encoding
//! - A read-mostly cache of immutable model handles

mod cache;
mod loader;
mod locator;
pub mod native;
pub mod object;

pub use cache::{CacheStats, ModelCache};
pub use loader::{LoadedModel, ModelLoader};
pub use locator::{ArtifactLocation, ModelEntryInfo, ModelRegistry};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Native boosted-tree binary (`.cbm`)
    Native,
    /// Generic object serialization (`.joblib`)
    Object,
}

impl ArtifactFormat {
    /// File suffix associated with the format
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Native => "cbm",
            ArtifactFormat::Object => "joblib",
        }
    }

    /// Derive the declared format from a file suffix (case-insensitive)
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "cbm" => Some(ArtifactFormat::Native),
            "joblib" => Some(ArtifactFormat::Object),
            _ => None,
        }
    }

    /// Derive the declared format from a path's suffix
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ArtifactFormat::from_extension("cbm"), Some(ArtifactFormat::Native));
        assert_eq!(ArtifactFormat::from_extension("CBM"), Some(ArtifactFormat::Native));
        assert_eq!(ArtifactFormat::from_extension("joblib"), Some(ArtifactFormat::Object));
        assert_eq!(ArtifactFormat::from_extension("pkl"), None);
        assert_eq!(
            ArtifactFormat::from_path(Path::new("models/life_insurance.cbm")),
            Some(ArtifactFormat::Native)
        );
        assert_eq!(ArtifactFormat::from_path(Path::new("models/noext")), None);
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"test model weights");
        assert_eq!(checksum.len(), 64); // SHA256 hex is 64 chars
        assert_eq!(checksum, compute_checksum(b"test model weights"));
        assert_ne!(checksum, compute_checksum(b"other weights"));
    }
}

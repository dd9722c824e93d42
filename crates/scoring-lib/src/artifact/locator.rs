//! Model identifier to artifact file resolution

use super::{compute_checksum, ArtifactFormat};
use crate::config::ScoringConfig;
use crate::error::{Result, ScoringError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A located artifact ready to be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// Canonical model identifier (registry spelling)
    pub model: String,
    pub path: PathBuf,
    /// Format implied by the file suffix
    pub format: ArtifactFormat,
}

/// Registry entry as reported to operators
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntryInfo {
    pub model: String,
    pub file_name: String,
    pub path: PathBuf,
    pub format: Option<ArtifactFormat>,
    pub present: bool,
    pub size_bytes: Option<u64>,
    pub checksum: Option<String>,
}

/// Fixed set of known models under a models directory
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models_dir: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>, entries: BTreeMap<String, String>) -> Self {
        Self {
            models_dir: models_dir.into(),
            entries,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.models_dir.clone(), config.models.clone())
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Known model identifiers in sorted order
    pub fn model_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Resolve an identifier: exact match first, then case-insensitive
    fn entry(&self, name: &str) -> Option<(&String, &String)> {
        self.entries.get_key_value(name).or_else(|| {
            self.entries
                .iter()
                .find(|(model, _)| model.eq_ignore_ascii_case(name))
        })
    }

    /// Map a model identifier to its artifact path and declared format
    pub fn locate(&self, name: &str) -> Result<ArtifactLocation> {
        let (model, file_name) = self.entry(name).ok_or_else(|| ScoringError::UnknownModel {
            name: name.to_string(),
            known: self.model_names(),
        })?;

        let path = self.models_dir.join(file_name);
        if !path.is_file() {
            return Err(ScoringError::ArtifactNotFound {
                model: model.clone(),
                path,
            });
        }

        let format =
            ArtifactFormat::from_path(&path).ok_or_else(|| ScoringError::UnsupportedFormat {
                extension: path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.clone(),
            })?;

        debug!(model = %model, path = %path.display(), format = %format, "Located model artifact");

        Ok(ArtifactLocation {
            model: model.clone(),
            path,
            format,
        })
    }

    /// Describe every registry entry, reading artifacts to checksum them
    pub fn describe(&self) -> Vec<ModelEntryInfo> {
        self.entries
            .iter()
            .map(|(model, file_name)| {
                let path = self.models_dir.join(file_name);
                let bytes = fs::read(&path).ok();
                ModelEntryInfo {
                    model: model.clone(),
                    file_name: file_name.clone(),
                    format: ArtifactFormat::from_path(&path),
                    present: bytes.is_some(),
                    size_bytes: bytes.as_ref().map(|b| b.len() as u64),
                    checksum: bytes.as_deref().map(compute_checksum),
                    path,
                }
            })
            .collect()
    }
}

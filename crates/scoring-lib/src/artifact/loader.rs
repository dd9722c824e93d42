//! Artifact loading with format fallback
//!
//! Artifacts are sometimes filed under the native suffix while actually
//! holding an object-format payload. When native decoding reports a bad
//! descriptor (the bytes are not a native artifact at all) the same bytes
//! are decoded as an object before giving up. Any other native failure, and
//! any object-format failure, is a corrupt model.

use super::{compute_checksum, native, object, ArtifactFormat, ArtifactLocation};
use crate::error::{DecodeAttempt, Result, ScoringError};
use crate::model::{ModelFamily, ModelHandle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of decoding one artifact
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub handle: Arc<ModelHandle>,
    /// The declared format failed and the object format was used instead
    pub fallback_used: bool,
}

/// Stateless artifact loader; every call returns a fresh, owned handle
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Read and decode the artifact at `location`
    pub fn load(&self, location: &ArtifactLocation) -> Result<LoadedModel> {
        let start = Instant::now();
        let bytes = fs::read(&location.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScoringError::ArtifactNotFound {
                    model: location.model.clone(),
                    path: location.path.clone(),
                }
            } else {
                ScoringError::CorruptModel {
                    path: location.path.clone(),
                    attempts: vec![DecodeAttempt::new(
                        location.format,
                        format!("failed to read artifact: {e}"),
                    )],
                }
            }
        })?;

        let loaded = self.load_bytes(&location.model, &location.path, location.format, &bytes)?;

        debug!(
            model = %location.model,
            declared = %location.format,
            decoded_as = %loaded.handle.decoded_as(),
            fallback_used = loaded.fallback_used,
            size_bytes = bytes.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Model artifact decoded"
        );
        Ok(loaded)
    }

    /// Decode artifact bytes according to their declared format
    pub fn load_bytes(
        &self,
        model: &str,
        path: &Path,
        declared: ArtifactFormat,
        bytes: &[u8],
    ) -> Result<LoadedModel> {
        let (family, decoded_as, fallback_used) = match declared {
            ArtifactFormat::Native => match native::decode(bytes) {
                Ok(ensemble) => (ModelFamily::Ensemble(ensemble), ArtifactFormat::Native, false),
                Err(err) if err.is_bad_descriptor() => {
                    warn!(
                        model = %model,
                        path = %path.display(),
                        error = %err,
                        "Artifact is not a native model, retrying as object format"
                    );
                    let object = object::decode(bytes).map_err(|fallback_err| {
                        ScoringError::CorruptModel {
                            path: path.to_path_buf(),
                            attempts: vec![
                                DecodeAttempt::new(ArtifactFormat::Native, err.to_string()),
                                DecodeAttempt::new(
                                    ArtifactFormat::Object,
                                    fallback_err.to_string(),
                                ),
                            ],
                        }
                    })?;
                    (ModelFamily::Object(object), ArtifactFormat::Object, true)
                }
                Err(err) => {
                    return Err(ScoringError::CorruptModel {
                        path: path.to_path_buf(),
                        attempts: vec![DecodeAttempt::new(ArtifactFormat::Native, err.to_string())],
                    })
                }
            },
            ArtifactFormat::Object => {
                let object = object::decode(bytes).map_err(|err| ScoringError::CorruptModel {
                    path: path.to_path_buf(),
                    attempts: vec![DecodeAttempt::new(ArtifactFormat::Object, err.to_string())],
                })?;
                (ModelFamily::Object(object), ArtifactFormat::Object, false)
            }
        };

        let handle = ModelHandle::new(
            model,
            declared,
            decoded_as,
            compute_checksum(bytes),
            bytes.len(),
            family,
        );
        Ok(LoadedModel {
            handle: Arc::new(handle),
            fallback_used,
        })
    }
}

//! Error taxonomy for the scoring pipeline
//!
//! Every failure is fatal to the request that raised it, with the single
//! exception of probability extraction, which degrades the result instead
//! (see [`crate::predictor::BatchPredictor`]).

use std::path::PathBuf;
use thiserror::Error;

use crate::artifact::ArtifactFormat;

/// Result type alias for scoring operations
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Errors surfaced to callers of the scoring pipeline
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("unknown model '{name}' (known models: {})", .known.join(", "))]
    UnknownModel { name: String, known: Vec<String> },

    #[error("model artifact for '{model}' not found at {}", .path.display())]
    ArtifactNotFound { model: String, path: PathBuf },

    #[error("unsupported model format '{extension}' for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("corrupt model artifact {}: {}", .path.display(), describe_attempts(.attempts))]
    CorruptModel {
        path: PathBuf,
        attempts: Vec<DecodeAttempt>,
    },

    #[error("input dataset {} could not be read: {reason}", .path.display())]
    DatasetUnreadable { path: PathBuf, reason: String },

    #[error("invalid feature set: {0}")]
    InvalidFeatureSet(String),

    #[error("input is missing {} required feature(s): {}", .missing.len(), .missing.join(", "))]
    MissingFeatures { missing: Vec<String> },

    #[error("feature set was guessed from dataset columns and heuristic resolution is disabled ({} columns)", .features.len())]
    LowConfidenceRejected { features: Vec<String> },

    #[error("prediction failed: {0}")]
    PredictionFailure(String),

    #[error("input already contains reserved output column '{column}'")]
    ColumnConflict { column: String },

    #[error("failed to persist result table to {}: {source}", .path.display())]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScoringError {
    /// Stable machine-readable tag for the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::UnknownModel { .. } => "unknown_model",
            ScoringError::ArtifactNotFound { .. } => "artifact_not_found",
            ScoringError::UnsupportedFormat { .. } => "unsupported_format",
            ScoringError::CorruptModel { .. } => "corrupt_model",
            ScoringError::DatasetUnreadable { .. } => "dataset_unreadable",
            ScoringError::InvalidFeatureSet(_) => "invalid_feature_set",
            ScoringError::MissingFeatures { .. } => "missing_features",
            ScoringError::LowConfidenceRejected { .. } => "low_confidence_rejected",
            ScoringError::PredictionFailure(_) => "prediction_failure",
            ScoringError::ColumnConflict { .. } => "column_conflict",
            ScoringError::PersistenceError { .. } => "persistence_error",
            ScoringError::Config(_) => "config",
        }
    }
}

impl From<config::ConfigError> for ScoringError {
    fn from(err: config::ConfigError) -> Self {
        ScoringError::Config(err.to_string())
    }
}

/// One failed attempt to decode an artifact in a given format
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeAttempt {
    pub format: ArtifactFormat,
    pub message: String,
}

impl DecodeAttempt {
    pub fn new(format: ArtifactFormat, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }
}

fn describe_attempts(attempts: &[DecodeAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.format, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}

//! Batch inference over a validated feature table
//!
//! Label prediction failures are fatal. Probability extraction is attempted
//! separately and any failure there only drops the probability column.

use crate::error::{Result, ScoringError};
use crate::model::{Classifier, FeatureMatrix, ModelError, ProbabilityMatrix};
use ndarray::Array2;
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, warn};

/// Column of the probability matrix holding the positive class
const POSITIVE_CLASS_COLUMN: usize = 1;

/// Labels and optional positive-class probabilities for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionBatch {
    pub labels: Vec<i64>,
    pub probabilities: Option<Vec<f64>>,
}

impl PredictionBatch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Convert a projected feature table into a dense row-major matrix
///
/// Nulls become NaN. String columns cannot be scored.
pub fn to_feature_matrix(frame: &DataFrame) -> Result<FeatureMatrix> {
    let rows = frame.height();
    let cols = frame.width();
    let mut matrix = Array2::<f64>::zeros((rows, cols));

    for (j, column) in frame.get_columns().iter().enumerate() {
        if matches!(column.dtype(), DataType::String) {
            return Err(ScoringError::PredictionFailure(format!(
                "feature column '{}' is not numeric",
                column.name()
            )));
        }
        let values = column.cast(&DataType::Float64).map_err(|e| {
            ScoringError::PredictionFailure(format!(
                "feature column '{}' cannot be read as numbers: {}",
                column.name(),
                e
            ))
        })?;
        let values = values
            .f64()
            .map_err(|e| ScoringError::PredictionFailure(e.to_string()))?;
        for (i, value) in values.into_iter().enumerate() {
            matrix[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }

    Ok(matrix)
}

/// Runs batch classification for one request
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPredictor;

impl BatchPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Predict labels and, where the model supports it, probabilities
    pub fn predict(&self, model: &dyn Classifier, rows: &FeatureMatrix) -> Result<PredictionBatch> {
        let start = Instant::now();
        let expected = rows.nrows();

        let labels = model
            .predict(rows)
            .map_err(|e| ScoringError::PredictionFailure(e.to_string()))?;
        if labels.len() != expected {
            return Err(ScoringError::PredictionFailure(format!(
                "model returned {} predictions for {} rows",
                labels.len(),
                expected
            )));
        }

        let probabilities = match model.predict_proba(rows) {
            Ok(matrix) => match positive_column(&matrix, expected) {
                Ok(values) => Some(values),
                Err(reason) => {
                    warn!(reason = %reason, "Discarding unusable probability output");
                    None
                }
            },
            Err(ModelError::ProbabilityUnsupported) => {
                warn!("Model does not support probability output, omitting probability column");
                None
            }
            Err(e) => {
                warn!(error = %e, "Probability extraction failed, omitting probability column");
                None
            }
        };

        debug!(
            rows = expected,
            probabilities = probabilities.is_some(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch inference completed"
        );

        Ok(PredictionBatch {
            labels,
            probabilities,
        })
    }
}

/// Extract the positive-class column of a two-column probability matrix
fn positive_column(matrix: &ProbabilityMatrix, rows: usize) -> std::result::Result<Vec<f64>, String> {
    if matrix.ncols() != 2 {
        return Err(format!("expected 2 probability columns, got {}", matrix.ncols()));
    }
    if matrix.nrows() != rows {
        return Err(format!("expected {} probability rows, got {}", rows, matrix.nrows()));
    }
    let values: Vec<f64> = matrix.column(POSITIVE_CLASS_COLUMN).to_vec();
    if let Some(bad) = values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(format!("probability {} outside [0, 1]", bad));
    }
    Ok(values)
}

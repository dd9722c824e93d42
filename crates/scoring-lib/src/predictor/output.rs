//! Result table construction
//!
//! The result is the input table with a synthetic row identifier prepended
//! and the prediction (and optional probability) columns appended.

use super::PredictionBatch;
use crate::config::OutputColumns;
use crate::dataset::Dataset;
use crate::error::{Result, ScoringError};
use polars::prelude::*;

/// Identifier for a 1-based row index: `U0001`, `U0002`, ...
pub fn row_identifier(index: usize) -> String {
    format!("U{:04}", index)
}

/// Builds result tables with a fixed set of output column names
#[derive(Debug, Clone, Default)]
pub struct ResultAugmenter {
    columns: OutputColumns,
}

impl ResultAugmenter {
    pub fn new(columns: OutputColumns) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &OutputColumns {
        &self.columns
    }

    /// Build the result table for `dataset` and its predictions
    pub fn augment(&self, dataset: &Dataset, batch: &PredictionBatch) -> Result<DataFrame> {
        let rows = dataset.row_count();
        if batch.len() != rows {
            return Err(ScoringError::PredictionFailure(format!(
                "{} predictions for {} input rows",
                batch.len(),
                rows
            )));
        }

        let mut reserved = vec![&self.columns.identifier, &self.columns.prediction];
        if batch.probabilities.is_some() {
            reserved.push(&self.columns.probability);
        }
        if let Some(column) = reserved.into_iter().find(|c| dataset.has_column(c)) {
            return Err(ScoringError::ColumnConflict {
                column: column.clone(),
            });
        }

        let polars_err = |e: PolarsError| ScoringError::PredictionFailure(e.to_string());

        let identifiers: Vec<String> = (1..=rows).map(row_identifier).collect();
        let mut frame = dataset.frame().clone();
        frame
            .insert_column(
                0,
                Series::new(self.columns.identifier.as_str().into(), identifiers),
            )
            .map_err(polars_err)?;
        frame
            .with_column(Series::new(
                self.columns.prediction.as_str().into(),
                batch.labels.as_slice(),
            ))
            .map_err(polars_err)?;
        if let Some(probabilities) = &batch.probabilities {
            frame
                .with_column(Series::new(
                    self.columns.probability.as_str().into(),
                    probabilities.as_slice(),
                ))
                .map_err(polars_err)?;
        }

        Ok(frame)
    }
}

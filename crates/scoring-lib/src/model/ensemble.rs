//! Boosted oblivious-tree ensembles
//!
//! Every level of an oblivious tree applies the same split to all nodes, so a
//! row's leaf is addressed by the bit pattern of its split outcomes. The raw
//! score is the bias plus one leaf value per tree, mapped through the
//! logistic function to obtain the positive-class probability.

use super::{sigmoid, Classifier, FeatureMatrix, ModelError, ProbabilityMatrix};
use ndarray::{Array2, ArrayView1};

/// Deepest tree accepted by the decoder (2^16 leaves)
pub const MAX_TREE_DEPTH: usize = 16;

/// Decision threshold on the positive-class probability
const DECISION_THRESHOLD: f64 = 0.5;

/// A single split: goes right when `x[feature_index] > threshold`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub feature_index: usize,
    pub threshold: f64,
}

/// One oblivious tree; `leaf_values.len() == 2^splits.len()`
#[derive(Debug, Clone, PartialEq)]
pub struct ObliviousTree {
    pub splits: Vec<Split>,
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    fn leaf_index(&self, row: &ArrayView1<'_, f64>) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0usize, |index, (level, split)| {
                // NaN compares false and falls to the left branch
                if row[split.feature_index] > split.threshold {
                    index | (1 << level)
                } else {
                    index
                }
            })
    }

    fn evaluate(&self, row: &ArrayView1<'_, f64>) -> f64 {
        self.leaf_values[self.leaf_index(row)]
    }
}

/// Binary classifier built from a sum of oblivious trees
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    /// Training feature names; empty when the artifact did not record them
    pub feature_names: Vec<String>,
    pub bias: f64,
    pub trees: Vec<ObliviousTree>,
}

impl TreeEnsemble {
    /// Smallest input width that every split can be evaluated against
    pub fn required_width(&self) -> usize {
        self.trees
            .iter()
            .flat_map(|t| t.splits.iter())
            .map(|s| s.feature_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Check the structural invariants the evaluator relies on
    pub fn validate(&self) -> Result<(), ModelError> {
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.depth() > MAX_TREE_DEPTH {
                return Err(ModelError::InvalidStructure(format!(
                    "tree {} has depth {} (max {})",
                    i,
                    tree.depth(),
                    MAX_TREE_DEPTH
                )));
            }
            if tree.leaf_values.len() != 1 << tree.depth() {
                return Err(ModelError::InvalidStructure(format!(
                    "tree {} has {} leaves, expected {}",
                    i,
                    tree.leaf_values.len(),
                    1usize << tree.depth()
                )));
            }
        }
        if !self.feature_names.is_empty() && self.required_width() > self.feature_names.len() {
            return Err(ModelError::InvalidStructure(format!(
                "splits reference {} features but only {} are named",
                self.required_width(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }

    fn check_width(&self, rows: &FeatureMatrix) -> Result<(), ModelError> {
        let width = rows.ncols();
        if !self.feature_names.is_empty() && width != self.feature_names.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.feature_names.len(),
                actual: width,
            });
        }
        let required = self.required_width();
        if required > width {
            return Err(ModelError::FeatureIndexOutOfRange {
                index: required - 1,
                width,
            });
        }
        Ok(())
    }

    /// Positive-class probability for every row
    fn positive_probabilities(&self, rows: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        self.check_width(rows)?;
        Ok(rows
            .rows()
            .into_iter()
            .map(|row| {
                let raw = self.bias + self.trees.iter().map(|t| t.evaluate(&row)).sum::<f64>();
                sigmoid(raw)
            })
            .collect())
    }
}

impl Classifier for TreeEnsemble {
    fn predict(&self, rows: &FeatureMatrix) -> Result<Vec<i64>, ModelError> {
        Ok(self
            .positive_probabilities(rows)?
            .into_iter()
            .map(|p| i64::from(p > DECISION_THRESHOLD))
            .collect())
    }

    fn predict_proba(&self, rows: &FeatureMatrix) -> Result<ProbabilityMatrix, ModelError> {
        let positive = self.positive_probabilities(rows)?;
        let mut matrix = Array2::zeros((positive.len(), 2));
        for (i, p) in positive.into_iter().enumerate() {
            matrix[[i, 0]] = 1.0 - p;
            matrix[[i, 1]] = p;
        }
        Ok(matrix)
    }
}

//! Estimator objects from the generic object format

use super::{sigmoid, Classifier, FeatureMatrix, ModelError, ProbabilityMatrix};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Largest feature index a decision tree split may reference
pub const MAX_FEATURE_INDEX: usize = 1 << 16;

/// A serialized estimator plus its optional training feature names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
    #[serde(flatten)]
    pub estimator: Estimator,
}

/// Supported estimator kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression { coef: Vec<f64>, intercept: f64 },
    DecisionTreeClassifier { nodes: Vec<TreeNode> },
    /// Margin classifier without a probability operation
    LinearSvc { coef: Vec<f64>, intercept: f64 },
}

/// Node of a binary decision tree, stored in a flat array
///
/// A node with no `feature` is a leaf; `value` holds the class weights
/// `[negative, positive]` observed at that node during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    pub value: [f64; 2],
}

impl Estimator {
    /// Serialized tag of the estimator kind
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression { .. } => "logistic_regression",
            Estimator::DecisionTreeClassifier { .. } => "decision_tree_classifier",
            Estimator::LinearSvc { .. } => "linear_svc",
        }
    }

    pub fn supports_probability(&self) -> bool {
        !matches!(self, Estimator::LinearSvc { .. })
    }

    /// Number of input columns the estimator reads
    pub fn input_width(&self) -> usize {
        match self {
            Estimator::LogisticRegression { coef, .. } | Estimator::LinearSvc { coef, .. } => {
                coef.len()
            }
            Estimator::DecisionTreeClassifier { nodes } => nodes
                .iter()
                .filter_map(|n| n.feature)
                .map(|f| f.saturating_add(1))
                .max()
                .unwrap_or(0),
        }
    }

    /// Check the structural invariants the evaluator relies on
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Estimator::DecisionTreeClassifier { nodes } = self {
            if nodes.is_empty() {
                return Err(ModelError::InvalidStructure("decision tree has no nodes".into()));
            }
            for (i, node) in nodes.iter().enumerate() {
                if let Some(feature) = node.feature.filter(|f| *f >= MAX_FEATURE_INDEX) {
                    return Err(ModelError::FeatureIndexOutOfRange {
                        index: feature,
                        width: MAX_FEATURE_INDEX,
                    });
                }
                // Children must point forward, which also rules out cycles
                if node.feature.is_some()
                    && (node.left <= i
                        || node.right <= i
                        || node.left >= nodes.len()
                        || node.right >= nodes.len())
                {
                    return Err(ModelError::InvalidStructure(format!(
                        "node {} has invalid children ({}, {})",
                        i, node.left, node.right
                    )));
                }
            }
        }
        Ok(())
    }

    fn linear_margin(coef: &[f64], intercept: f64, row: &ArrayView1<'_, f64>) -> f64 {
        intercept + coef.iter().zip(row.iter()).map(|(w, x)| w * x).sum::<f64>()
    }

    fn tree_leaf<'a>(nodes: &'a [TreeNode], row: &ArrayView1<'_, f64>) -> &'a TreeNode {
        let mut index = 0;
        loop {
            let node = &nodes[index];
            match node.feature {
                Some(feature) if row[feature] <= node.threshold => index = node.left,
                Some(_) => index = node.right,
                None => return node,
            }
        }
    }

    fn leaf_positive_rate(leaf: &TreeNode) -> f64 {
        let total = leaf.value[0] + leaf.value[1];
        if total > 0.0 {
            leaf.value[1] / total
        } else {
            0.0
        }
    }
}

impl ObjectModel {
    /// Check the estimator and its agreement with `feature_names_in`
    pub fn validate(&self) -> Result<(), ModelError> {
        self.estimator.validate()?;
        let Some(names) = self.feature_names_in.as_ref().filter(|n| !n.is_empty()) else {
            return Ok(());
        };
        let width = self.estimator.input_width();
        match &self.estimator {
            Estimator::DecisionTreeClassifier { .. } if width > names.len() => {
                Err(ModelError::FeatureIndexOutOfRange {
                    index: width - 1,
                    width: names.len(),
                })
            }
            Estimator::LogisticRegression { .. } | Estimator::LinearSvc { .. }
                if width != names.len() =>
            {
                Err(ModelError::FeatureCountMismatch {
                    expected: names.len(),
                    actual: width,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_width(&self, rows: &FeatureMatrix) -> Result<(), ModelError> {
        let width = rows.ncols();
        if let Some(names) = self.feature_names_in.as_ref().filter(|n| !n.is_empty()) {
            if names.len() != width {
                return Err(ModelError::FeatureCountMismatch {
                    expected: names.len(),
                    actual: width,
                });
            }
        }
        let expected = self.estimator.input_width();
        match &self.estimator {
            Estimator::DecisionTreeClassifier { .. } if expected > width => {
                Err(ModelError::FeatureIndexOutOfRange {
                    index: expected - 1,
                    width,
                })
            }
            Estimator::LogisticRegression { .. } | Estimator::LinearSvc { .. }
                if expected != width =>
            {
                Err(ModelError::FeatureCountMismatch {
                    expected,
                    actual: width,
                })
            }
            _ => Ok(()),
        }
    }

    fn positive_probabilities(&self, rows: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        self.check_width(rows)?;
        let rows = rows.rows().into_iter();
        match &self.estimator {
            Estimator::LogisticRegression { coef, intercept } => Ok(rows
                .map(|row| sigmoid(Estimator::linear_margin(coef, *intercept, &row)))
                .collect()),
            Estimator::DecisionTreeClassifier { nodes } => Ok(rows
                .map(|row| Estimator::leaf_positive_rate(Estimator::tree_leaf(nodes, &row)))
                .collect()),
            Estimator::LinearSvc { .. } => Err(ModelError::ProbabilityUnsupported),
        }
    }
}

impl Classifier for ObjectModel {
    fn predict(&self, rows: &FeatureMatrix) -> Result<Vec<i64>, ModelError> {
        self.check_width(rows)?;
        match &self.estimator {
            Estimator::LinearSvc { coef, intercept } => Ok(rows
                .rows()
                .into_iter()
                .map(|row| i64::from(Estimator::linear_margin(coef, *intercept, &row) > 0.0))
                .collect()),
            _ => Ok(self
                .positive_probabilities(rows)?
                .into_iter()
                .map(|p| i64::from(p > 0.5))
                .collect()),
        }
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

//! Loaded model handles
//!
//! Two model families are supported: boosted oblivious-tree ensembles decoded
//! from the native binary format, and estimator objects decoded from the
//! generic object format. Both are immutable once built and are shared as
//! `Arc<ModelHandle>` between the cache and the requests that use them.

mod ensemble;
mod estimator;

pub use ensemble::{ObliviousTree, Split, TreeEnsemble, MAX_TREE_DEPTH};
pub use estimator::{Estimator, ObjectModel, TreeNode};

use crate::artifact::ArtifactFormat;
use ndarray::Array2;
use thiserror::Error;

/// Rows × features input matrix, columns in feature-set order
pub type FeatureMatrix = Array2<f64>;

/// Rows × classes probability matrix
pub type ProbabilityMatrix = Array2<f64>;

/// Runtime failures raised by a model while scoring a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("model does not support probability output")]
    ProbabilityUnsupported,

    #[error("model expects {expected} feature columns, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("split references feature index {index} but input has {width} columns")]
    FeatureIndexOutOfRange { index: usize, width: usize },

    #[error("invalid model structure: {0}")]
    InvalidStructure(String),
}

/// Batch classification interface shared by every model family
pub trait Classifier: Send + Sync {
    /// Predict a class label (0 or 1) for every row
    fn predict(&self, rows: &FeatureMatrix) -> Result<Vec<i64>, ModelError>;

    /// Predict class probabilities, one column per class
    fn predict_proba(&self, _rows: &FeatureMatrix) -> Result<ProbabilityMatrix, ModelError> {
        Err(ModelError::ProbabilityUnsupported)
    }
}

/// The deserialized model behind a handle
#[derive(Debug, Clone, PartialEq)]
pub enum ModelFamily {
    /// Boosted tree ensemble decoded from the native binary format
    Ensemble(TreeEnsemble),
    /// Estimator object decoded from the generic object format
    Object(ObjectModel),
}

/// An immutable, loaded model and the provenance of its artifact
#[derive(Debug, Clone)]
pub struct ModelHandle {
    model: String,
    declared_format: ArtifactFormat,
    decoded_as: ArtifactFormat,
    checksum: String,
    size_bytes: usize,
    family: ModelFamily,
}

impl ModelHandle {
    pub fn new(
        model: impl Into<String>,
        declared_format: ArtifactFormat,
        decoded_as: ArtifactFormat,
        checksum: String,
        size_bytes: usize,
        family: ModelFamily,
    ) -> Self {
        Self {
            model: model.into(),
            declared_format,
            decoded_as,
            checksum,
            size_bytes,
            family,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Format implied by the artifact's file suffix
    pub fn declared_format(&self) -> ArtifactFormat {
        self.declared_format
    }

    /// Format the artifact bytes were actually decoded as
    pub fn decoded_as(&self) -> ArtifactFormat {
        self.decoded_as
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn family(&self) -> &ModelFamily {
        &self.family
    }

    /// Feature names embedded by the native format, if any
    pub fn native_feature_names(&self) -> Option<&[String]> {
        match &self.family {
            ModelFamily::Ensemble(ensemble) if !ensemble.feature_names.is_empty() => {
                Some(&ensemble.feature_names)
            }
            _ => None,
        }
    }

    /// `feature_names_in` recorded on an estimator object, if any
    pub fn object_feature_names(&self) -> Option<&[String]> {
        match &self.family {
            ModelFamily::Object(object) => object
                .feature_names_in
                .as_deref()
                .filter(|names| !names.is_empty()),
            _ => None,
        }
    }

    fn classifier(&self) -> &dyn Classifier {
        match &self.family {
            ModelFamily::Ensemble(ensemble) => ensemble,
            ModelFamily::Object(object) => object,
        }
    }
}

impl Classifier for ModelHandle {
    fn predict(&self, rows: &FeatureMatrix) -> Result<Vec<i64>, ModelError> {
        self.classifier().predict(rows)
    }

    fn predict_proba(&self, rows: &FeatureMatrix) -> Result<ProbabilityMatrix, ModelError> {
        self.classifier().predict_proba(rows)
    }
}

/// Logistic link used by the binary classifiers
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(family: ModelFamily) -> ModelHandle {
        ModelHandle::new(
            "General",
            ArtifactFormat::Native,
            ArtifactFormat::Native,
            "abc".to_string(),
            10,
            family,
        )
    }

    #[test]
    fn test_native_feature_names_only_for_ensembles() {
        let ensemble = TreeEnsemble {
            feature_names: vec!["age".to_string()],
            bias: 0.0,
            trees: vec![],
        };
        let h = handle(ModelFamily::Ensemble(ensemble));
        assert_eq!(h.native_feature_names(), Some(&["age".to_string()][..]));
        assert!(h.object_feature_names().is_none());
    }

    #[test]
    fn test_empty_feature_names_are_not_introspectable() {
        let ensemble = TreeEnsemble {
            feature_names: vec![],
            bias: 0.0,
            trees: vec![],
        };
        assert!(handle(ModelFamily::Ensemble(ensemble)).native_feature_names().is_none());

        let object = ObjectModel {
            feature_names_in: Some(vec![]),
            estimator: Estimator::LinearSvc {
                coef: vec![1.0],
                intercept: 0.0,
            },
        };
        assert!(handle(ModelFamily::Object(object)).object_feature_names().is_none());
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}

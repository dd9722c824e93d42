//! Prediction pipeline stages
//!
//! Feature resolution, input validation, batch inference, prediction
//! override policies and result table construction.

mod features;
mod inference;
mod output;
mod policy;
mod validation;

pub use features::{FeatureResolver, FeatureSet, FeatureSource, ResolvedFeatures, HEURISTIC_DENYLIST};
pub use inference::{to_feature_matrix, BatchPredictor, PredictionBatch};
pub use output::{row_identifier, ResultAugmenter};
pub use policy::{DemoChurnOverride, OverrideAssignment, PredictionOverride};
pub use validation::{missing_features, validate};

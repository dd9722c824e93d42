//! Input validation against a resolved feature set

use super::FeatureSet;
use crate::dataset::Dataset;
use crate::error::{Result, ScoringError};
use polars::prelude::DataFrame;

/// Features absent from the dataset, in feature-set order
pub fn missing_features(features: &FeatureSet, dataset: &Dataset) -> Vec<String> {
    features
        .iter()
        .filter(|name| !dataset.has_column(name))
        .cloned()
        .collect()
}

/// Project the dataset onto exactly `features`, in feature-set order
///
/// Fails with the complete list of missing features rather than the first
/// one encountered.
pub fn validate(features: &FeatureSet, dataset: &Dataset) -> Result<DataFrame> {
    let missing = missing_features(features, dataset);
    if !missing.is_empty() {
        return Err(ScoringError::MissingFeatures { missing });
    }

    dataset
        .frame()
        .select(features.iter().map(|name| name.as_str()))
        .map_err(|e| ScoringError::PredictionFailure(format!("failed to select features: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::column_names;
    use polars::prelude::*;

    fn dataset() -> Dataset {
        let frame = DataFrame::new(vec![
            Series::new("notes".into(), ["a", "b"]).into(),
            Series::new("income".into(), [10.0f64, 20.0]).into(),
            Series::new("age".into(), [30i64, 40]).into(),
        ])
        .unwrap();
        Dataset::new("input.csv", frame)
    }

    fn features(names: &[&str]) -> FeatureSet {
        FeatureSet::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_projection_follows_feature_order() {
        let selected = validate(&features(&["age", "income"]), &dataset()).unwrap();
        assert_eq!(column_names(&selected), vec!["age", "income"]);
        assert_eq!(selected.height(), 2);
    }

    #[test]
    fn test_all_missing_features_reported_in_order() {
        let err = validate(&features(&["tenure", "age", "plan", "income"]), &dataset()).unwrap_err();
        match err {
            ScoringError::MissingFeatures { missing } => {
                assert_eq!(missing, vec!["tenure".to_string(), "plan".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_is_exact_set_difference() {
        let fs = features(&["a", "age", "b"]);
        assert_eq!(missing_features(&fs, &dataset()), vec!["a", "b"]);
        assert!(missing_features(&features(&["age"]), &dataset()).is_empty());
    }
}

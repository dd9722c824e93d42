//! Feature set discovery
//!
//! The columns a model expects are recovered from the model itself when its
//! format records them. Otherwise they are guessed from the dataset by
//! dropping identifier and target-like columns, which is flagged as a
//! low-confidence result.

use crate::error::{Result, ScoringError};
use crate::model::ModelHandle;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Dataset columns never treated as features by the heuristic
pub const HEURISTIC_DENYLIST: &[&str] = &["ID", "id", "Id", "Target", "target"];

/// Ordered, non-empty list of unique column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureSet(Vec<String>);

impl FeatureSet {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(ScoringError::InvalidFeatureSet("feature set is empty".into()));
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ScoringError::InvalidFeatureSet(format!(
                    "duplicate feature '{}'",
                    name
                )));
            }
        }
        Ok(Self(names))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// Where a feature set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    /// Names recorded in a native artifact
    NativeIntrospection,
    /// `feature_names_in` recorded on an estimator object
    ObjectIntrospection,
    /// Dataset columns minus the denylist
    Heuristic,
}

/// A feature set together with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFeatures {
    pub features: FeatureSet,
    pub source: FeatureSource,
}

impl ResolvedFeatures {
    /// True when the set was guessed rather than read from the model
    pub fn is_low_confidence(&self) -> bool {
        self.source == FeatureSource::Heuristic
    }
}

/// Recovers the ordered feature names a model expects
#[derive(Debug, Clone)]
pub struct FeatureResolver {
    denylist: Vec<String>,
}

impl Default for FeatureResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureResolver {
    pub fn new() -> Self {
        Self::with_denylist(HEURISTIC_DENYLIST.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_denylist(denylist: Vec<String>) -> Self {
        Self { denylist }
    }

    /// Resolve the feature set for `handle` against the dataset's columns
    pub fn resolve(&self, handle: &ModelHandle, dataset_columns: &[String]) -> Result<ResolvedFeatures> {
        if let Some(names) = handle.native_feature_names() {
            debug!(model = %handle.model(), count = names.len(), "Feature names read from native artifact");
            return Ok(ResolvedFeatures {
                features: FeatureSet::new(names.to_vec())?,
                source: FeatureSource::NativeIntrospection,
            });
        }

        if let Some(names) = handle.object_feature_names() {
            debug!(model = %handle.model(), count = names.len(), "Feature names read from estimator object");
            return Ok(ResolvedFeatures {
                features: FeatureSet::new(names.to_vec())?,
                source: FeatureSource::ObjectIntrospection,
            });
        }

        let guessed: Vec<String> = dataset_columns
            .iter()
            .filter(|c| !self.denylist.iter().any(|d| d == *c))
            .cloned()
            .collect();

        warn!(
            model = %handle.model(),
            features = ?guessed,
            "Model does not record its feature names, using dataset columns minus identifier/target columns"
        );

        Ok(ResolvedFeatures {
            features: FeatureSet::new(guessed)?,
            source: FeatureSource::Heuristic,
        })
    }
}

//! Scoring request orchestration
//!
//! A request flows through locate, load, read, resolve, validate, predict,
//! override, augment and persist. Each stage either succeeds or fails the
//! whole request with a [`ScoringError`]; only probability extraction is
//! allowed to degrade.

use crate::artifact::{ArtifactFormat, LoadedModel, ModelCache, ModelEntryInfo, ModelLoader, ModelRegistry};
use crate::config::ScoringConfig;
use crate::dataset::{write_csv, Dataset};
use crate::error::{Result, ScoringError};
use crate::model::ModelFamily;
use crate::observability::{ScoringMetrics, StructuredLogger};
use crate::predictor::{
    to_feature_matrix, validate, BatchPredictor, DemoChurnOverride, FeatureResolver,
    PredictionOverride, ResolvedFeatures, ResultAugmenter,
};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One batch scoring request
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub model: String,
    pub input: PathBuf,
    /// Persist the result table here; `None` returns it in memory
    pub output_dir: Option<PathBuf>,
}

impl ScoreRequest {
    pub fn new(model: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Where the result table ended up
#[derive(Debug, Clone)]
pub enum ScoringOutput {
    Written(PathBuf),
    Table(DataFrame),
}

impl ScoringOutput {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ScoringOutput::Written(path) => Some(path),
            ScoringOutput::Table(_) => None,
        }
    }
}

/// Result of a successful scoring request
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    pub output: ScoringOutput,
    /// Canonical model identifier
    pub model: String,
    pub features: ResolvedFeatures,
    pub low_confidence: bool,
    pub fallback_used: bool,
    pub rows: usize,
    pub probability_available: bool,
    /// Name of the override policy that replaced the model's labels
    pub override_applied: Option<String>,
    /// Predicted label to row count
    pub class_distribution: BTreeMap<i64, usize>,
    pub generated_at: DateTime<Utc>,
}

/// Loaded artifact details for operators
#[derive(Debug, Clone, Serialize)]
pub struct ModelInspection {
    pub model: String,
    pub path: PathBuf,
    pub declared_format: ArtifactFormat,
    pub decoded_as: ArtifactFormat,
    pub fallback_used: bool,
    pub family: String,
    pub size_bytes: usize,
    pub checksum: String,
    /// Feature names recorded in the artifact, if any
    pub feature_names: Option<Vec<String>>,
    pub probability_supported: bool,
}

/// Batch scoring service
pub struct ScoringService {
    config: ScoringConfig,
    registry: ModelRegistry,
    loader: ModelLoader,
    cache: Option<ModelCache>,
    resolver: FeatureResolver,
    predictor: BatchPredictor,
    augmenter: ResultAugmenter,
    overrides: Vec<Box<dyn PredictionOverride>>,
    metrics: ScoringMetrics,
    logger: StructuredLogger,
}

impl ScoringService {
    /// Build a service, rejecting configurations that fail validation
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        let overrides: Vec<Box<dyn PredictionOverride>> = config
            .active_demo_override()
            .map(|demo| Box::new(DemoChurnOverride::from_config(demo)) as Box<dyn PredictionOverride>)
            .into_iter()
            .collect();

        Ok(Self {
            registry: ModelRegistry::from_config(&config),
            loader: ModelLoader::new(),
            cache: config.cache_models.then(ModelCache::new),
            resolver: FeatureResolver::new(),
            predictor: BatchPredictor::new(),
            augmenter: ResultAugmenter::new(config.columns.clone()),
            overrides,
            metrics: ScoringMetrics::new(),
            logger: StructuredLogger::new("churn-scoring"),
            config,
        })
    }

    /// Replace the configured override policies
    pub fn with_overrides(mut self, overrides: Vec<Box<dyn PredictionOverride>>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn cache(&self) -> Option<&ModelCache> {
        self.cache.as_ref()
    }

    /// Registry entries with on-disk details
    pub fn models(&self) -> Vec<ModelEntryInfo> {
        self.registry.describe()
    }

    /// Score one input file
    pub fn score(&self, request: &ScoreRequest) -> Result<ScoringOutcome> {
        let start = Instant::now();
        match self.run(request) {
            Ok(outcome) => {
                let elapsed = start.elapsed();
                self.metrics.observe_scoring(elapsed.as_secs_f64(), outcome.rows);
                self.logger.log_scoring_completed(
                    &outcome.model,
                    &request.input.display().to_string(),
                    outcome.rows,
                    outcome.probability_available,
                    elapsed.as_millis(),
                );
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.inc_scoring_errors(e.kind());
                self.logger.log_scoring_failed(
                    &request.model,
                    &request.input.display().to_string(),
                    e.kind(),
                    &e.to_string(),
                );
                Err(e)
            }
        }
    }

    /// Load a model and report how its artifact decoded
    pub fn inspect(&self, model: &str) -> Result<ModelInspection> {
        let location = self.registry.locate(model)?;
        let loaded = self.load(&location)?;
        let handle = &loaded.handle;

        let (family, feature_names) = match handle.family() {
            ModelFamily::Ensemble(ensemble) => (
                format!("tree_ensemble ({} trees)", ensemble.trees.len()),
                handle.native_feature_names().map(<[String]>::to_vec),
            ),
            ModelFamily::Object(object) => (
                object.estimator.kind().to_string(),
                handle.object_feature_names().map(<[String]>::to_vec),
            ),
        };
        let probability_supported = match handle.family() {
            ModelFamily::Ensemble(_) => true,
            ModelFamily::Object(object) => object.estimator.supports_probability(),
        };

        Ok(ModelInspection {
            model: location.model,
            path: location.path,
            declared_format: handle.declared_format(),
            decoded_as: handle.decoded_as(),
            fallback_used: loaded.fallback_used,
            family,
            size_bytes: handle.size_bytes(),
            checksum: handle.checksum().to_string(),
            feature_names,
            probability_supported,
        })
    }

    fn load(&self, location: &crate::artifact::ArtifactLocation) -> Result<LoadedModel> {
        let start = Instant::now();
        let (loaded, cached) = match &self.cache {
            Some(cache) => {
                let (loaded, hit) = cache.get_or_load(location, &self.loader)?;
                self.metrics.record_cache_lookup(hit);
                (loaded, hit)
            }
            None => (self.loader.load(location)?, false),
        };

        if !cached {
            self.metrics.observe_model_load(start.elapsed().as_secs_f64());
            if loaded.fallback_used {
                self.metrics.inc_fallback_loads();
            }
        }
        self.logger.log_model_loaded(
            &location.model,
            location.format.extension(),
            loaded.handle.decoded_as().extension(),
            loaded.fallback_used,
            cached,
        );
        Ok(loaded)
    }

    fn run(&self, request: &ScoreRequest) -> Result<ScoringOutcome> {
        let location = self.registry.locate(&request.model)?;
        let loaded = self.load(&location)?;
        let handle = &loaded.handle;

        let dataset = Dataset::read_csv(&request.input)?;

        let resolved = self.resolver.resolve(handle, &dataset.columns())?;
        let low_confidence = resolved.is_low_confidence();
        if low_confidence {
            self.metrics.inc_heuristic_resolutions();
        }
        self.logger.log_features_resolved(
            &location.model,
            source_name(&resolved),
            resolved.features.len(),
            low_confidence,
        );
        if low_confidence && !self.config.allow_heuristic_features {
            return Err(ScoringError::LowConfidenceRejected {
                features: resolved.features.into_inner(),
            });
        }

        let selected = validate(&resolved.features, &dataset)?;
        let matrix = to_feature_matrix(&selected)?;
        let mut batch = self.predictor.predict(&**handle, &matrix)?;
        if batch.probabilities.is_none() {
            self.metrics.inc_probability_failures();
        }

        let mut override_applied = None;
        if let Some(policy) = self.overrides.iter().find(|p| p.applies_to(&location.model)) {
            let assignment = policy.assign(&request.input, batch.len());
            self.metrics.inc_overrides();
            self.logger.log_override(
                &location.model,
                policy.name(),
                assignment.target_rate,
                assignment.positives(),
                batch.len(),
            );
            batch.labels = assignment.labels;
            override_applied = Some(policy.name().to_string());
        }

        let mut class_distribution = BTreeMap::new();
        for label in &batch.labels {
            *class_distribution.entry(*label).or_insert(0usize) += 1;
        }

        let table = self.augmenter.augment(&dataset, &batch)?;
        let rows = table.height();
        let output = match &request.output_dir {
            Some(dir) => {
                let path = dir.join(&self.config.output_file_name);
                write_csv(&table, &path)?;
                ScoringOutput::Written(path)
            }
            None => ScoringOutput::Table(table),
        };

        Ok(ScoringOutcome {
            output,
            model: location.model,
            features: resolved,
            low_confidence,
            fallback_used: loaded.fallback_used,
            rows,
            probability_available: batch.probabilities.is_some(),
            override_applied,
            class_distribution,
            generated_at: Utc::now(),
        })
    }
}

fn source_name(resolved: &ResolvedFeatures) -> &'static str {
    use crate::predictor::FeatureSource;
    match resolved.source {
        FeatureSource::NativeIntrospection => "native_introspection",
        FeatureSource::ObjectIntrospection => "object_introspection",
        FeatureSource::Heuristic => "heuristic",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Estimator, ObjectModel};
    use std::fs;
    use tempfile::TempDir;

    fn setup(allow_heuristic: bool) -> (TempDir, ScoringService) {
        let dir = TempDir::new().unwrap();
        let model = ObjectModel {
            feature_names_in: None,
            estimator: Estimator::LogisticRegression {
                coef: vec![0.1],
                intercept: -3.0,
            },
        };
        fs::write(dir.path().join("auto.joblib"), model.to_bytes()).unwrap();
        fs::write(dir.path().join("input.csv"), "id,age\n1,20\n2,40\n3,60\n").unwrap();

        let config = ScoringConfig {
            models_dir: dir.path().to_path_buf(),
            allow_heuristic_features: allow_heuristic,
            models: [("Auto".to_string(), "auto.joblib".to_string())].into_iter().collect(),
            demo_override: None,
            ..ScoringConfig::default()
        };
        (dir, ScoringService::new(config).unwrap())
    }

    #[test]
    fn test_heuristic_features_flagged() {
        let (dir, service) = setup(true);
        let outcome = service
            .score(&ScoreRequest::new("Auto", dir.path().join("input.csv")))
            .unwrap();
        assert!(outcome.low_confidence);
        assert_eq!(outcome.features.features.names(), &["age".to_string()][..]);
        assert_eq!(outcome.rows, 3);
        assert!(outcome.probability_available);
        assert!(outcome.output.path().is_none());
        assert_eq!(outcome.class_distribution.values().sum::<usize>(), 3);
    }

    #[test]
    fn test_heuristic_features_rejected_when_disabled() {
        let (dir, service) = setup(false);
        let err = service
            .score(&ScoreRequest::new("Auto", dir.path().join("input.csv")))
            .unwrap_err();
        assert_eq!(err.kind(), "low_confidence_rejected");
    }

    #[test]
    fn test_cache_serves_second_request() {
        let (dir, service) = setup(true);
        let request = ScoreRequest::new("auto", dir.path().join("input.csv"));
        service.score(&request).unwrap();
        service.score(&request).unwrap();
        let stats = service.cache().unwrap().stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_inspect_reports_object_model() {
        let (_dir, service) = setup(true);
        let inspection = service.inspect("Auto").unwrap();
        assert_eq!(inspection.declared_format, ArtifactFormat::Object);
        assert_eq!(inspection.decoded_as, ArtifactFormat::Object);
        assert!(!inspection.fallback_used);
        assert!(inspection.feature_names.is_none());
        assert!(inspection.probability_supported);
    }

    struct AllChurn;

    impl PredictionOverride for AllChurn {
        fn name(&self) -> &str {
            "all_churn"
        }

        fn applies_to(&self, model: &str) -> bool {
            model == "Auto"
        }

        fn assign(&self, _input_path: &Path, rows: usize) -> crate::predictor::OverrideAssignment {
            crate::predictor::OverrideAssignment {
                labels: vec![1; rows],
                target_rate: 1.0,
                seed: 0,
            }
        }
    }

    #[test]
    fn test_custom_override_policy() {
        let (dir, service) = setup(true);
        let service = service.with_overrides(vec![Box::new(AllChurn)]);
        let outcome = service
            .score(&ScoreRequest::new("Auto", dir.path().join("input.csv")))
            .unwrap();
        assert_eq!(outcome.override_applied.as_deref(), Some("all_churn"));
        assert_eq!(outcome.class_distribution.get(&1), Some(&3));
        assert!(outcome.probability_available);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScoringConfig::default();
        config.columns.probability = config.columns.prediction.clone();
        assert_eq!(ScoringService::new(config).err().map(|e| e.kind()), Some("config"));

        let mut config = ScoringConfig::default();
        if let Some(demo) = config.demo_override.as_mut() {
            demo.min_rate = 0.5;
            demo.max_rate = 0.1;
        }
        assert!(ScoringService::new(config).is_err());
    }

    #[test]
    fn test_unknown_model() {
        let (dir, service) = setup(true);
        let err = service
            .score(&ScoreRequest::new("Nope", dir.path().join("input.csv")))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_model");
    }
}

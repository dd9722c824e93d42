//! Scoring configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable prefix (`CHURN__MODELS_DIR`, ...)
pub const ENV_PREFIX: &str = "CHURN";

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Directory holding model artifacts
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// File name of the persisted result table inside the output directory
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,

    /// Accept feature sets guessed from dataset columns
    #[serde(default = "default_true")]
    pub allow_heuristic_features: bool,

    /// Keep loaded models in memory between requests
    #[serde(default = "default_true")]
    pub cache_models: bool,

    /// Model identifier to artifact file name
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,

    /// Synthetic prediction policy for demo deployments
    #[serde(default = "default_demo_override")]
    pub demo_override: Option<DemoOverrideConfig>,

    /// Names of the columns added to the result table
    #[serde(default)]
    pub columns: OutputColumns,
}

/// Settings for the demo churn override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoOverrideConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Model identifier the override applies to
    pub model: String,
    #[serde(default = "default_min_rate")]
    pub min_rate: f64,
    #[serde(default = "default_max_rate")]
    pub max_rate: f64,
}

/// Output column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputColumns {
    #[serde(default = "default_id_column")]
    pub identifier: String,
    #[serde(default = "default_prediction_column")]
    pub prediction: String,
    #[serde(default = "default_probability_column")]
    pub probability: String,
}

impl Default for OutputColumns {
    fn default() -> Self {
        Self {
            identifier: default_id_column(),
            prediction: default_prediction_column(),
            probability: default_probability_column(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_output_file_name() -> String {
    "predicted.csv".to_string()
}

fn default_true() -> bool {
    true
}

fn default_models() -> BTreeMap<String, String> {
    [
        ("General", "catboost_model.cbm"),
        ("Life_Insurance", "life_insurance.cbm"),
        ("Automobile_Insurance", "automobile_insurance.joblib"),
    ]
    .into_iter()
    .map(|(model, file)| (model.to_string(), file.to_string()))
    .collect()
}

fn default_demo_override() -> Option<DemoOverrideConfig> {
    Some(DemoOverrideConfig {
        enabled: true,
        model: "Life_Insurance".to_string(),
        min_rate: default_min_rate(),
        max_rate: default_max_rate(),
    })
}

fn default_min_rate() -> f64 {
    0.20
}

fn default_max_rate() -> f64 {
    0.30
}

fn default_id_column() -> String {
    "User_ID".to_string()
}

fn default_prediction_column() -> String {
    "Predicted_Target".to_string()
}

fn default_probability_column() -> String {
    "churn_probability".to_string()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            output_file_name: default_output_file_name(),
            allow_heuristic_features: true,
            cache_models: true,
            models: default_models(),
            demo_override: default_demo_override(),
            columns: OutputColumns::default(),
        }
    }
}

impl ScoringConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables take precedence over the file, e.g.
    /// `CHURN__MODELS_DIR=/srv/models`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let loaded: ScoringConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that cannot produce a working pipeline
    pub fn validate(&self) -> Result<()> {
        use crate::error::ScoringError;

        if self.output_file_name.trim().is_empty() {
            return Err(ScoringError::Config("output_file_name is empty".into()));
        }
        if let Some(demo) = &self.demo_override {
            if !(0.0..=1.0).contains(&demo.min_rate)
                || !(0.0..=1.0).contains(&demo.max_rate)
                || demo.min_rate > demo.max_rate
            {
                return Err(ScoringError::Config(format!(
                    "demo_override rate range [{}, {}] is invalid",
                    demo.min_rate, demo.max_rate
                )));
            }
        }
        let c = &self.columns;
        if c.identifier == c.prediction
            || c.identifier == c.probability
            || c.prediction == c.probability
        {
            return Err(ScoringError::Config("output column names must be distinct".into()));
        }
        Ok(())
    }

    /// The demo override settings, if present and enabled
    pub fn active_demo_override(&self) -> Option<&DemoOverrideConfig> {
        self.demo_override.as_ref().filter(|d| d.enabled)
    }
}

//! Batch churn scoring library
//!
//! This crate provides the core functionality for:
//! - Locating and decoding model artifacts, with format fallback
//! - Discovering the feature set a model expects
//! - Validating and scoring tabular CSV input
//! - Building and persisting the augmented result table
//! - Metrics and structured logging for the pipeline

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod observability;
pub mod predictor;
pub mod service;

pub use artifact::{ArtifactFormat, ModelCache, ModelLoader, ModelRegistry};
pub use config::ScoringConfig;
pub use dataset::{read_result_table, Dataset};
pub use error::{Result, ScoringError};
pub use observability::{ScoringMetrics, StructuredLogger};
pub use service::{ModelInspection, ScoreRequest, ScoringOutcome, ScoringOutput, ScoringService};

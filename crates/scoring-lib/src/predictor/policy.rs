//! Prediction override policies
//!
//! A policy may replace a model's predicted labels for specific models. The
//! core pipeline only consults the [`PredictionOverride`] trait; whether any
//! policy is installed is a deployment decision made in configuration.

use crate::config::DemoOverrideConfig;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Labels produced by an override policy
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideAssignment {
    pub labels: Vec<i64>,
    /// Fraction of rows the policy aimed to mark positive
    pub target_rate: f64,
    pub seed: u32,
}

impl OverrideAssignment {
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Replaces predicted labels for selected models
pub trait PredictionOverride: Send + Sync {
    /// Policy name used in logs and scoring outcomes
    fn name(&self) -> &str;

    /// Whether the policy applies to a model identifier
    fn applies_to(&self, model: &str) -> bool;

    /// Produce labels for `rows` rows of the input at `input_path`
    fn assign(&self, input_path: &Path, rows: usize) -> OverrideAssignment;
}

/// Synthetic churn assignment for demo deployments
///
/// Output varies between uploaded files but repeats exactly for the same
/// file path: the path's SHA-256 seeds the generator, which draws a churn
/// rate from the configured range and marks that share of rows positive in
/// shuffled order.
#[derive(Debug, Clone)]
pub struct DemoChurnOverride {
    model: String,
    min_rate: f64,
    max_rate: f64,
}

impl DemoChurnOverride {
    pub const NAME: &'static str = "demo_churn";

    pub fn new(model: impl Into<String>, min_rate: f64, max_rate: f64) -> Self {
        Self {
            model: model.into(),
            min_rate,
            max_rate,
        }
    }

    pub fn from_config(config: &DemoOverrideConfig) -> Self {
        Self::new(config.model.clone(), config.min_rate, config.max_rate)
    }

    /// 32-bit seed from the first four bytes of the path's SHA-256
    pub fn seed_for(input_path: &Path) -> u32 {
        let digest = Sha256::digest(input_path.to_string_lossy().as_bytes());
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl PredictionOverride for DemoChurnOverride {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applies_to(&self, model: &str) -> bool {
        self.model.eq_ignore_ascii_case(model)
    }

    fn assign(&self, input_path: &Path, rows: usize) -> OverrideAssignment {
        let seed = Self::seed_for(input_path);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(u64::from(seed));

        let target_rate = if self.max_rate > self.min_rate {
            rng.gen_range(self.min_rate..=self.max_rate)
        } else {
            self.min_rate
        };
        let positives = ((target_rate * rows as f64).round() as usize).min(rows);

        let mut labels: Vec<i64> = (0..rows).map(|i| i64::from(i < positives)).collect();
        labels.shuffle(&mut rng);

        OverrideAssignment {
            labels,
            target_rate,
            seed,
        }
    }
}

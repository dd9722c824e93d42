//! Observability infrastructure for the scoring pipeline
//!
//! Provides:
//! - Prometheus metrics (load latency, scoring latency, rows scored, fallbacks)
//! - Structured event logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<Option<ScoringMetricsInner>> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ScoringMetricsInner {
    model_load_seconds: Histogram,
    scoring_seconds: Histogram,
    rows_scored: IntCounter,
    fallback_loads: IntCounter,
    heuristic_resolutions: IntCounter,
    probability_failures: IntCounter,
    overrides_applied: IntCounter,
    cache_lookups: IntCounterVec,
    scoring_errors: IntCounterVec,
}

impl ScoringMetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            model_load_seconds: register_histogram!(
                "churn_scoring_model_load_seconds",
                "Time spent reading and decoding model artifacts",
                LATENCY_BUCKETS.to_vec()
            )?,
            scoring_seconds: register_histogram!(
                "churn_scoring_request_seconds",
                "End-to-end time of a scoring request",
                LATENCY_BUCKETS.to_vec()
            )?,
            rows_scored: register_int_counter!(
                "churn_scoring_rows_total",
                "Total number of input rows scored"
            )?,
            fallback_loads: register_int_counter!(
                "churn_scoring_fallback_loads_total",
                "Artifacts decoded with the object format after a native bad descriptor"
            )?,
            heuristic_resolutions: register_int_counter!(
                "churn_scoring_heuristic_features_total",
                "Requests whose feature set was guessed from dataset columns"
            )?,
            probability_failures: register_int_counter!(
                "churn_scoring_probability_unavailable_total",
                "Requests scored without a probability column"
            )?,
            overrides_applied: register_int_counter!(
                "churn_scoring_overrides_total",
                "Requests whose labels were replaced by an override policy"
            )?,
            cache_lookups: register_int_counter_vec!(
                "churn_scoring_model_cache_lookups_total",
                "Model cache lookups by result",
                &["result"]
            )?,
            scoring_errors: register_int_counter_vec!(
                "churn_scoring_errors_total",
                "Failed scoring requests by error kind",
                &["kind"]
            )?,
        })
    }
}

/// Scoring metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScoringMetrics {
    _private: (),
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match ScoringMetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register scoring metrics, metrics disabled");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&ScoringMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    pub fn observe_model_load(&self, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.model_load_seconds.observe(duration_secs);
        }
    }

    pub fn observe_scoring(&self, duration_secs: f64, rows: usize) {
        if let Some(m) = self.inner() {
            m.scoring_seconds.observe(duration_secs);
            m.rows_scored.inc_by(rows as u64);
        }
    }

    pub fn inc_fallback_loads(&self) {
        if let Some(m) = self.inner() {
            m.fallback_loads.inc();
        }
    }

    pub fn inc_heuristic_resolutions(&self) {
        if let Some(m) = self.inner() {
            m.heuristic_resolutions.inc();
        }
    }

    pub fn inc_probability_failures(&self) {
        if let Some(m) = self.inner() {
            m.probability_failures.inc();
        }
    }

    pub fn inc_overrides(&self) {
        if let Some(m) = self.inner() {
            m.overrides_applied.inc();
        }
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if let Some(m) = self.inner() {
            let result = if hit { "hit" } else { "miss" };
            m.cache_lookups.with_label_values(&[result]).inc();
        }
    }

    pub fn inc_scoring_errors(&self, kind: &str) {
        if let Some(m) = self.inner() {
            m.scoring_errors.with_label_values(&[kind]).inc();
        }
    }
}

/// Structured logger for scoring events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    /// Log a model load, noting when the fallback format was used
    pub fn log_model_loaded(&self, model: &str, declared: &str, decoded_as: &str, fallback_used: bool, cached: bool) {
        if fallback_used {
            warn!(
                event = "model_loaded",
                service = %self.service,
                model = %model,
                declared_format = %declared,
                decoded_format = %decoded_as,
                fallback_used = true,
                cached = cached,
                "Model artifact decoded with fallback format"
            );
        } else {
            info!(
                event = "model_loaded",
                service = %self.service,
                model = %model,
                declared_format = %declared,
                decoded_format = %decoded_as,
                fallback_used = false,
                cached = cached,
                "Model ready"
            );
        }
    }

    /// Log the resolved feature set
    pub fn log_features_resolved(&self, model: &str, source: &str, count: usize, low_confidence: bool) {
        if low_confidence {
            warn!(
                event = "features_resolved",
                service = %self.service,
                model = %model,
                source = %source,
                count = count,
                low_confidence = true,
                "Feature set guessed from dataset columns, verify against the training schema"
            );
        } else {
            info!(
                event = "features_resolved",
                service = %self.service,
                model = %model,
                source = %source,
                count = count,
                low_confidence = false,
                "Feature set resolved from model"
            );
        }
    }

    /// Log an override policy replacing model labels
    pub fn log_override(&self, model: &str, policy: &str, target_rate: f64, positives: usize, rows: usize) {
        warn!(
            event = "prediction_override",
            service = %self.service,
            model = %model,
            policy = %policy,
            target_rate = target_rate,
            positives = positives,
            rows = rows,
            "Model predictions replaced by override policy"
        );
    }

    /// Log a completed scoring request
    pub fn log_scoring_completed(&self, model: &str, input: &str, rows: usize, probabilities: bool, elapsed_ms: u128) {
        info!(
            event = "scoring_completed",
            service = %self.service,
            model = %model,
            input = %input,
            rows = rows,
            probabilities = probabilities,
            elapsed_ms = elapsed_ms as u64,
            "Scoring request completed"
        );
    }

    /// Log a failed scoring request
    pub fn log_scoring_failed(&self, model: &str, input: &str, kind: &str, error: &str) {
        warn!(
            event = "scoring_failed",
            service = %self.service,
            model = %model,
            input = %input,
            kind = %kind,
            error = %error,
            "Scoring request failed"
        );
    }
}

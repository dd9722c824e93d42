//! Batch scoring command

use anyhow::Result;
use colored::Colorize;
use scoring_lib::predictor::FeatureSource;
use scoring_lib::{ScoreRequest, ScoringOutcome, ScoringOutput, ScoringService};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tabled::Tabled;

use crate::output::{
    class_label, color_flag, format_share, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for the class distribution table
#[derive(Tabled, Serialize)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Share")]
    share: String,
}

/// Machine-readable scoring summary
#[derive(Serialize)]
struct PredictSummary {
    model: String,
    input: PathBuf,
    output: Option<PathBuf>,
    rows: usize,
    features: Vec<String>,
    feature_source: FeatureSource,
    low_confidence: bool,
    fallback_used: bool,
    probability_available: bool,
    override_applied: Option<String>,
    class_distribution: BTreeMap<i64, usize>,
    generated_at: chrono::DateTime<chrono::Utc>,
}

impl PredictSummary {
    fn new(input: PathBuf, outcome: &ScoringOutcome) -> Self {
        Self {
            model: outcome.model.clone(),
            input,
            output: outcome.output.path().map(|p| p.to_path_buf()),
            rows: outcome.rows,
            features: outcome.features.features.names().to_vec(),
            feature_source: outcome.features.source,
            low_confidence: outcome.low_confidence,
            fallback_used: outcome.fallback_used,
            probability_available: outcome.probability_available,
            override_applied: outcome.override_applied.clone(),
            class_distribution: outcome.class_distribution.clone(),
            generated_at: outcome.generated_at,
        }
    }
}

fn source_label(source: FeatureSource) -> &'static str {
    match source {
        FeatureSource::NativeIntrospection => "native artifact",
        FeatureSource::ObjectIntrospection => "estimator object",
        FeatureSource::Heuristic => "dataset columns (heuristic)",
    }
}

/// Score an input file and report the outcome
pub fn predict(
    service: &ScoringService,
    model: &str,
    input: PathBuf,
    output_dir: Option<PathBuf>,
    preview_rows: usize,
    format: OutputFormat,
) -> Result<()> {
    let mut request = ScoreRequest::new(model, input.clone());
    if let Some(dir) = output_dir {
        request = request.with_output_dir(dir);
    }

    let outcome = service.score(&request)?;

    match format {
        OutputFormat::Json => print_json(&PredictSummary::new(input, &outcome)),
        OutputFormat::Table => print_outcome(&outcome, preview_rows),
    }
    Ok(())
}

fn print_outcome(outcome: &ScoringOutcome, preview_rows: usize) {
    println!("{}", "Scoring Summary".bold());
    println!("{}", "=".repeat(50));
    println!("Model:          {}", outcome.model.cyan());
    println!("Rows:           {}", outcome.rows);
    println!(
        "Features:       {} ({})",
        outcome.features.features.len(),
        source_label(outcome.features.source)
    );
    println!("                {}", outcome.features.features.names().join(", ").dimmed());
    println!("Probabilities:  {}", color_flag(outcome.probability_available, false));
    println!("Fallback load:  {}", color_flag(outcome.fallback_used, true));
    println!("Generated:      {}", outcome.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    if outcome.low_confidence {
        print_warning("Feature set was guessed from dataset columns; verify it matches the model's training schema");
    }
    if outcome.fallback_used {
        print_warning("Artifact suffix did not match its encoding; decoded with the object format");
    }
    if !outcome.probability_available {
        print_info("Model did not produce usable probabilities; probability column omitted");
    }
    if let Some(policy) = &outcome.override_applied {
        print_warning(&format!("Predictions replaced by override policy '{}'", policy));
    }

    let rows: Vec<ClassRow> = outcome
        .class_distribution
        .iter()
        .map(|(label, count)| ClassRow {
            class: class_label(*label),
            rows: *count,
            share: format_share(*count, outcome.rows),
        })
        .collect();
    println!("{}", "Class Distribution".bold());
    print_table(&rows, OutputFormat::Table);
    println!();

    match &outcome.output {
        ScoringOutput::Written(path) => {
            print_success(&format!("Results written to {}", path.display()));
        }
        ScoringOutput::Table(table) => {
            println!("{}", "Result Preview".bold());
            println!("{}", table.head(Some(preview_rows)));
            if table.height() > preview_rows {
                println!("\nShowing {} of {} rows", preview_rows, table.height());
            }
        }
    }
}

//! Model registry CLI commands

use anyhow::Result;
use colored::Colorize;
use scoring_lib::ScoringService;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_flag, format_bytes, print_json, print_table, print_warning, short_checksum,
    OutputFormat,
};

/// Row for the models table
#[derive(Tabled, Serialize)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "Present")]
    present: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "SHA-256")]
    checksum: String,
}

/// List registered models and their artifacts
pub fn list_models(service: &ScoringService, format: OutputFormat) -> Result<()> {
    let entries = service.models();

    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Table => {
            println!(
                "{} {}",
                "Models directory:".bold(),
                service.registry().models_dir().display()
            );
            let rows: Vec<ModelRow> = entries
                .iter()
                .map(|e| ModelRow {
                    model: e.model.clone(),
                    file: e.file_name.clone(),
                    format: e
                        .format
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "unsupported".red().to_string()),
                    present: if e.present {
                        "yes".green().to_string()
                    } else {
                        "missing".red().to_string()
                    },
                    size: e.size_bytes.map(format_bytes).unwrap_or_else(|| "-".into()),
                    checksum: e
                        .checksum
                        .as_deref()
                        .map(short_checksum)
                        .unwrap_or_else(|| "-".into()),
                })
                .collect();
            print_table(&rows, OutputFormat::Table);

            let missing = entries.iter().filter(|e| !e.present).count();
            if missing > 0 {
                print_warning(&format!("{} model artifact(s) not found on disk", missing));
            }
        }
    }
    Ok(())
}

/// Load one model and show how its artifact decoded
pub fn inspect_model(service: &ScoringService, model: &str, format: OutputFormat) -> Result<()> {
    let inspection = service.inspect(model)?;

    match format {
        OutputFormat::Json => print_json(&inspection),
        OutputFormat::Table => {
            println!("{}", "Model Details".bold());
            println!("{}", "=".repeat(50));
            println!("Model:            {}", inspection.model.cyan());
            println!("Path:             {}", inspection.path.display());
            println!("Declared format:  {}", inspection.declared_format);
            println!("Decoded as:       {}", inspection.decoded_as);
            println!("Fallback used:    {}", color_flag(inspection.fallback_used, true));
            println!("Family:           {}", inspection.family);
            println!("Probabilities:    {}", color_flag(inspection.probability_supported, false));
            println!("Size:             {}", format_bytes(inspection.size_bytes as u64));
            println!("SHA-256:          {}", inspection.checksum.dimmed());
            println!();

            match &inspection.feature_names {
                Some(names) => {
                    println!("{} ({})", "Features".bold(), names.len());
                    for name in names {
                        println!("  - {}", name);
                    }
                }
                None => print_warning(
                    "Artifact does not record feature names; scoring will guess them from dataset columns",
                ),
            }
        }
    }
    Ok(())
}

//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::FieldFailure;
use ingestion::{RecordValidator, ValidationSummary};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    input_path: String,
    total: usize,
    accepted: usize,
    rejected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rejections: Vec<RejectionEntry>,
}

#[derive(Serialize)]
struct RejectionEntry {
    index: usize,
    reason: String,
    failures: Vec<FieldFailure>,
}

impl ValidationResult {
    fn new(input_path: String, summary: &ValidationSummary) -> Self {
        Self {
            input_path,
            total: summary.total(),
            accepted: summary.accepted.len(),
            rejected: summary.rejected.len(),
            rejections: summary
                .rejected
                .iter()
                .map(|(index, rejection)| RejectionEntry {
                    index: *index,
                    reason: rejection.reason.as_str().to_string(),
                    failures: rejection.failures.clone(),
                })
                .collect(),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(input = %args.input.display(), "Validating records");

    if !args.input.exists() {
        return Err(CliError::input_not_found(args.input.display().to_string()).into());
    }

    let raw = ingestion::load_records_from_path(&args.input)
        .with_context(|| format!("Failed to load records from {}", args.input.display()))?;
    let summary = RecordValidator::new().validate_all(&raw);
    let result = ValidationResult::new(args.input.display().to_string(), &summary);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.rejected == 0 {
        Ok(())
    } else {
        Err(CliError::InvalidRecords {
            rejected: result.rejected,
            total: result.total,
        }
        .into())
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.rejected == 0 {
        println!("✓ All {} record(s) are valid: {}", result.total, result.input_path);
        return;
    }

    println!(
        "✗ {} of {} record(s) rejected: {}",
        result.rejected, result.total, result.input_path
    );
    for entry in &result.rejections {
        println!("\n  #{} ({})", entry.index, entry.reason);
        for failure in &entry.failures {
            println!("    - {failure}");
        }
    }
}

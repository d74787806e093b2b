use std::path::Path;

use bulkship_core::config::LoadOptions;
use bulkship_core::domain::intent::ValidationResult;
use bulkship_core::parsing::LineParser;
use serde::Serialize;

use crate::commands::{load_config, read_input, CommandResult, EXIT_BATCH, EXIT_OK};

#[derive(Debug, Serialize)]
struct ValidationReport {
    total: usize,
    valid: usize,
    rejected: usize,
    results: Vec<ValidationResult>,
}

/// Parses and validates a batch without contacting the provider.
pub fn run(options: &LoadOptions, input: &Path) -> CommandResult {
    let config = match load_config("validate", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let text = match read_input("validate", input) {
        Ok(text) => text,
        Err(result) => return result,
    };

    let results = LineParser::new(config.parsing.policy()).validate_batch(&text);
    let valid = results.iter().filter(|result| result.valid).count();
    let report = ValidationReport {
        total: results.len(),
        valid,
        rejected: results.len() - valid,
        results,
    };

    let exit_code = if report.valid == 0 { EXIT_BATCH } else { EXIT_OK };
    let message = format!("{} of {} records are ready to ship", report.valid, report.total);
    CommandResult::report("validate", message, &report, exit_code)
}

//! `validate` command.
//!
//! Loads every file through the full configuration pipeline and reports
//! all issues. One bad file does not stop the others from being checked.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, RoundKeeperError};

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate configuration files without running a match.
///
/// # Errors
///
/// Returns a validation error if any file fails, or fails strict mode.
pub fn run(args: &ValidateArgs) -> Result<(), RoundKeeperError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| {
            info!(file = %path.display(), "validating configuration");
            check(&loader, path, args.strict)
        })
        .collect();

    match args.format {
        OutputFormat::Human => reports.iter().for_each(print_human),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(ConfigError::ValidationError {
            path: format!("{failed} of {} file(s)", reports.len()),
            errors: Vec::new(),
        }
        .into());
    }
    Ok(())
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(loaded) => {
            let warnings: Vec<String> = loaded.warnings.iter().map(ToString::to_string).collect();
            FileReport {
                file,
                valid: !(strict && !warnings.is_empty()),
                errors: Vec::new(),
                warnings,
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => FileReport {
            file,
            valid: false,
            errors: errors.iter().map(ToString::to_string).collect(),
            warnings: Vec::new(),
        },
        Err(e) => FileReport {
            file,
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}

fn print_human(report: &FileReport) {
    let verdict = if report.valid { "ok" } else { "FAIL" };
    println!("{verdict:<4} {}", report.file);
    for error in &report.errors {
        println!("     {error}");
    }
    for warning in &report.warnings {
        println!("     warning: {warning}");
    }
}

use std::path::Path;

use saga_core::Registry;
use serde::Serialize;

use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

use super::config::load_config;

#[derive(Serialize)]
struct ValidateResult {
    valid: bool,
    format: String,
    sagas: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

/// Registers every saga, continuing past invalid ones so all problems are reported.
pub async fn validate_cmd(path: &Path, output: OutputArgs) -> i32 {
    let parsed = match load_config(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let registry = Registry::new();
    let mut errors = Vec::new();
    for saga in parsed.config.sagas {
        if let Err(err) = registry.register(saga) {
            errors.extend(
                err.violations
                    .iter()
                    .map(|v| format!("{}: {}: {}", err.saga, v.path, v.message)),
            );
        }
    }

    let result = ValidateResult {
        valid: errors.is_empty(),
        format: format!("{:?}", parsed.format),
        sagas: registry.names(),
        errors,
    };

    if output.format != OutputFormat::Json && !output.quiet {
        if result.valid {
            println!(
                "ok: {} saga(s) valid ({})",
                result.sagas.len(),
                result.format
            );
        } else {
            eprintln!("error: validation failed");
            for e in &result.errors {
                eprintln!("- {e}");
            }
        }
    } else {
        print_result(output.format, output.quiet, &result);
    }

    if result.valid {
        exit_codes::SUCCESS
    } else {
        exit_codes::VALIDATION_FAILED
    }
}

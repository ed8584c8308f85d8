//! `validate` command handler.

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::cli::print_issue_block;
use crate::error::{RangeforgeError, Result};
use crate::validator;

/// Validates a scenario file.
///
/// # Errors
///
/// Returns a stage failure when validation reported errors (or, under
/// `--strict`, warnings); exits cleanly otherwise.
pub fn run(args: &ValidateArgs) -> Result<()> {
    let scenario = super::load_for_command(&args.scenario)?;
    let result = validator::validate(&scenario);

    let strict_failure = args.strict && result.has_warnings();
    let failed = result.has_errors() || strict_failure;

    match args.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": args.scenario.display().to_string(),
                "valid": !failed,
                "errors": result.errors,
                "warnings": result.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?);
        }
        OutputFormat::Human => {
            if failed {
                println!("INVALID: Errors found");
            } else {
                println!("VALID: Scenario passed validation");
            }
            print_issue_block("Errors", &result.errors);
            print_issue_block("Warnings", &result.warnings);
            if strict_failure && !result.has_errors() {
                println!("(strict mode: warnings are treated as errors)");
            }
        }
    }

    if failed {
        let count = result.errors.len().max(1);
        return Err(RangeforgeError::StageFailed {
            stage: "validation",
            count,
        });
    }
    Ok(())
}

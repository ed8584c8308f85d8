//! Command handlers.

pub mod plan;
pub mod provision;
pub mod validate;

use std::path::Path;

use crate::cli::print_issue_block;
use crate::error::{RangeforgeError, Result, ScenarioError};
use crate::scenario::{self, schema::Scenario};

/// Loads a scenario for a command.
///
/// Decode failures are the validator's schema-error surface: they are
/// printed as a single grouped error and mapped to a stage failure so the
/// process exits nonzero without a second error line.
pub(crate) fn load_for_command(path: &Path) -> Result<Scenario> {
    match scenario::load_scenario(path) {
        Ok(scenario) => Ok(scenario),
        Err(error @ (ScenarioError::Json(_) | ScenarioError::Yaml(_))) => {
            println!("INVALID: Errors found");
            print_issue_block("Errors", &[&error]);
            Err(RangeforgeError::StageFailed {
                stage: "validation",
                count: 1,
            })
        }
        Err(error) => Err(error.into()),
    }
}

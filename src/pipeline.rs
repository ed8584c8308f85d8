//! Stage gating: validate, then plan.
//!
//! Glues the validator and planner together so a deployment plan is only
//! produced for a valid scenario. Warnings never gate; they travel with
//! the stage results for the caller to print.

use crate::planner::{self, Plan};
use crate::scenario::schema::Scenario;
use crate::validator::{self, ValidationResult};

/// Validates a scenario and, if valid, produces a plan.
///
/// Returns the validation result together with the plan; the plan is
/// `None` when validation reported errors.
#[must_use]
pub fn validate_and_plan(scenario: &Scenario) -> (ValidationResult, Option<Plan>) {
    let validation = validator::validate(scenario);
    if !validation.is_valid() {
        return (validation, None);
    }
    (validation, Some(planner::plan(scenario)))
}

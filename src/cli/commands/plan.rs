//! `plan` command handler.

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::print_issue_block;
use crate::error::{RangeforgeError, Result};
use crate::pipeline;

/// Plans deployment order and resources for a scenario.
///
/// # Errors
///
/// Returns a stage failure when validation or planning reported errors.
pub fn run(args: &PlanArgs) -> Result<()> {
    let scenario = super::load_for_command(&args.scenario)?;

    let (validation, plan) = pipeline::validate_and_plan(&scenario);
    let Some(plan) = plan else {
        print_issue_block("Errors", &validation.errors);
        print_issue_block("Warnings", &validation.warnings);
        return Err(RangeforgeError::StageFailed {
            stage: "validation",
            count: validation.errors.len(),
        });
    };

    match args.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "ordered_hosts": plan.ordered_hosts,
                "network_topology": plan.network_topology,
                "resource_allocation": plan.resource_allocation,
                "errors": plan.errors,
                "warnings": plan.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?);
        }
        OutputFormat::Human => {
            if plan.is_successful() {
                println!("Deployment order:");
                for (index, host_id) in plan.ordered_hosts.iter().enumerate() {
                    println!("  {}. {host_id}", index + 1);
                }
            }
            print_issue_block("Errors", &plan.errors);
            print_issue_block("Warnings", &plan.warnings);
        }
    }

    if !plan.is_successful() {
        return Err(RangeforgeError::StageFailed {
            stage: "planning",
            count: plan.errors.len(),
        });
    }
    Ok(())
}

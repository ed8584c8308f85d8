//! `provision` command handler.

use std::sync::Arc;

use crate::cli::args::ProvisionArgs;
use crate::cli::print_issue_block;
use crate::error::{RangeforgeError, Result};
use crate::observability::events::EventEmitter;
use crate::observability::init_metrics;
use crate::pipeline;
use crate::provisioner::{
    self, DockerCliExecutor, Executor, PolicyEngine, ProvisionOptions, SecurityProfile,
};

/// Provisions a scenario, dry-run unless `--execute` is given.
///
/// # Errors
///
/// Returns a stage failure when validation, planning, or provisioning
/// reported errors, or an executor error when the runtime is unreachable.
pub async fn run(args: &ProvisionArgs) -> Result<()> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let scenario = super::load_for_command(&args.scenario)?;

    let (validation, plan) = pipeline::validate_and_plan(&scenario);
    for warning in &validation.warnings {
        tracing::warn!("{warning}");
    }
    let Some(plan) = plan else {
        print_issue_block("Errors", &validation.errors);
        return Err(RangeforgeError::StageFailed {
            stage: "validation",
            count: validation.errors.len(),
        });
    };

    if !plan.is_successful() {
        print_issue_block("Errors", &plan.errors);
        print_issue_block("Warnings", &plan.warnings);
        return Err(RangeforgeError::StageFailed {
            stage: "planning",
            count: plan.errors.len(),
        });
    }

    // Preflight: when executing, the runtime must be reachable before any
    // operation is attempted.
    let runtime: Option<Arc<dyn Executor>> = if args.execute {
        let executor = DockerCliExecutor::new(&args.runtime);
        if let Err(error) = executor.ensure_available().await {
            println!("Container runtime does not appear to be running or accessible.");
            println!("- Start the runtime daemon and wait until it reports ready.");
            println!("- Or point --runtime / RANGEFORGE_RUNTIME at a reachable binary.");
            println!("- You can re-run without --execute for a safe dry-run.");
            return Err(error.into());
        }
        Some(Arc::new(executor))
    } else {
        None
    };

    let event_emitter = match &args.events_file {
        Some(path) => {
            let emitter = Arc::new(EventEmitter::to_file(path)?);
            tracing::info!(events = %path.display(), session = emitter.session_id(), "recording deployment events");
            Some(emitter)
        }
        None => None,
    };

    let options = ProvisionOptions {
        dry_run: !args.execute,
        isolate: args.isolate,
        idempotent_mode: args.idempotent_mode,
        parallel: args.parallel,
        max_workers: args.max_workers,
        health_timeout: args.health_timeout,
        policy_engine: args
            .policy_tier
            .map(|tier| PolicyEngine::default().with_default_tier(tier.into())),
        security_profile: args.security_profile.map(SecurityProfile::builtin),
        event_emitter,
        ..ProvisionOptions::default()
    };

    let result = provisioner::provision(&plan, &scenario, &options, runtime).await;

    println!("Operations:");
    for op in &result.operations {
        if op.cmd.is_empty() {
            println!("- {}: {}", op.kind, op.target());
        } else {
            println!("- {}: {}", op.kind, op.display_cmd());
        }
    }
    print_issue_block("Errors", &result.errors);
    print_issue_block("Warnings", &plan.warnings);

    if !result.is_successful() {
        return Err(RangeforgeError::StageFailed {
            stage: "provisioning",
            count: result.errors.len(),
        });
    }
    Ok(())
}

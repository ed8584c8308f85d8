//! Provisioning: plan → operation stream → runtime execution.
//!
//! The provisioner translates a [`Plan`] into a typed operation stream,
//! reconciles it against live state when an executor is available
//! (skip or replace), and executes it either sequentially or in
//! dependency-depth waves. Without an executor the stream is returned
//! as-is (dry run) and nothing is assumed to exist.
//!
//! Execution never aborts on the first failure: every operation is
//! attempted and errors accumulate into the result for the operator to
//! read.

pub mod executor;
pub mod ops;
pub mod policy;
pub mod security;
mod waves;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::observability::events::{Event, EventEmitter, now};
use crate::observability::metrics;
use crate::planner::Plan;
use crate::scenario::schema::{HostResources, Scenario};

pub use executor::{DockerCliExecutor, ExecOutput, Executor, HealthStatus};
pub use ops::{EffectiveLimits, OpKind, Operation, OperationArgs};
pub use policy::{DifficultyTier, PolicyEngine, ResourceLimits, ResourcePolicy};
pub use security::{SecurityLevel, SecurityProfile};
pub use waves::ContainerState;

/// Default concurrency cap per wave.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default budget for one container to become healthy.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between health polls.
pub const DEFAULT_HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

// ============================================================================
// Options and result
// ============================================================================

/// Policy when a resource already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IdempotentMode {
    /// Keep the existing resource and emit a `*.skip` no-op.
    #[default]
    Skip,
    /// Delete the existing resource, then recreate it.
    Replace,
}

/// Options controlling one provisioning invocation.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Emit the operation stream without executing it.
    pub dry_run: bool,
    /// Apply the legacy minimal hardening set to every container.
    pub isolate: bool,
    /// Reconciliation policy for existing resources.
    pub idempotent_mode: IdempotentMode,
    /// Execute container waves concurrently.
    pub parallel: bool,
    /// Concurrency cap per wave.
    pub max_workers: usize,
    /// Budget for one container to become healthy.
    pub health_timeout: Duration,
    /// Interval between health polls.
    pub health_poll_interval: Duration,
    /// Resource policy engine; when absent, host-declared limits apply.
    pub policy_engine: Option<PolicyEngine>,
    /// Security profile; overrides scenario metadata and `isolate`.
    pub security_profile: Option<SecurityProfile>,
    /// Structured event sink for the run.
    pub event_emitter: Option<Arc<EventEmitter>>,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            isolate: false,
            idempotent_mode: IdempotentMode::Skip,
            parallel: false,
            max_workers: DEFAULT_MAX_WORKERS,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            health_poll_interval: DEFAULT_HEALTH_POLL_INTERVAL,
            policy_engine: None,
            security_profile: None,
            event_emitter: None,
        }
    }
}

/// Result of one provisioning invocation.
#[derive(Debug, Default)]
pub struct ProvisionResult {
    /// The full operation stream, in emission order.
    pub operations: Vec<Operation>,
    /// Accumulated errors; execution does not abort on the first.
    pub errors: Vec<String>,
}

impl ProvisionResult {
    /// `true` when no errors were accumulated.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Provisions a planned scenario.
///
/// Emits the typed operation stream and, when `dry_run` is off and an
/// executor is supplied, drives it against the runtime - sequentially or
/// in dependency waves.
pub async fn provision(
    plan: &Plan,
    scenario: &Scenario,
    options: &ProvisionOptions,
    runtime: Option<Arc<dyn Executor>>,
) -> ProvisionResult {
    let mut errors = Vec::new();
    let live = runtime.as_deref().filter(|_| !options.dry_run);

    if let Some(emitter) = &options.event_emitter {
        emitter.emit(&Event::RunStarted {
            timestamp: now(),
            scenario: scenario.metadata.name.clone(),
            dry_run: options.dry_run,
            parallel: options.parallel,
        });
    }

    let stream = emit_operations(plan, scenario, options, live, &mut errors).await;

    let flat = stream.flatten();

    if let Some(runtime) = runtime.filter(|_| !options.dry_run) {
        let context = ExecContext {
            executor: runtime,
            health_timeout: options.health_timeout,
            health_poll_interval: options.health_poll_interval,
            events: options.event_emitter.clone(),
            states: Arc::new(DashMap::new()),
        };

        if options.parallel {
            let mut wave_errors =
                waves::execute(scenario, stream, options.max_workers, &context).await;
            errors.append(&mut wave_errors);
        } else {
            for op in &flat {
                if let Some(error) = context.execute_op(op).await {
                    errors.push(error);
                }
            }
        }
    }

    if let Some(emitter) = &options.event_emitter {
        emitter.emit(&Event::RunCompleted {
            timestamp: now(),
            operations: flat.len(),
            errors: errors.len(),
        });
    }

    ProvisionResult {
        operations: flat,
        errors,
    }
}

// ============================================================================
// Emission
// ============================================================================

/// The operation stream, grouped for wave scheduling.
pub(crate) struct OperationStream {
    /// Wave 0: every `network.*` operation, in declaration order.
    pub network_ops: Vec<Operation>,
    /// Per-host container operations (remove/run/skip/wait), in plan order.
    pub host_groups: Vec<waves::HostOps>,
    /// Final wave: every `network.connect`, in emission order.
    pub connect_ops: Vec<Operation>,
}

impl OperationStream {
    /// Flattens to the canonical stream order: networks, then each host's
    /// operations immediately followed by its connects.
    fn flatten(&self) -> Vec<Operation> {
        let mut flat = self.network_ops.clone();
        for group in &self.host_groups {
            flat.extend(group.ops.iter().cloned());
            flat.extend(
                self.connect_ops
                    .iter()
                    .filter(|op| waves::connect_container(op) == Some(group.host_id.as_str()))
                    .cloned(),
            );
        }
        flat
    }
}

async fn emit_operations(
    plan: &Plan,
    scenario: &Scenario,
    options: &ProvisionOptions,
    live: Option<&dyn Executor>,
    errors: &mut Vec<String>,
) -> OperationStream {
    let mut network_ops = Vec::new();
    let mut host_groups = Vec::new();
    let mut connect_ops = Vec::new();

    // Networks must exist before any container references them.
    for (network_id, network_plan) in &plan.network_topology {
        let subnet = network_plan.subnet.as_deref();
        let exists = match live {
            Some(executor) => probe_network(executor, network_id, errors).await,
            None => false,
        };

        if exists {
            match options.idempotent_mode {
                IdempotentMode::Skip => {
                    network_ops.push(ops::network_create_skip(network_id, subnet));
                    continue;
                }
                IdempotentMode::Replace => {
                    network_ops.push(ops::network_remove(network_id));
                }
            }
        }
        network_ops.push(ops::network_create(network_id, subnet));
    }

    let security_flags = resolve_security_flags(scenario, options, errors);
    let hardened = !security_flags.is_empty();
    let policy = options
        .policy_engine
        .as_ref()
        .map(|engine| engine.policy_for(&scenario.metadata));

    for host_id in &plan.ordered_hosts {
        let Some(host) = scenario.host(host_id) else {
            errors.push(format!("Plan references unknown host '{host_id}'"));
            continue;
        };
        if host.networks.is_empty() {
            errors.push(format!("Host '{host_id}' has no networks in scenario"));
            continue;
        }

        let declared = host.resources.clone().unwrap_or_default();
        let limits = match (&options.policy_engine, &policy) {
            (Some(engine), Some(policy)) => {
                if let Err(violations) = engine.validate_limits(&declared, policy) {
                    tracing::warn!(host = %host_id, policy = %policy.name, "{violations}");
                }
                effective_limits(&engine.apply(&declared, policy))
            }
            _ => effective_limits(&declared),
        };

        let binding = Vec::new();
        let ports = plan
            .resource_allocation
            .get(host_id)
            .map_or(&binding, |allocation| &allocation.ports);

        let primary = &host.networks[0];
        let run = ops::container_run(
            host,
            &primary.network_id,
            primary.ip_address.as_deref(),
            ports,
            &limits,
            &security_flags,
            hardened,
        );

        let exists = match live {
            Some(executor) => probe_container(executor, host_id, errors).await,
            None => false,
        };

        let mut group = Vec::new();
        let mut created = true;
        if exists {
            match options.idempotent_mode {
                IdempotentMode::Skip => {
                    group.push(ops::container_run_skip(&run));
                    created = false;
                }
                IdempotentMode::Replace => {
                    group.push(ops::container_remove(host_id));
                    group.push(run);
                }
            }
        } else {
            group.push(run);
        }

        if created && host.healthcheck.is_some() {
            group.push(ops::healthcheck_wait(
                host_id,
                options.health_timeout.as_secs(),
            ));
        }

        // A skipped container keeps its existing attachments; only a
        // created (or replaced) one needs its extra networks connected.
        if created {
            for extra in &host.networks[1..] {
                connect_ops.push(ops::network_connect(
                    host_id,
                    &extra.network_id,
                    extra.ip_address.as_deref(),
                ));
            }
        }

        host_groups.push(waves::HostOps {
            host_id: host_id.clone(),
            ops: group,
        });
    }

    OperationStream {
        network_ops,
        host_groups,
        connect_ops,
    }
}

async fn probe_network(executor: &dyn Executor, id: &str, errors: &mut Vec<String>) -> bool {
    match executor::network_exists(executor, id).await {
        Ok(exists) => exists,
        Err(error) => {
            errors.push(format!("Execution error for network.create: {error}"));
            false
        }
    }
}

async fn probe_container(executor: &dyn Executor, name: &str, errors: &mut Vec<String>) -> bool {
    match executor::container_exists(executor, name).await {
        Ok(exists) => exists,
        Err(error) => {
            errors.push(format!("Execution error for container.run: {error}"));
            false
        }
    }
}

/// Resolves the hardening flag set: explicit option, then scenario
/// metadata, then the legacy `isolate` switch.
fn resolve_security_flags(
    scenario: &Scenario,
    options: &ProvisionOptions,
    errors: &mut Vec<String>,
) -> Vec<String> {
    if let Some(profile) = &options.security_profile {
        return profile.to_flags();
    }

    if let Some(name) = &scenario.metadata.security_profile {
        match SecurityProfile::by_name(name) {
            Ok(profile) => return profile.to_flags(),
            Err(error) => errors.push(error),
        }
    }

    if options.isolate {
        return SecurityProfile::builtin(SecurityLevel::Minimal).to_flags();
    }

    Vec::new()
}

fn effective_limits(resources: &HostResources) -> EffectiveLimits {
    EffectiveLimits {
        cpu: resources.cpu_limit.clone(),
        memory: resources.memory_limit.clone(),
        disk: resources.disk_limit.clone(),
        pids: resources.pids_limit,
    }
}

// ============================================================================
// Execution context
// ============================================================================

/// Shared execution state: the runtime handle, health budgets, the event
/// sink, and the per-container state map.
#[derive(Clone)]
pub(crate) struct ExecContext {
    pub executor: Arc<dyn Executor>,
    pub health_timeout: Duration,
    pub health_poll_interval: Duration,
    pub events: Option<Arc<EventEmitter>>,
    pub states: Arc<DashMap<String, ContainerState>>,
}

impl ExecContext {
    /// Executes one operation; returns an accumulated error on failure.
    pub(crate) async fn execute_op(&self, op: &Operation) -> Option<String> {
        let target = op.target().to_string();

        if op.kind.is_skip() {
            tracing::debug!(op = %op.kind, %target, "resource exists, skipping");
            metrics::record_skip(op.kind.as_str());
            if op.kind == OpKind::ContainerRunSkip {
                self.transition(&target, ContainerState::Running);
            }
            if let Some(emitter) = &self.events {
                emitter.emit(&Event::OperationSkipped {
                    timestamp: now(),
                    op_type: op.kind.as_str().to_string(),
                    target,
                });
            }
            return None;
        }

        if op.kind == OpKind::HealthcheckWait {
            return self.wait_healthy(&target).await;
        }

        if op.kind == OpKind::ContainerRun {
            self.transition(&target, ContainerState::Creating);
        }

        let result = self.run_command(op).await;
        let success = result.is_none();
        metrics::record_operation(op.kind.as_str(), success);
        match op.kind {
            OpKind::ContainerRun => self.transition(
                &target,
                if success {
                    ContainerState::Running
                } else {
                    ContainerState::Failed
                },
            ),
            OpKind::NetworkConnect if success => {
                self.transition(&target, ContainerState::Connected);
            }
            _ => {}
        }
        if let Some(emitter) = &self.events {
            emitter.emit(&Event::OperationExecuted {
                timestamp: now(),
                op_type: op.kind.as_str().to_string(),
                target,
                success,
            });
        }
        result
    }

    async fn run_command(&self, op: &Operation) -> Option<String> {
        match self.executor.exec(&op.cmd).await {
            Ok(output) if output.success() => {
                tracing::debug!(op = %op.kind, "operation succeeded");
                None
            }
            Ok(output) => Some(format!(
                "Command failed ({}): {} :: {}",
                op.kind,
                op.cmd.join(" "),
                output.diagnostic()
            )),
            Err(error) => Some(format!("Execution error for {}: {error}", op.kind)),
        }
    }

    async fn wait_healthy(&self, container: &str) -> Option<String> {
        let started = std::time::Instant::now();
        let result = executor::wait_for_healthy(
            self.executor.as_ref(),
            container,
            self.health_timeout,
            self.health_poll_interval,
        )
        .await;

        let healthy = result.is_ok();
        metrics::record_health_wait(started.elapsed(), healthy);
        self.transition(
            container,
            if healthy {
                ContainerState::Healthy
            } else {
                ContainerState::Failed
            },
        );
        if let Some(emitter) = &self.events {
            emitter.emit(&Event::HealthWait {
                timestamp: now(),
                container: container.to_string(),
                healthy,
                waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
        result.err()
    }

    pub(crate) fn transition(&self, container: &str, state: ContainerState) {
        self.states.insert(container.to_string(), state);
        if let Some(emitter) = &self.events {
            emitter.emit(&Event::StateChanged {
                timestamp: now(),
                container: container.to_string(),
                state: state.as_str().to_string(),
            });
        }
    }
}


// ============================================================================
// Tests
// ============================================================================

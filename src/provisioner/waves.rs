//! Parallel wave scheduler.
//!
//! Execution proceeds in three phases: all `network.*` operations serially
//! (wave 0), container operations grouped into waves by dependency depth
//! and run concurrently within each wave, then all `network.connect`
//! operations serially once every container is up.
//!
//! Within a wave at most `min(wave_size, max_workers)` workers run at
//! once. A wave fully drains before the next begins; a failing host is an
//! error sink that never aborts its siblings or the following waves.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::observability::metrics;
use crate::provisioner::ops::{Operation, OperationArgs};
use crate::provisioner::{ExecContext, OperationStream};
use crate::scenario::schema::Scenario;

/// Lifecycle state of one container during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Not yet created.
    Absent,
    /// Run command in flight.
    Creating,
    /// Created and started.
    Running,
    /// Healthcheck satisfied (or none defined).
    Healthy,
    /// Attached to its extra networks.
    Connected,
    /// Fully provisioned.
    Done,
    /// An operation for this container failed; terminal.
    Failed,
}

impl ContainerState {
    /// Lowercase state name for logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Healthy => "healthy",
            Self::Connected => "connected",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// One host's container operations (remove/run/skip, then wait).
#[derive(Debug, Clone)]
pub(crate) struct HostOps {
    /// The host these operations belong to.
    pub host_id: String,
    /// Operations in execution order.
    pub ops: Vec<Operation>,
}

/// The container a `network.connect` operation attaches.
pub(crate) fn connect_container(op: &Operation) -> Option<&str> {
    match &op.args {
        OperationArgs::Connect(args) => Some(args.container.as_str()),
        _ => None,
    }
}

/// Executes the stream in waves and returns the accumulated errors.
pub(crate) async fn execute(
    scenario: &Scenario,
    stream: OperationStream,
    max_workers: usize,
    context: &ExecContext,
) -> Vec<String> {
    let mut errors = Vec::new();

    // Wave 0: networks, serial and in order.
    for op in &stream.network_ops {
        if let Some(error) = context.execute_op(op).await {
            errors.push(error);
        }
    }

    // Container waves by dependency depth.
    let depths = dependency_depths(scenario);
    let mut waves: BTreeMap<usize, Vec<HostOps>> = BTreeMap::new();
    for group in stream.host_groups {
        let depth = depths.get(group.host_id.as_str()).copied().unwrap_or(0);
        waves.entry(depth).or_default().push(group);
    }

    for (depth, wave) in waves {
        let started = Instant::now();
        let wave_size = wave.len();
        let workers = max_workers.min(wave_size).max(1);
        tracing::info!(depth, hosts = wave_size, workers, "starting wave");

        let semaphore = Arc::new(Semaphore::new(workers));
        let shared_errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();

        for group in wave {
            let context = context.clone();
            let semaphore = Arc::clone(&semaphore);
            let shared_errors = Arc::clone(&shared_errors);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("wave semaphore closed");
                for op in &group.ops {
                    if let Some(error) = context.execute_op(op).await {
                        shared_errors.lock().expect("errors poisoned").push(error);
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                errors.push(format!("Provisioning worker panicked: {error}"));
            }
        }

        errors.append(&mut shared_errors.lock().expect("errors poisoned"));
        metrics::record_wave(started.elapsed(), wave_size);
        tracing::info!(depth, elapsed_ms = started.elapsed().as_millis() as u64, "wave complete");
    }

    // Final wave: connects, serial, after every container is running.
    for op in &stream.connect_ops {
        if let Some(error) = context.execute_op(op).await {
            errors.push(error);
        }
    }

    // Everything that did not fail is done.
    let finished: Vec<String> = context
        .states
        .iter()
        .filter(|entry| *entry.value() != ContainerState::Failed)
        .map(|entry| entry.key().clone())
        .collect();
    for container in finished {
        context.transition(&container, ContainerState::Done);
    }

    errors
}

/// Computes `depth(h) = 0` for dependency-free hosts, else
/// `1 + max(depth(dep))`.
///
/// Unknown dependencies are ignored and back-edges are treated as depth 0;
/// the planner has already rejected both, this is purely defensive.
fn dependency_depths(scenario: &Scenario) -> HashMap<&str, usize> {
    let mut depths = HashMap::new();
    let mut visiting = HashSet::new();
    for host in &scenario.hosts {
        depth_of(scenario, &host.id, &mut depths, &mut visiting);
    }
    depths
}

fn depth_of<'a>(
    scenario: &'a Scenario,
    host_id: &str,
    depths: &mut HashMap<&'a str, usize>,
    visiting: &mut HashSet<String>,
) -> usize {
    if let Some(host) = scenario.host(host_id) {
        if let Some(&depth) = depths.get(host.id.as_str()) {
            return depth;
        }
        if !visiting.insert(host.id.clone()) {
            return 0;
        }

        let depth = host
            .depends_on
            .iter()
            .filter(|dep| scenario.host(dep).is_some())
            .map(|dep| depth_of(scenario, dep, depths, visiting) + 1)
            .max()
            .unwrap_or(0);

        visiting.remove(host_id);
        depths.insert(host.id.as_str(), depth);
        depth
    } else {
        0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::parse_scenario;

    fn scenario(hosts_json: &str) -> Scenario {
        parse_scenario(&format!(
            r#"{{
                "metadata": {{"name": "waves"}},
                "networks": [{{"id": "net_a", "name": "a", "type": "bridge",
                               "subnet": "10.0.0.0/24"}}],
                "hosts": {hosts_json},
                "flags": []
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn depths_for_chain_and_independents() {
        let sc = scenario(
            r#"[
            {"id": "host_db", "name": "d", "type": "db"},
            {"id": "host_web", "name": "w", "type": "web", "depends_on": ["host_db"]},
            {"id": "host_app", "name": "a", "type": "custom", "depends_on": ["host_web"]},
            {"id": "host_cache", "name": "c", "type": "custom"}
        ]"#,
        );
        let depths = dependency_depths(&sc);
        assert_eq!(depths["host_db"], 0);
        assert_eq!(depths["host_web"], 1);
        assert_eq!(depths["host_app"], 2);
        assert_eq!(depths["host_cache"], 0);
    }

    #[test]
    fn depth_takes_deepest_dependency() {
        let sc = scenario(
            r#"[
            {"id": "host_a", "name": "a", "type": "db"},
            {"id": "host_b", "name": "b", "type": "web", "depends_on": ["host_a"]},
            {"id": "host_c", "name": "c", "type": "custom",
             "depends_on": ["host_a", "host_b"]}
        ]"#,
        );
        let depths = dependency_depths(&sc);
        assert_eq!(depths["host_c"], 2);
    }

    #[test]
    fn dependency_cycle_does_not_hang_depths() {
        let sc = scenario(
            r#"[
            {"id": "host_a", "name": "a", "type": "custom", "depends_on": ["host_b"]},
            {"id": "host_b", "name": "b", "type": "custom", "depends_on": ["host_a"]}
        ]"#,
        );
        let depths = dependency_depths(&sc);
        assert!(depths.contains_key("host_a"));
        assert!(depths.contains_key("host_b"));
    }

    #[test]
    fn container_state_names() {
        assert_eq!(ContainerState::Creating.as_str(), "creating");
        assert_eq!(ContainerState::Failed.as_str(), "failed");
    }
}

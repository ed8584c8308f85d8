//! Shared integration-test harness: scenario builders and a scripted
//! runtime executor for driving the provisioner without a container
//! daemon.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rangeforge::error::ExecutorError;
use rangeforge::provisioner::{ExecOutput, Executor};
use rangeforge::scenario::{Scenario, parse_scenario};

/// S1-style minimal scenario: one network, a web host with a flag, and an
/// attacker.
pub fn minimal_scenario() -> Scenario {
    parse_scenario(
        r#"{
        "metadata": {"name": "Minimal Lab", "version": "1.0.0", "difficulty": "easy",
                     "author": "tests", "description": "minimal"},
        "networks": [
            {"id": "net_dmz", "name": "dmz", "type": "custom_bridge",
             "subnet": "172.20.0.0/24"}
        ],
        "hosts": [
            {"id": "host_web", "name": "web", "type": "web",
             "base_image": "nginx:alpine",
             "networks": [{"network_id": "net_dmz", "ip_address": "172.20.0.20"}],
             "resources": {"cpu_limit": "1.0", "memory_limit": "512m"},
             "flags": ["flag_web"]},
            {"id": "host_attacker", "name": "kali", "type": "attacker",
             "base_image": "kalilinux/kali-rolling",
             "networks": [{"network_id": "net_dmz", "ip_address": "172.20.0.10"}]}
        ],
        "flags": [
            {"id": "flag_web", "name": "web flag", "value": "FLAG{minimal}", "points": 25,
             "placement": {"type": "file", "host_id": "host_web",
                           "details": {"path": "/var/www/flag.txt"}}}
        ]
    }"#,
    )
    .expect("minimal scenario parses")
}

/// Dependency-rich scenario: db <- web (two networks, healthchecks),
/// an independent cache, and an attacker.
pub fn complex_scenario() -> Scenario {
    parse_scenario(
        r#"{
        "metadata": {"name": "Complex Lab", "version": "1.0.0", "difficulty": "medium",
                     "author": "tests", "description": "complex"},
        "networks": [
            {"id": "net_dmz", "name": "dmz", "type": "custom_bridge",
             "subnet": "172.30.0.0/24"},
            {"id": "net_internal", "name": "internal", "type": "custom_bridge",
             "subnet": "172.31.0.0/24"}
        ],
        "services": [
            {"id": "svc_web", "name": "nginx", "type": "nginx", "version": "1",
             "ports": [{"internal": 80, "external": 8080, "protocol": "tcp"}]},
            {"id": "svc_db", "name": "mysql", "type": "mysql", "version": "8",
             "ports": [{"internal": 3306, "protocol": "tcp"}]}
        ],
        "hosts": [
            {"id": "host_db", "name": "db", "type": "db", "base_image": "mysql:8",
             "networks": [{"network_id": "net_internal", "ip_address": "172.31.0.30"}],
             "services": ["svc_db"],
             "resources": {"cpu_limit": "2.0", "memory_limit": "1g", "disk_limit": "10G"},
             "restart_policy": "unless-stopped",
             "healthcheck": {"test": "mysqladmin ping -h localhost", "interval": "10s",
                             "timeout": "5s", "retries": 3, "start_period": "30s"},
             "env": {"MYSQL_ROOT_PASSWORD": "rootpass", "MYSQL_DATABASE": "appdb"}},
            {"id": "host_web", "name": "web", "type": "web", "base_image": "nginx:alpine",
             "networks": [
                 {"network_id": "net_dmz", "ip_address": "172.30.0.20"},
                 {"network_id": "net_internal", "ip_address": "172.31.0.20"}
             ],
             "services": ["svc_web"],
             "depends_on": ["host_db"],
             "resources": {"cpu_limit": "1.0", "memory_limit": "512m"},
             "restart_policy": "always",
             "healthcheck": {"test": "wget -q --spider http://localhost/ || exit 1",
                             "interval": "15s", "timeout": "3s", "retries": 2},
             "volumes": [{"source": "/host/web", "target": "/usr/share/nginx/html"}],
             "flags": ["flag_web"]},
            {"id": "host_cache", "name": "cache", "type": "custom",
             "base_image": "redis:alpine",
             "networks": [{"network_id": "net_internal", "ip_address": "172.31.0.40"}],
             "resources": {"cpu_limit": "0.5", "memory_limit": "256m"},
             "restart_policy": "on-failure"},
            {"id": "host_attacker", "name": "attacker", "type": "attacker",
             "base_image": "kalilinux/kali-rolling",
             "networks": [{"network_id": "net_dmz", "ip_address": "172.30.0.10"}]}
        ],
        "flags": [
            {"id": "flag_web", "name": "web flag", "value": "FLAG{complex}", "points": 50,
             "placement": {"type": "file", "host_id": "host_web",
                           "details": {"path": "/var/www/flag.txt"}}}
        ]
    }"#,
    )
    .expect("complex scenario parses")
}

/// N independent custom hosts on one network, for parallel-speedup tests.
pub fn independent_hosts_scenario(count: usize) -> Scenario {
    let hosts: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"id": "host_{i}", "name": "host{i}", "type": "custom",
                     "base_image": "alpine:latest",
                     "networks": [{{"network_id": "net_lab",
                                    "ip_address": "172.25.0.{}"}}]}}"#,
                10 + i
            )
        })
        .collect();

    parse_scenario(&format!(
        r#"{{
        "metadata": {{"name": "Fanout Lab", "difficulty": "easy"}},
        "networks": [
            {{"id": "net_lab", "name": "lab", "type": "custom_bridge",
              "subnet": "172.25.0.0/24"}}
        ],
        "hosts": [{hosts}],
        "flags": []
    }}"#,
        hosts = hosts.join(",")
    ))
    .expect("fanout scenario parses")
}

// ============================================================================
// Scripted executor
// ============================================================================

/// One recorded runtime invocation.
#[derive(Debug, Clone)]
pub struct ExecRecord {
    /// The argv as received.
    pub argv: Vec<String>,
    /// When the invocation happened.
    pub at: Instant,
}

impl ExecRecord {
    /// `true` when this record is a `container run` for the given name.
    pub fn is_run_of(&self, name: &str) -> bool {
        self.argv.first().map(String::as_str) == Some("run")
            && self
                .argv
                .iter()
                .position(|a| a == "--name")
                .is_some_and(|idx| self.argv.get(idx + 1).map(String::as_str) == Some(name))
    }
}

/// Scripted runtime standing in for a container daemon.
///
/// Tracks which resources have been "created" so existence probes answer
/// realistically; mutating commands can be slowed down to make
/// concurrency observable.
pub struct StubExecutor {
    /// Every invocation, mutating and probing alike.
    pub log: Mutex<Vec<ExecRecord>>,
    created: Mutex<HashSet<String>>,
    /// When `false`, existence probes always answer "absent".
    pub track_existence: bool,
    /// Artificial latency for mutating commands.
    pub run_delay: Duration,
    /// Health status answered for health probes (`healthy`, `starting`, ...).
    pub health: String,
}

impl Default for StubExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StubExecutor {
    /// A fresh stub: nothing exists, no latency, containers report healthy.
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            created: Mutex::new(HashSet::new()),
            track_existence: true,
            run_delay: Duration::ZERO,
            health: "healthy".to_string(),
        }
    }

    /// Adds latency to every mutating command.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    /// Answers every existence probe with "absent".
    pub fn without_existence_tracking(mut self) -> Self {
        self.track_existence = false;
        self
    }

    /// Pretends the given resource already exists.
    pub fn seed_existing(&self, name: &str) {
        self.created.lock().unwrap().insert(name.to_string());
    }

    /// Records of mutating `run` commands, in execution order.
    pub fn container_runs(&self) -> Vec<ExecRecord> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.argv.first().map(String::as_str) == Some("run"))
            .cloned()
            .collect()
    }

    fn record(&self, argv: &[String]) {
        self.log.lock().unwrap().push(ExecRecord {
            argv: argv.to_vec(),
            at: Instant::now(),
        });
    }

    fn ok(stdout: &str) -> ExecOutput {
        ExecOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn absent() -> ExecOutput {
        ExecOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "No such object".to_string(),
        }
    }
}

#[async_trait]
impl Executor for StubExecutor {
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput, ExecutorError> {
        self.record(argv);

        match argv.first().map(String::as_str) {
            Some("net-inspect" | "container-inspect") => {
                let name = argv.get(1).cloned().unwrap_or_default();
                let exists = self.track_existence && self.created.lock().unwrap().contains(&name);
                if exists {
                    Ok(Self::ok("[]"))
                } else {
                    Ok(Self::absent())
                }
            }
            Some("inspect") => {
                let format = argv.get(2).cloned().unwrap_or_default();
                if format.contains("Health") {
                    Ok(Self::ok(&format!("{{\"Status\":\"{}\"}}", self.health)))
                } else {
                    Ok(Self::ok("true"))
                }
            }
            _ => {
                if !self.run_delay.is_zero() {
                    tokio::time::sleep(self.run_delay).await;
                }
                // Remember what got created so later probes see it.
                match argv.first().map(String::as_str) {
                    Some("run") => {
                        if let Some(idx) = argv.iter().position(|a| a == "--name") {
                            if let Some(name) = argv.get(idx + 1) {
                                self.created.lock().unwrap().insert(name.clone());
                            }
                        }
                    }
                    Some("network") if argv.get(1).map(String::as_str) == Some("create") => {
                        if let Some(name) = argv.last() {
                            self.created.lock().unwrap().insert(name.clone());
                        }
                    }
                    Some("network") if argv.get(1).map(String::as_str) == Some("rm") => {
                        if let Some(name) = argv.last() {
                            self.created.lock().unwrap().remove(name);
                        }
                    }
                    Some("rm") => {
                        if let Some(name) = argv.last() {
                            self.created.lock().unwrap().remove(name);
                        }
                    }
                    _ => {}
                }
                Ok(Self::ok(""))
            }
        }
    }
}

/// Executor whose mutating commands always fail, for error-path tests.
pub struct FailingExecutor;

#[async_trait]
impl Executor for FailingExecutor {
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput, ExecutorError> {
        match argv.first().map(String::as_str) {
            Some("net-inspect" | "container-inspect") => Ok(ExecOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: String::new(),
            }),
            Some("inspect") => Ok(ExecOutput {
                exit_code: 0,
                stdout: "false".to_string(),
                stderr: String::new(),
            }),
            _ => Ok(ExecOutput {
                exit_code: 125,
                stdout: String::new(),
                stderr: "daemon exploded".to_string(),
            }),
        }
    }
}

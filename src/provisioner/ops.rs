//! Typed operation stream.
//!
//! Every provisioning step is an [`Operation`]: a kind, a structured
//! argument record, and the runtime argv that realizes it. Skip and wait
//! operations carry an empty argv - they are handled internally and exist
//! so the operator's trace stays complete.
//!
//! Argv is composed in the style of a container CLI but never names the
//! binary; the [executor](crate::provisioner::executor) owns that.

use serde::Serialize;

use crate::planner::PortBinding;
use crate::scenario::schema::{Healthcheck, Host};

// ============================================================================
// Operation kinds
// ============================================================================

/// The kind of a provisioning operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Create a network with its subnet.
    NetworkCreate,
    /// Network already exists; idempotent no-op.
    NetworkCreateSkip,
    /// Delete a network (replace mode).
    NetworkRemove,
    /// Create and start a container.
    ContainerRun,
    /// Container already exists; idempotent no-op.
    ContainerRunSkip,
    /// Delete a container (replace mode).
    ContainerRemove,
    /// Attach a running container to an extra network.
    NetworkConnect,
    /// Block until a container reports healthy.
    HealthcheckWait,
}

impl OpKind {
    /// Dotted wire name, as recorded in traces and event logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkCreate => "network.create",
            Self::NetworkCreateSkip => "network.create.skip",
            Self::NetworkRemove => "network.remove",
            Self::ContainerRun => "container.run",
            Self::ContainerRunSkip => "container.run.skip",
            Self::ContainerRemove => "container.remove",
            Self::NetworkConnect => "network.connect",
            Self::HealthcheckWait => "healthcheck.wait",
        }
    }

    /// Whether this operation is an idempotent no-op.
    #[must_use]
    pub const fn is_skip(self) -> bool {
        matches!(self, Self::NetworkCreateSkip | Self::ContainerRunSkip)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OpKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Operation arguments
// ============================================================================

/// A key/value environment entry, stringified for the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct EnvVar {
    /// Variable name.
    pub key: String,
    /// Stringified value.
    pub value: String,
}

/// A resolved bind mount.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeSpec {
    /// Host-side path.
    pub source: String,
    /// Container-side path.
    pub target: String,
}

/// Arguments of a network create/skip/remove operation.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkArgs {
    /// Network id.
    pub id: String,
    /// CIDR subnet, when declared.
    pub subnet: Option<String>,
}

/// Arguments of a container run/skip/remove operation.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerArgs {
    /// Container name (the host id).
    pub name: String,
    /// Container image.
    pub image: String,
    /// Primary network id.
    pub network: String,
    /// Static IP on the primary network.
    pub ip: Option<String>,
    /// Exposed ports.
    pub ports: Vec<PortBinding>,
    /// Bind mounts.
    pub volumes: Vec<VolumeSpec>,
    /// Environment variables.
    pub env: Vec<EnvVar>,
    /// Hardening flag fragments applied to the run.
    pub security_opts: Vec<String>,
    /// Whether hardening was requested.
    pub isolate: bool,
    /// Restart policy, when set.
    pub restart_policy: Option<String>,
    /// Whether the container defines a healthcheck.
    pub has_healthcheck: bool,
}

/// Arguments of a network connect operation.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectArgs {
    /// Container name.
    pub container: String,
    /// Network to attach.
    pub network: String,
    /// Static IP on that network.
    pub ip: Option<String>,
}

/// Arguments of a healthcheck wait operation.
#[derive(Debug, Clone, Serialize)]
pub struct WaitArgs {
    /// Container to wait on.
    pub container: String,
    /// Wait budget in seconds.
    pub timeout_secs: u64,
}

/// Structured arguments for any operation kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OperationArgs {
    /// Network lifecycle arguments.
    Network(NetworkArgs),
    /// Container lifecycle arguments.
    Container(ContainerArgs),
    /// Extra-network attachment arguments.
    Connect(ConnectArgs),
    /// Health wait arguments.
    Wait(WaitArgs),
}

// ============================================================================
// Operation
// ============================================================================

/// One step of the provisioning stream.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// Operation kind.
    #[serde(rename = "type")]
    pub kind: OpKind,
    /// Structured arguments.
    pub args: OperationArgs,
    /// Runtime argv; empty for internally-handled operations.
    pub cmd: Vec<String>,
}

impl Operation {
    /// Shell-quoted rendering of the argv for display.
    #[must_use]
    pub fn display_cmd(&self) -> String {
        shlex::try_join(self.cmd.iter().map(String::as_str))
            .unwrap_or_else(|_| self.cmd.join(" "))
    }

    /// The resource this operation targets.
    #[must_use]
    pub fn target(&self) -> &str {
        match &self.args {
            OperationArgs::Network(args) => &args.id,
            OperationArgs::Container(args) => &args.name,
            OperationArgs::Connect(args) => &args.container,
            OperationArgs::Wait(args) => &args.container,
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builds a `network.create` operation.
#[must_use]
pub fn network_create(id: &str, subnet: Option<&str>) -> Operation {
    let mut cmd = vec!["network".to_string(), "create".to_string()];
    if let Some(subnet) = subnet {
        cmd.push("--subnet".to_string());
        cmd.push(subnet.to_string());
    }
    cmd.push(id.to_string());

    Operation {
        kind: OpKind::NetworkCreate,
        args: OperationArgs::Network(NetworkArgs {
            id: id.to_string(),
            subnet: subnet.map(str::to_string),
        }),
        cmd,
    }
}

/// Builds a `network.create.skip` no-op.
#[must_use]
pub fn network_create_skip(id: &str, subnet: Option<&str>) -> Operation {
    Operation {
        kind: OpKind::NetworkCreateSkip,
        args: OperationArgs::Network(NetworkArgs {
            id: id.to_string(),
            subnet: subnet.map(str::to_string),
        }),
        cmd: Vec::new(),
    }
}

/// Builds a `network.remove` operation (replace mode).
#[must_use]
pub fn network_remove(id: &str) -> Operation {
    Operation {
        kind: OpKind::NetworkRemove,
        args: OperationArgs::Network(NetworkArgs {
            id: id.to_string(),
            subnet: None,
        }),
        cmd: vec!["network".to_string(), "rm".to_string(), id.to_string()],
    }
}

/// Builds a `container.remove` operation (replace mode).
#[must_use]
pub fn container_remove(name: &str) -> Operation {
    Operation {
        kind: OpKind::ContainerRemove,
        args: OperationArgs::Container(ContainerArgs {
            name: name.to_string(),
            image: String::new(),
            network: String::new(),
            ip: None,
            ports: Vec::new(),
            volumes: Vec::new(),
            env: Vec::new(),
            security_opts: Vec::new(),
            isolate: false,
            restart_policy: None,
            has_healthcheck: false,
        }),
        cmd: vec!["rm".to_string(), "-f".to_string(), name.to_string()],
    }
}

/// Builds a `network.connect` operation.
#[must_use]
pub fn network_connect(container: &str, network: &str, ip: Option<&str>) -> Operation {
    let mut cmd = vec!["network".to_string(), "connect".to_string()];
    if let Some(ip) = ip {
        cmd.push("--ip".to_string());
        cmd.push(ip.to_string());
    }
    cmd.push(network.to_string());
    cmd.push(container.to_string());

    Operation {
        kind: OpKind::NetworkConnect,
        args: OperationArgs::Connect(ConnectArgs {
            container: container.to_string(),
            network: network.to_string(),
            ip: ip.map(str::to_string),
        }),
        cmd,
    }
}

/// Builds a `healthcheck.wait` internal operation.
#[must_use]
pub fn healthcheck_wait(container: &str, timeout_secs: u64) -> Operation {
    Operation {
        kind: OpKind::HealthcheckWait,
        args: OperationArgs::Wait(WaitArgs {
            container: container.to_string(),
            timeout_secs,
        }),
        cmd: Vec::new(),
    }
}

/// Effective resource limits flowing into a container run.
#[derive(Debug, Clone, Default)]
pub struct EffectiveLimits {
    /// CPU cores.
    pub cpu: Option<String>,
    /// Memory limit.
    pub memory: Option<String>,
    /// Disk limit.
    pub disk: Option<String>,
    /// Max process count.
    pub pids: Option<u32>,
}

/// Builds a `container.run` operation for a host.
///
/// The argv mirrors the container CLI's `run` verb: name and primary
/// network first, then volumes, environment, hardening, resource limits,
/// port mappings, restart policy, healthcheck flags, and finally the image.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn container_run(
    host: &Host,
    network: &str,
    ip: Option<&str>,
    ports: &[PortBinding],
    limits: &EffectiveLimits,
    security_opts: &[String],
    isolate: bool,
) -> Operation {
    let name = host.id.clone();
    let image = host.image().to_string();

    let mut cmd = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        name.clone(),
        "--network".to_string(),
        network.to_string(),
    ];
    if let Some(ip) = ip {
        cmd.push("--ip".to_string());
        cmd.push(ip.to_string());
    }

    let mut volumes = Vec::new();
    for volume in &host.volumes {
        if let Some((source, target)) = volume.parts() {
            cmd.push("-v".to_string());
            cmd.push(format!("{source}:{target}"));
            volumes.push(VolumeSpec {
                source: source.to_string(),
                target: target.to_string(),
            });
        }
    }

    let mut env = Vec::new();
    for (key, value) in &host.env {
        let value = stringify_env(value);
        cmd.push("-e".to_string());
        cmd.push(format!("{key}={value}"));
        env.push(EnvVar {
            key: key.clone(),
            value,
        });
    }

    cmd.extend(security_opts.iter().cloned());

    if let Some(cpu) = &limits.cpu {
        cmd.push("--cpus".to_string());
        cmd.push(cpu.clone());
    }
    if let Some(memory) = &limits.memory {
        cmd.push("--memory".to_string());
        cmd.push(memory.clone());
    }
    if let Some(disk) = &limits.disk {
        cmd.push("--storage-opt".to_string());
        cmd.push(format!("size={disk}"));
    }
    // The hardening set may already cap pids; the tighter flag stays.
    if let Some(pids) = limits.pids
        && !security_opts.iter().any(|f| f == "--pids-limit")
    {
        cmd.push("--pids-limit".to_string());
        cmd.push(pids.to_string());
    }

    for port in ports {
        if let Some(external) = port.external {
            cmd.push("-p".to_string());
            cmd.push(format!("{external}:{}/{}", port.internal, port.protocol));
        }
    }

    if let Some(policy) = &host.restart_policy {
        cmd.push("--restart".to_string());
        cmd.push(policy.clone());
    }

    if let Some(healthcheck) = &host.healthcheck {
        append_healthcheck_flags(&mut cmd, healthcheck);
    }

    cmd.push(image.clone());

    Operation {
        kind: OpKind::ContainerRun,
        args: OperationArgs::Container(ContainerArgs {
            name,
            image,
            network: network.to_string(),
            ip: ip.map(str::to_string),
            ports: ports.to_vec(),
            volumes,
            env,
            security_opts: security_opts.to_vec(),
            isolate,
            restart_policy: host.restart_policy.clone(),
            has_healthcheck: host.healthcheck.is_some(),
        }),
        cmd,
    }
}

/// Builds a `container.run.skip` no-op mirroring what would have run.
#[must_use]
pub fn container_run_skip(run: &Operation) -> Operation {
    Operation {
        kind: OpKind::ContainerRunSkip,
        args: run.args.clone(),
        cmd: Vec::new(),
    }
}

fn append_healthcheck_flags(cmd: &mut Vec<String>, healthcheck: &Healthcheck) {
    cmd.push("--health-cmd".to_string());
    cmd.push(healthcheck.test.clone());
    if let Some(interval) = &healthcheck.interval {
        cmd.push("--health-interval".to_string());
        cmd.push(interval.clone());
    }
    if let Some(timeout) = &healthcheck.timeout {
        cmd.push("--health-timeout".to_string());
        cmd.push(timeout.clone());
    }
    if let Some(retries) = healthcheck.retries {
        cmd.push("--health-retries".to_string());
        cmd.push(retries.to_string());
    }
    if let Some(start_period) = &healthcheck.start_period {
        cmd.push("--health-start-period".to_string());
        cmd.push(start_period.clone());
    }
}

/// Stringifies an environment value for `-e KEY=VALUE`.
fn stringify_env(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::schema::Protocol;

    fn host(json: &str) -> Host {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn network_create_includes_subnet() {
        let op = network_create("net_dmz", Some("172.20.0.0/24"));
        assert_eq!(op.kind, OpKind::NetworkCreate);
        assert_eq!(
            op.cmd,
            vec!["network", "create", "--subnet", "172.20.0.0/24", "net_dmz"]
        );
    }

    #[test]
    fn skip_operations_have_no_cmd() {
        assert!(network_create_skip("net_a", None).cmd.is_empty());
        assert!(healthcheck_wait("host_a", 60).cmd.is_empty());
        assert!(OpKind::NetworkCreateSkip.is_skip());
        assert!(!OpKind::NetworkRemove.is_skip());
    }

    #[test]
    fn connect_includes_static_ip_before_network() {
        let op = network_connect("host_web", "net_internal", Some("172.22.0.20"));
        assert_eq!(
            op.cmd,
            vec!["network", "connect", "--ip", "172.22.0.20", "net_internal", "host_web"]
        );
    }

    #[test]
    fn container_run_composes_all_flag_groups() {
        let host = host(
            r#"{
            "id": "host_db", "name": "db", "type": "db",
            "base_image": "mysql:8",
            "networks": [{"network_id": "net_a", "ip_address": "10.0.0.5"}],
            "env": {"MYSQL_ROOT_PASSWORD": "rootpass", "MYSQL_PORT": 3306},
            "volumes": [{"source": "/host/db", "target": "/var/lib/mysql"}, "/cfg:/etc/mysql"],
            "restart_policy": "unless-stopped",
            "healthcheck": {"test": "mysqladmin ping", "interval": "10s",
                            "timeout": "5s", "retries": 3, "start_period": "30s"}
        }"#,
        );
        let ports = vec![PortBinding {
            internal: 3306,
            external: Some(13306),
            protocol: Protocol::Tcp,
            service_id: "svc_db".to_string(),
        }];
        let limits = EffectiveLimits {
            cpu: Some("2.0".to_string()),
            memory: Some("1g".to_string()),
            disk: Some("10G".to_string()),
            pids: Some(512),
        };

        let op = container_run(&host, "net_a", Some("10.0.0.5"), &ports, &limits, &[], false);
        let cmd = &op.cmd;

        let pair = |flag: &str| {
            let idx = cmd.iter().position(|c| c == flag).unwrap_or_else(|| panic!("missing {flag}"));
            cmd[idx + 1].clone()
        };

        assert_eq!(cmd[0], "run");
        assert_eq!(pair("--name"), "host_db");
        assert_eq!(pair("--network"), "net_a");
        assert_eq!(pair("--ip"), "10.0.0.5");
        assert!(cmd.contains(&"/host/db:/var/lib/mysql".to_string()));
        assert!(cmd.contains(&"/cfg:/etc/mysql".to_string()));
        assert!(cmd.contains(&"MYSQL_ROOT_PASSWORD=rootpass".to_string()));
        assert!(cmd.contains(&"MYSQL_PORT=3306".to_string()));
        assert_eq!(pair("--cpus"), "2.0");
        assert_eq!(pair("--memory"), "1g");
        assert_eq!(pair("--storage-opt"), "size=10G");
        assert_eq!(pair("--pids-limit"), "512");
        assert!(cmd.contains(&"13306:3306/tcp".to_string()));
        assert_eq!(pair("--restart"), "unless-stopped");
        assert_eq!(pair("--health-cmd"), "mysqladmin ping");
        assert_eq!(pair("--health-interval"), "10s");
        assert_eq!(pair("--health-timeout"), "5s");
        assert_eq!(pair("--health-retries"), "3");
        assert_eq!(pair("--health-start-period"), "30s");
        assert_eq!(cmd.last().unwrap(), "mysql:8");
    }

    #[test]
    fn container_run_skips_unmapped_ports() {
        let host = host(r#"{"id": "host_a", "name": "a", "type": "custom"}"#);
        let ports = vec![PortBinding {
            internal: 6379,
            external: None,
            protocol: Protocol::Tcp,
            service_id: "svc_cache".to_string(),
        }];
        let op = container_run(
            &host,
            "net_a",
            None,
            &ports,
            &EffectiveLimits::default(),
            &[],
            false,
        );
        assert!(!op.cmd.contains(&"-p".to_string()));
        assert_eq!(op.cmd.last().unwrap(), "alpine:latest");
    }

    #[test]
    fn hardening_pids_cap_suppresses_resource_pids() {
        let host = host(r#"{"id": "host_a", "name": "a", "type": "custom"}"#);
        let security = vec![
            "--security-opt".to_string(),
            "no-new-privileges:true".to_string(),
            "--read-only".to_string(),
            "--pids-limit".to_string(),
            "256".to_string(),
        ];
        let limits = EffectiveLimits {
            pids: Some(1024),
            ..EffectiveLimits::default()
        };
        let op = container_run(&host, "net_a", None, &[], &limits, &security, true);
        let count = op.cmd.iter().filter(|c| *c == "--pids-limit").count();
        assert_eq!(count, 1);
        assert!(op.cmd.contains(&"256".to_string()));
    }

    #[test]
    fn display_cmd_quotes_arguments() {
        let host = host(
            r#"{"id": "host_a", "name": "a", "type": "custom",
                "healthcheck": {"test": "curl -f http://localhost/ || exit 1"}}"#,
        );
        let op = container_run(
            &host,
            "net_a",
            None,
            &[],
            &EffectiveLimits::default(),
            &[],
            false,
        );
        let rendered = op.display_cmd();
        assert!(rendered.contains("'curl -f http://localhost/ || exit 1'"));
    }
}

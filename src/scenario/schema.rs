//! Scenario document types.
//!
//! These types are deserialized from JSON (or YAML) scenario files. The
//! document is immutable after parsing: the validator, planner, and
//! provisioner all hold read-only views of it.
//!
//! Type and enum conformance is enforced by serde at parse time; pattern
//! and cross-reference rules live in the [validator](crate::validator).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Document
// ============================================================================

/// Root of a cyber-range scenario document.
///
/// Required top-level keys: `metadata`, `networks`, `hosts`, `flags`.
/// `services`, `vulnerabilities`, `narrative`, and `scoring` are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Scenario {
    /// Scenario identification and difficulty.
    pub metadata: Metadata,

    /// Declared network segments.
    pub networks: Vec<Network>,

    /// Service catalog referenced by hosts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,

    /// Container hosts to deploy.
    pub hosts: Vec<Host>,

    /// Objectives placed inside hosts.
    pub flags: Vec<Flag>,

    /// Vulnerability catalog referenced by hosts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<Vulnerability>,

    /// Free-form narrative shown to players.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<serde_json::Value>,

    /// Free-form scoring configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<serde_json::Value>,
}

impl Scenario {
    /// Looks up a host by id.
    #[must_use]
    pub fn host(&self, id: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.id == id)
    }

    /// Looks up a service by id.
    #[must_use]
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Scenario metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Metadata {
    /// Scenario display name.
    pub name: String,

    /// Scenario version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Difficulty tier used for resource policy selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,

    /// Scenario author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Named resource policy, taking precedence over `difficulty`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_policy: Option<String>,

    /// Named security profile applied to every container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<String>,
}

/// Scenario difficulty tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Generous resource limits.
    Easy,
    /// Balanced resource limits.
    Medium,
    /// Tight resource limits.
    Hard,
}

// ============================================================================
// Networks
// ============================================================================

/// A named L2/L3 segment identified by a CIDR subnet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Network {
    /// Network id (`^[a-z][a-z0-9_]*$`).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Network kind.
    #[serde(rename = "type")]
    pub kind: NetworkType,

    /// IPv4 CIDR subnet (e.g. `172.20.0.0/24`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

/// Network kinds supported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Runtime-default bridge.
    Bridge,
    /// Dedicated bridge with its own subnet.
    CustomBridge,
    /// No external connectivity.
    Isolated,
    /// Internet-reachable segment.
    Public,
}

// ============================================================================
// Services
// ============================================================================

/// A service definition referenced from `host.services[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Service {
    /// Service id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Service type (nginx, mysql, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Service version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Ports the service listens on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
}

/// A single service port, optionally mapped to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Port {
    /// Container-internal port.
    pub internal: u16,

    /// Host-external port; `(external, protocol)` must be globally unique.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<u16>,

    /// Transport protocol, tcp when omitted.
    #[serde(default)]
    pub protocol: Protocol,
}

/// Transport protocol for a port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl Protocol {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Hosts
// ============================================================================

/// One container instance in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Host {
    /// Host id (`^[a-z][a-z0-9_]*$`), also used as the container name.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Host role.
    #[serde(rename = "type")]
    pub kind: HostType,

    /// Container image; defaults to `alpine:latest` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,

    /// Network memberships; the first entry is the primary network.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,

    /// Service ids provided by this host.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,

    /// Flag ids placed on this host.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    /// Vulnerability ids present on this host.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<String>,

    /// Host ids that must be running before this host starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Declared resource limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<HostResources>,

    /// Environment variables (values are stringified on composition).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, serde_json::Value>,

    /// Bind mounts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Container healthcheck definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,

    /// Restart policy (`always`, `unless-stopped`, `on-failure`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
}

impl Host {
    /// Whether this host plays the attacker role.
    #[must_use]
    pub fn is_attacker(&self) -> bool {
        self.kind == HostType::Attacker
    }

    /// Effective container image.
    #[must_use]
    pub fn image(&self) -> &str {
        self.base_image.as_deref().unwrap_or("alpine:latest")
    }
}

/// Host roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostType {
    /// Attacker tooling; always deployed last.
    Attacker,
    /// Generic target.
    Victim,
    /// Web server target.
    Web,
    /// Database server.
    Db,
    /// FTP server.
    Ftp,
    /// SMB server.
    Smb,
    /// Anything else.
    Custom,
}

impl HostType {
    /// Deployment priority: infrastructure first, attacker last.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Db | Self::Smb | Self::Ftp => 0,
            Self::Web | Self::Custom | Self::Victim => 1,
            Self::Attacker => 2,
        }
    }
}

/// A host's membership in a network, with an optional static IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NetworkAttachment {
    /// Referenced network id.
    pub network_id: String,

    /// Static IPv4 address inside the network's subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Declared per-host resource limits.
///
/// CPU and size limits are kept as strings because they flow straight into
/// runtime flags (`--cpus 1.5`, `--memory 512m`, `--storage-opt size=2G`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HostResources {
    /// CPU cores (e.g. `"1.5"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,

    /// Memory limit (e.g. `"512m"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,

    /// Disk limit (e.g. `"10g"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_limit: Option<String>,

    /// Max process count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids_limit: Option<u32>,
}

impl HostResources {
    /// Whether any limit is declared.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cpu_limit.is_none()
            && self.memory_limit.is_none()
            && self.disk_limit.is_none()
            && self.pids_limit.is_none()
    }
}

/// A bind mount, either structured or in `"src:dst"` shorthand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Volume {
    /// Structured `{source, target}` record.
    Spec {
        /// Host-side path.
        source: String,
        /// Container-side path.
        target: String,
    },
    /// `"src:dst"` shorthand.
    Shorthand(String),
}

impl Volume {
    /// Resolves to `(source, target)`; `None` for malformed shorthand.
    #[must_use]
    pub fn parts(&self) -> Option<(&str, &str)> {
        match self {
            Self::Spec { source, target } => Some((source, target)),
            Self::Shorthand(s) => s.split_once(':'),
        }
    }
}

/// Container healthcheck definition, mirroring the runtime's flag set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Healthcheck {
    /// Check command, run inside the container.
    pub test: String,

    /// Interval between checks (e.g. `"30s"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Per-check timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Consecutive failures before unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Grace period before checks count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
}

// ============================================================================
// Flags
// ============================================================================

/// A tokenized objective placed inside a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Flag {
    /// Flag id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Flag token; unique across the scenario.
    pub value: String,

    /// Points awarded on capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,

    /// Where and how the flag is planted.
    pub placement: FlagPlacement,
}

/// Flag placement, tagged by kind.
///
/// The variant dictates which detail fields are required; the validator
/// performs the exhaustive case analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlagPlacement {
    /// Written to a file inside the container.
    File {
        /// Host the flag lives on.
        host_id: String,
        /// File path; may instead live under `details.path`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        /// Additional placement details.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<PlacementDetails>,
    },

    /// Exposed as an environment variable.
    EnvVar {
        /// Host the flag lives on.
        host_id: String,
        /// Variable name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
        /// Additional placement details.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<PlacementDetails>,
    },

    /// Inserted as a database row.
    DbRow {
        /// Host the flag lives on.
        host_id: String,
        /// Placement details; must carry `table` and `query`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<PlacementDetails>,
    },
}

impl FlagPlacement {
    /// The host this placement targets.
    #[must_use]
    pub fn host_id(&self) -> &str {
        match self {
            Self::File { host_id, .. }
            | Self::EnvVar { host_id, .. }
            | Self::DbRow { host_id, .. } => host_id,
        }
    }

    /// Placement kind name as it appears in the document.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::EnvVar { .. } => "env_var",
            Self::DbRow { .. } => "db_row",
        }
    }
}

/// Open-ended placement detail record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlacementDetails {
    /// File path (for `file` placements).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Table name (for `db_row` placements).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Insertion query (for `db_row` placements).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Variable name (alternate spot for `env_var` placements).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,

    /// Anything else the placement tooling needs.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

// ============================================================================
// Vulnerabilities
// ============================================================================

/// A vulnerability definition referenced from `host.vulnerabilities[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Vulnerability {
    /// Vulnerability id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Vulnerability class (sqli, weak_creds, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Severity label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Service the vulnerability lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_service: Option<String>,

    /// Description shown in write-ups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_deserializes() {
        let json = r#"{
            "metadata": {"name": "Mini Lab", "difficulty": "easy"},
            "networks": [
                {"id": "net_dmz", "name": "dmz", "type": "custom_bridge", "subnet": "172.20.0.0/24"}
            ],
            "hosts": [
                {
                    "id": "host_web", "name": "web", "type": "web",
                    "base_image": "nginx:alpine",
                    "networks": [{"network_id": "net_dmz", "ip_address": "172.20.0.20"}]
                }
            ],
            "flags": []
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.metadata.name, "Mini Lab");
        assert_eq!(scenario.metadata.difficulty, Some(Difficulty::Easy));
        assert_eq!(scenario.hosts[0].kind, HostType::Web);
        assert_eq!(scenario.hosts[0].image(), "nginx:alpine");
        assert!(scenario.services.is_empty());
    }

    #[test]
    fn missing_required_key_is_a_parse_error() {
        // No `networks` key at all.
        let json = r#"{
            "metadata": {"name": "x"},
            "hosts": [],
            "flags": []
        }"#;
        assert!(serde_json::from_str::<Scenario>(json).is_err());
    }

    #[test]
    fn invalid_enum_value_is_a_parse_error() {
        let json = r#"{"id": "n", "name": "n", "type": "mesh"}"#;
        assert!(serde_json::from_str::<Network>(json).is_err());
    }

    #[test]
    fn port_protocol_defaults_to_tcp() {
        let port: Port = serde_json::from_str(r#"{"internal": 80, "external": 8080}"#).unwrap();
        assert_eq!(port.protocol, Protocol::Tcp);
        assert_eq!(port.external, Some(8080));
    }

    #[test]
    fn volume_accepts_both_forms() {
        let spec: Volume =
            serde_json::from_str(r#"{"source": "/host/web", "target": "/var/www"}"#).unwrap();
        assert_eq!(spec.parts(), Some(("/host/web", "/var/www")));

        let short: Volume = serde_json::from_str(r#""/data:/mnt/data""#).unwrap();
        assert_eq!(short.parts(), Some(("/data", "/mnt/data")));

        let bad: Volume = serde_json::from_str(r#""no-separator""#).unwrap();
        assert_eq!(bad.parts(), None);
    }

    #[test]
    fn flag_placement_tagged_by_type() {
        let json = r#"{
            "type": "file",
            "host_id": "host_web",
            "details": {"path": "/var/www/flag.txt"}
        }"#;
        let placement: FlagPlacement = serde_json::from_str(json).unwrap();
        assert_eq!(placement.kind(), "file");
        assert_eq!(placement.host_id(), "host_web");

        let json = r#"{"type": "env_var", "host_id": "host_db", "variable": "FLAG"}"#;
        let placement: FlagPlacement = serde_json::from_str(json).unwrap();
        assert_eq!(placement.kind(), "env_var");

        let json = r#"{"type": "steganography", "host_id": "host_db"}"#;
        assert!(serde_json::from_str::<FlagPlacement>(json).is_err());
    }

    #[test]
    fn host_type_priorities() {
        assert_eq!(HostType::Db.priority(), 0);
        assert_eq!(HostType::Smb.priority(), 0);
        assert_eq!(HostType::Ftp.priority(), 0);
        assert_eq!(HostType::Web.priority(), 1);
        assert_eq!(HostType::Victim.priority(), 1);
        assert_eq!(HostType::Custom.priority(), 1);
        assert_eq!(HostType::Attacker.priority(), 2);
    }

    #[test]
    fn host_defaults() {
        let json = r#"{"id": "host_x", "name": "x", "type": "custom"}"#;
        let host: Host = serde_json::from_str(json).unwrap();
        assert_eq!(host.image(), "alpine:latest");
        assert!(host.networks.is_empty());
        assert!(host.depends_on.is_empty());
        assert!(host.env.is_empty());
        assert!(!host.is_attacker());
    }

    #[test]
    fn yaml_scenario_deserializes() {
        let yaml = r"
metadata:
  name: Yaml Lab
  difficulty: medium
networks:
  - id: net_lan
    name: lan
    type: isolated
    subnet: 10.10.0.0/24
hosts:
  - id: host_ftp
    name: ftp
    type: ftp
    networks:
      - network_id: net_lan
flags: []
";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.networks[0].kind, NetworkType::Isolated);
        assert_eq!(scenario.hosts[0].kind.priority(), 0);
    }
}

//! Deployment planning.
//!
//! The planner consumes a validated scenario and produces a [`Plan`]:
//! the network topology with IP-conflict detection, per-host resource
//! allocation with global external-port-conflict detection, and the
//! deployment order (see [`order`]). The planner is a pure function over
//! the scenario; all problems are accumulated into the plan rather than
//! raised.

mod order;

use indexmap::IndexMap;
use ipnet::Ipv4Net;
use serde::Serialize;

use crate::scenario::schema::{HostType, Protocol, Scenario};

/// A host's placement on one network.
#[derive(Debug, Clone, Serialize)]
pub struct HostPlacement {
    /// Host id.
    pub host_id: String,
    /// Static IP, when declared.
    pub ip: Option<String>,
}

/// Planned state of one network.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkPlan {
    /// CIDR subnet, when declared.
    pub subnet: Option<String>,
    /// Hosts attached to this network.
    pub hosts: Vec<HostPlacement>,
}

/// A port a host exposes, resolved from its services.
#[derive(Debug, Clone, Serialize)]
pub struct PortBinding {
    /// Container-internal port.
    pub internal: u16,
    /// Host-external port, when mapped.
    pub external: Option<u16>,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Service that declared the port.
    pub service_id: String,
}

/// Resources and ports allocated to one host.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostAllocation {
    /// CPU cores.
    pub cpu_limit: Option<String>,
    /// Memory limit.
    pub memory_limit: Option<String>,
    /// Disk limit.
    pub disk_limit: Option<String>,
    /// Max process count.
    pub pids_limit: Option<u32>,
    /// Ports exposed by the host's services.
    pub ports: Vec<PortBinding>,
}

/// The ordered, conflict-checked deployment specification.
#[derive(Debug, Default, Serialize)]
pub struct Plan {
    /// Host ids in deployment order; a permutation of all hosts.
    pub ordered_hosts: Vec<String>,
    /// Network id -> planned state, in declaration order.
    pub network_topology: IndexMap<String, NetworkPlan>,
    /// Host id -> allocation, in declaration order.
    pub resource_allocation: IndexMap<String, HostAllocation>,
    /// Planning errors; a non-empty list gates provisioning.
    pub errors: Vec<String>,
    /// Advisory findings.
    pub warnings: Vec<String>,
}

impl Plan {
    /// `true` when planning produced no errors.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Analyzes a scenario and produces a deployment plan.
#[must_use]
pub fn plan(scenario: &Scenario) -> Plan {
    let mut result = Plan::default();

    build_topology(scenario, &mut result);
    allocate_resources(scenario, &mut result);

    let (ordered, mut order_errors) = order::deployment_order(scenario);
    result.ordered_hosts = ordered;
    result.errors.append(&mut order_errors);

    result
}

/// Builds the network topology and detects IP conflicts.
fn build_topology(scenario: &Scenario, plan: &mut Plan) {
    let mut subnets: IndexMap<&str, Option<Ipv4Net>> = IndexMap::new();

    for network in &scenario.networks {
        let parsed = match network.subnet.as_deref() {
            Some(subnet) => match subnet.parse::<Ipv4Net>() {
                Ok(net) => Some(net),
                Err(_) => {
                    plan.errors.push(format!(
                        "Network '{}' has invalid subnet '{subnet}'",
                        network.id
                    ));
                    None
                }
            },
            None => None,
        };
        subnets.insert(network.id.as_str(), parsed);
        plan.network_topology.insert(
            network.id.clone(),
            NetworkPlan {
                subnet: network.subnet.clone(),
                hosts: Vec::new(),
            },
        );
    }

    for host in &scenario.hosts {
        for attachment in &host.networks {
            let network_id = attachment.network_id.as_str();
            if !plan.network_topology.contains_key(network_id) {
                plan.errors.push(format!(
                    "Host '{}' references unknown network '{network_id}'",
                    host.id
                ));
                continue;
            }

            if let Some(ip) = attachment.ip_address.as_deref() {
                let claimed = plan.network_topology[network_id]
                    .hosts
                    .iter()
                    .any(|p| p.ip.as_deref() == Some(ip));
                if claimed {
                    plan.errors.push(format!(
                        "IP conflict on network '{network_id}': {ip} already in use"
                    ));
                } else {
                    check_subnet_membership(host.id.as_str(), network_id, ip, &subnets, plan);
                }
            }

            if let Some(entry) = plan.network_topology.get_mut(network_id) {
                entry.hosts.push(HostPlacement {
                    host_id: host.id.clone(),
                    ip: attachment.ip_address.clone(),
                });
            }
        }
    }
}

/// Checks a static IP parses and falls inside the network's subnet.
fn check_subnet_membership(
    host_id: &str,
    network_id: &str,
    ip: &str,
    subnets: &IndexMap<&str, Option<Ipv4Net>>,
    plan: &mut Plan,
) {
    let Ok(address) = ip.parse::<std::net::Ipv4Addr>() else {
        plan.errors.push(format!(
            "Host '{host_id}' has invalid IP address '{ip}' on network '{network_id}'"
        ));
        return;
    };

    if let Some(Some(subnet)) = subnets.get(network_id)
        && !subnet.contains(&address)
    {
        plan.warnings.push(format!(
            "Host '{host_id}' IP {ip} is outside subnet {subnet} on network '{network_id}'"
        ));
    }
}

/// Gathers per-host resource limits and service ports; detects external
/// port conflicts across the whole scenario.
fn allocate_resources(scenario: &Scenario, plan: &mut Plan) {
    // (external, protocol) -> "host:service" owner.
    let mut external_ports: IndexMap<(u16, Protocol), String> = IndexMap::new();

    for host in &scenario.hosts {
        let resources = host.resources.clone().unwrap_or_default();
        let mut allocation = HostAllocation {
            cpu_limit: resources.cpu_limit.clone(),
            memory_limit: resources.memory_limit.clone(),
            disk_limit: resources.disk_limit.clone(),
            pids_limit: resources.pids_limit,
            ports: Vec::new(),
        };

        for service_id in &host.services {
            let Some(service) = scenario.service(service_id) else {
                plan.errors.push(format!(
                    "Host '{}' references undefined service '{service_id}'",
                    host.id
                ));
                continue;
            };

            for port in &service.ports {
                if let Some(external) = port.external {
                    let key = (external, port.protocol);
                    if let Some(owner) = external_ports.get(&key) {
                        plan.errors.push(format!(
                            "External port conflict: {}/{external} used by '{owner}' and host '{}' (service '{service_id}')",
                            port.protocol, host.id
                        ));
                    } else {
                        external_ports.insert(key, format!("{}:{service_id}", host.id));
                    }
                }
                allocation.ports.push(PortBinding {
                    internal: port.internal,
                    external: port.external,
                    protocol: port.protocol,
                    service_id: service_id.clone(),
                });
            }
        }

        if host.kind != HostType::Attacker {
            if allocation.cpu_limit.is_none() {
                plan.warnings
                    .push(format!("Host '{}' missing cpu_limit", host.id));
            }
            if allocation.memory_limit.is_none() {
                plan.warnings
                    .push(format!("Host '{}' missing memory_limit", host.id));
            }
        }

        plan.resource_allocation.insert(host.id.clone(), allocation);
    }
}

// ============================================================================
// Tests
// ============================================================================

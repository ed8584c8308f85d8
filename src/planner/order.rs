//! Deployment ordering.
//!
//! Hosts are ordered by Kahn's algorithm over the `depends_on` DAG with a
//! priority-ordered ready heap: dependency edges always win, host-type
//! priority (infrastructure < services < attacker) only orders hosts that
//! are ready at the same moment, and ids break the remaining ties. A final
//! post-pass moves every attacker host to the end regardless of dependency
//! placement - attacker tooling must not come up before targets exist.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::scenario::schema::{Host, Scenario};

/// Computes the deployment order for all hosts.
///
/// Returns the ordered host ids and any ordering errors (unknown
/// dependencies, cycles). On a cycle the partial topological order is
/// discarded and the priority-only order is returned instead.
pub(crate) fn deployment_order(scenario: &Scenario) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let hosts = &scenario.hosts;
    let host_ids: HashSet<&str> = hosts.iter().map(|h| h.id.as_str()).collect();

    // Edge dep -> host: deploy dep before host.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indegree: HashMap<&str, usize> = hosts.iter().map(|h| (h.id.as_str(), 0)).collect();
    let mut seen_edges: HashSet<(&str, &str)> = HashSet::new();
    let mut has_dependencies = false;

    for host in hosts {
        for dep in &host.depends_on {
            has_dependencies = true;
            if !host_ids.contains(dep.as_str()) {
                errors.push(format!(
                    "Host '{}' depends_on unknown host '{dep}'",
                    host.id
                ));
                continue;
            }
            if seen_edges.insert((dep.as_str(), host.id.as_str())) {
                adjacency.entry(dep.as_str()).or_default().push(&host.id);
                *indegree.get_mut(host.id.as_str()).expect("known host") += 1;
            }
        }
    }

    let priority_of: HashMap<&str, u8> = hosts
        .iter()
        .map(|h| (h.id.as_str(), h.kind.priority()))
        .collect();

    let ordered = if has_dependencies {
        match kahn(hosts, &adjacency, indegree, &priority_of) {
            Some(order) => order,
            None => {
                errors.push("Cycle detected in host dependencies".to_string());
                priority_order(hosts)
            }
        }
    } else {
        priority_order(hosts)
    };

    (attackers_last(scenario, ordered), errors)
}

/// Kahn's algorithm with a (priority, id) min-heap as the ready queue.
///
/// Returns `None` when a cycle prevents processing every node.
fn kahn(
    hosts: &[Host],
    adjacency: &HashMap<&str, Vec<&str>>,
    mut indegree: HashMap<&str, usize>,
    priority_of: &HashMap<&str, u8>,
) -> Option<Vec<String>> {
    let mut ready: BinaryHeap<Reverse<(u8, &str)>> = hosts
        .iter()
        .filter(|h| indegree[h.id.as_str()] == 0)
        .map(|h| Reverse((h.kind.priority(), h.id.as_str())))
        .collect();

    let mut order = Vec::with_capacity(hosts.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id.to_string());
        for &next in adjacency.get(id).map(Vec::as_slice).unwrap_or_default() {
            let degree = indegree.get_mut(next).expect("known host");
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse((priority_of[next], next)));
            }
        }
    }

    (order.len() == hosts.len()).then_some(order)
}

/// Pure priority ordering, used when no dependencies exist or a cycle was
/// detected.
fn priority_order(hosts: &[Host]) -> Vec<String> {
    let mut ids: Vec<&Host> = hosts.iter().collect();
    ids.sort_by_key(|h| (h.kind.priority(), h.id.as_str()));
    ids.into_iter().map(|h| h.id.clone()).collect()
}

/// Stably moves every attacker host to the end of the order.
fn attackers_last(scenario: &Scenario, ordered: Vec<String>) -> Vec<String> {
    let (attackers, others): (Vec<String>, Vec<String>) = ordered
        .into_iter()
        .partition(|id| scenario.host(id).is_some_and(Host::is_attacker));
    others.into_iter().chain(attackers).collect()
}

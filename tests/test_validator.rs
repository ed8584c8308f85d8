//! Validator integration tests over complete scenario documents.

mod common;

use rangeforge::scenario::{load_scenario, parse_scenario};
use rangeforge::validator::validate;

#[test]
fn complete_scenarios_validate_cleanly() {
    let result = validate(&common::minimal_scenario());
    assert!(result.is_valid(), "errors: {:?}", result.errors);

    let result = validate(&common::complex_scenario());
    assert!(result.is_valid(), "errors: {:?}", result.errors);
}

#[test]
fn scenario_loaded_from_disk_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lab.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&common::minimal_scenario()).unwrap(),
    )
    .unwrap();

    let scenario = load_scenario(&path).unwrap();
    assert!(validate(&scenario).is_valid());
}

#[test]
fn every_reference_kind_is_checked() {
    let scenario = parse_scenario(
        r#"{
        "metadata": {"name": "Broken Lab"},
        "networks": [{"id": "net_a", "name": "a", "type": "bridge", "subnet": "10.0.0.0/24"}],
        "vulnerabilities": [{"id": "vuln_real", "name": "r", "type": "sqli"}],
        "hosts": [
            {"id": "host_a", "name": "a", "type": "web",
             "networks": [{"network_id": "net_missing"}],
             "flags": ["flag_missing"],
             "vulnerabilities": ["vuln_missing"]}
        ],
        "flags": [
            {"id": "flag_a", "name": "a", "value": "FLAG{a}",
             "placement": {"type": "file", "host_id": "host_missing", "path": "/f"}}
        ]
    }"#,
    )
    .unwrap();

    let result = validate(&scenario);
    let error_text = result
        .errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    assert!(error_text.contains("unknown network 'net_missing'"), "{error_text}");
    assert!(error_text.contains("unknown flag 'flag_missing'"), "{error_text}");
    assert!(error_text.contains("unknown host 'host_missing'"), "{error_text}");

    let warning_text = result
        .warnings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    assert!(
        warning_text.contains("undefined vulnerability 'vuln_missing'"),
        "{warning_text}"
    );
}

#[test]
fn schema_violations_short_circuit() {
    let scenario = parse_scenario(
        r#"{
        "metadata": {"name": "Bad Ids"},
        "networks": [{"id": "Net-1", "name": "n", "type": "bridge", "subnet": "10.0.0.0/24"}],
        "hosts": [
            {"id": "host_a", "name": "a", "type": "web",
             "networks": [{"network_id": "net_missing"}]}
        ],
        "flags": []
    }"#,
    )
    .unwrap();

    let result = validate(&scenario);
    assert!(result.has_errors());
    // Only the id-pattern error; the dangling reference is not reported
    // because semantic passes never ran.
    assert!(result.errors.iter().all(|e| e.message.contains("Invalid id")));
    assert!(!result.errors.iter().any(|e| e.message.contains("net_missing")));
}

#[test]
fn empty_collections_are_schema_errors() {
    let scenario = parse_scenario(
        r#"{"metadata": {"name": "Empty"}, "networks": [], "hosts": [], "flags": []}"#,
    )
    .unwrap();

    let result = validate(&scenario);
    assert!(result.errors.iter().any(|e| e.message.contains("at least one network")));
    assert!(result.errors.iter().any(|e| e.message.contains("at least one host")));
}

#[test]
fn duplicate_ids_across_kinds_are_reported() {
    let mut scenario = common::minimal_scenario();
    let dup = scenario.networks[0].clone();
    scenario.networks.push(dup);
    let dup = scenario.hosts[0].clone();
    scenario.hosts.push(dup);

    let result = validate(&scenario);
    assert!(
        result
            .errors
            .iter()
            .any(|e| e.message.contains("Duplicate network ID: 'net_dmz'"))
    );
    assert!(
        result
            .errors
            .iter()
            .any(|e| e.message.contains("Duplicate host ID: 'host_web'"))
    );
}

#[test]
fn flag_correctness_covers_values_and_placements() {
    let scenario = parse_scenario(
        r#"{
        "metadata": {"name": "Flag Lab"},
        "networks": [{"id": "net_a", "name": "a", "type": "bridge", "subnet": "10.0.0.0/24"}],
        "hosts": [
            {"id": "host_a", "name": "a", "type": "db",
             "networks": [{"network_id": "net_a"}]}
        ],
        "flags": [
            {"id": "flag_a", "name": "a", "value": "FLAG{same}",
             "placement": {"type": "env_var", "host_id": "host_a", "variable": "FLAG_A"}},
            {"id": "flag_b", "name": "b", "value": "FLAG{same}",
             "placement": {"type": "db_row", "host_id": "host_a",
                           "details": {"table": "secrets"}}}
        ]
    }"#,
    )
    .unwrap();

    let result = validate(&scenario);
    assert!(
        result
            .errors
            .iter()
            .any(|e| e.message.contains("Duplicate flag value: 'FLAG{same}'"))
    );
    // db_row placement lacks a query.
    assert!(
        result
            .errors
            .iter()
            .any(|e| e.message.contains("'table' and 'query'"))
    );
}

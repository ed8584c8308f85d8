//! Scenario validation.
//!
//! Validation runs in ordered passes over the typed scenario tree:
//!
//! 1. **Schema**: id patterns and minimum-cardinality rules. Any schema
//!    error short-circuits the remaining passes, which assume a well-formed
//!    tree. (Type, required-field, and enum conformance are enforced earlier
//!    by the document decoder; a decode failure reaches the caller as a
//!    single schema issue.)
//! 2. **Reference integrity**: every cross-reference resolves.
//! 3. **Topology sanity**: network/host counts, attacker cardinality,
//!    orphans, unreferenced networks.
//! 4. **Flag correctness**: unique ids and values, per-placement-kind
//!    required fields.
//!
//! Each pass collects ALL issues it can find rather than stopping at the
//! first, so users get comprehensive feedback in one run.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Issue, Severity};
use crate::scenario::schema::{FlagPlacement, Scenario};

/// Identifier pattern shared by every entity kind.
static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z][a-z0-9_]*$").expect("static pattern"));

/// Similarity threshold for did-you-mean hints.
const SUGGESTION_THRESHOLD: f64 = 0.85;

// ============================================================================
// Public API
// ============================================================================

/// Result of scenario validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that block deployment.
    pub errors: Vec<Issue>,
    /// Advisory issues.
    pub warnings: Vec<Issue>,
}

impl ValidationResult {
    /// `true` when no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `true` when at least one error was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `true` when at least one warning was found.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All issues, errors first.
    #[must_use]
    pub fn all_issues(&self) -> Vec<&Issue> {
        self.errors.iter().chain(self.warnings.iter()).collect()
    }
}

/// Validates a scenario document.
#[must_use]
pub fn validate(scenario: &Scenario) -> ValidationResult {
    Validator::new().run(scenario)
}

/// Scenario validator collecting issues across ordered passes.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every validation pass and returns the collected result.
    pub fn run(&mut self, scenario: &Scenario) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_schema(scenario);
        if !self.errors.is_empty() {
            // Semantic passes assume a well-typed tree.
            return self.finish();
        }

        self.validate_references(scenario);
        self.validate_topology(scenario);
        self.validate_flags(scenario);

        self.finish()
    }

    fn finish(&mut self) -> ValidationResult {
        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Pass 1: Schema
    // ========================================================================

    fn validate_schema(&mut self, scenario: &Scenario) {
        if scenario.networks.is_empty() {
            self.add_error("networks", "Scenario must have at least one network");
        }
        if scenario.hosts.is_empty() {
            self.add_error("hosts", "Scenario must have at least one host");
        }

        for (idx, network) in scenario.networks.iter().enumerate() {
            self.check_id(&network.id, &format!("networks[{idx}].id"));
        }
        for (idx, service) in scenario.services.iter().enumerate() {
            self.check_id(&service.id, &format!("services[{idx}].id"));
        }
        for (idx, host) in scenario.hosts.iter().enumerate() {
            self.check_id(&host.id, &format!("hosts[{idx}].id"));
        }
        for (idx, flag) in scenario.flags.iter().enumerate() {
            self.check_id(&flag.id, &format!("flags[{idx}].id"));
        }
        for (idx, vuln) in scenario.vulnerabilities.iter().enumerate() {
            self.check_id(&vuln.id, &format!("vulnerabilities[{idx}].id"));
        }
    }

    fn check_id(&mut self, id: &str, path: &str) {
        if !ID_PATTERN.is_match(id) {
            self.add_error(
                path,
                &format!("Invalid id '{id}': must match ^[a-z][a-z0-9_]*$"),
            );
        }
    }

    // ========================================================================
    // Pass 2: Reference integrity
    // ========================================================================

    fn validate_references(&mut self, scenario: &Scenario) {
        let network_ids: HashSet<&str> = scenario.networks.iter().map(|n| n.id.as_str()).collect();
        let host_ids: HashSet<&str> = scenario.hosts.iter().map(|h| h.id.as_str()).collect();
        let flag_ids: HashSet<&str> = scenario.flags.iter().map(|f| f.id.as_str()).collect();
        let vuln_ids: HashSet<&str> = scenario
            .vulnerabilities
            .iter()
            .map(|v| v.id.as_str())
            .collect();

        // Duplicate ids within each kind.
        self.check_duplicates(
            scenario.networks.iter().map(|n| n.id.as_str()),
            "networks",
            "network",
        );
        self.check_duplicates(
            scenario.hosts.iter().map(|h| h.id.as_str()),
            "hosts",
            "host",
        );
        self.check_duplicates(
            scenario.services.iter().map(|s| s.id.as_str()),
            "services",
            "service",
        );
        self.check_duplicates(
            scenario.vulnerabilities.iter().map(|v| v.id.as_str()),
            "vulnerabilities",
            "vulnerability",
        );

        for (idx, host) in scenario.hosts.iter().enumerate() {
            for (net_idx, attachment) in host.networks.iter().enumerate() {
                if !network_ids.contains(attachment.network_id.as_str()) {
                    self.add_error(
                        &format!("hosts[{idx}].networks[{net_idx}]"),
                        &with_suggestion(
                            format!(
                                "Host '{}' references unknown network '{}'",
                                host.id, attachment.network_id
                            ),
                            &attachment.network_id,
                            network_ids.iter().copied(),
                        ),
                    );
                }
            }

            for flag_id in &host.flags {
                if !flag_ids.contains(flag_id.as_str()) {
                    self.add_error(
                        &format!("hosts[{idx}].flags"),
                        &with_suggestion(
                            format!("Host '{}' references unknown flag '{flag_id}'", host.id),
                            flag_id,
                            flag_ids.iter().copied(),
                        ),
                    );
                }
            }

            if host.is_attacker() && !host.flags.is_empty() {
                self.add_warning(
                    &format!("hosts[{idx}]"),
                    &format!("Attacker host '{}' has flags - this is unusual", host.id),
                );
            }

            // Unknown vulnerability references only warn, and only when the
            // scenario declares a top-level vulnerability catalog to check
            // against.
            if !scenario.vulnerabilities.is_empty() {
                for vuln_id in &host.vulnerabilities {
                    if !vuln_ids.contains(vuln_id.as_str()) {
                        self.add_warning(
                            &format!("hosts[{idx}].vulnerabilities"),
                            &format!(
                                "Host '{}' references undefined vulnerability '{vuln_id}'",
                                host.id
                            ),
                        );
                    }
                }
            }
        }

        for (idx, flag) in scenario.flags.iter().enumerate() {
            let target = flag.placement.host_id();
            if !host_ids.contains(target) {
                self.add_error(
                    &format!("flags[{idx}].placement.host_id"),
                    &with_suggestion(
                        format!("Flag '{}' references unknown host '{target}'", flag.id),
                        target,
                        host_ids.iter().copied(),
                    ),
                );
            }
        }
    }

    fn check_duplicates<'a>(
        &mut self,
        ids: impl Iterator<Item = &'a str>,
        path: &str,
        kind: &str,
    ) {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                self.add_error(path, &format!("Duplicate {kind} ID: '{id}'"));
            }
        }
    }

    // ========================================================================
    // Pass 3: Topology sanity
    // ========================================================================

    fn validate_topology(&mut self, scenario: &Scenario) {
        let attacker_count = scenario.hosts.iter().filter(|h| h.is_attacker()).count();
        if attacker_count == 0 {
            self.add_warning("hosts", "No attacker host defined - scenario may not be solvable");
        } else if attacker_count > 1 {
            self.add_warning(
                "hosts",
                &format!("Multiple attacker hosts defined ({attacker_count}) - this is unusual"),
            );
        }

        let mut used_networks: HashSet<&str> = HashSet::new();
        for (idx, host) in scenario.hosts.iter().enumerate() {
            if host.networks.is_empty() {
                self.add_warning(
                    &format!("hosts[{idx}]"),
                    &format!("Host '{}' is not connected to any network", host.id),
                );
            }
            for attachment in &host.networks {
                used_networks.insert(attachment.network_id.as_str());
            }
        }

        for (idx, network) in scenario.networks.iter().enumerate() {
            if !used_networks.contains(network.id.as_str()) {
                self.add_warning(
                    &format!("networks[{idx}]"),
                    &format!("Network '{}' is defined but not used by any host", network.id),
                );
            }
        }
    }

    // ========================================================================
    // Pass 4: Flag correctness
    // ========================================================================

    fn validate_flags(&mut self, scenario: &Scenario) {
        if scenario.flags.is_empty() {
            self.add_warning("flags", "Scenario has no flags - users won't have clear objectives");
            return;
        }

        let mut seen_ids = HashSet::new();
        let mut seen_values = HashSet::new();
        for (idx, flag) in scenario.flags.iter().enumerate() {
            if !seen_ids.insert(flag.id.as_str()) {
                self.add_error(
                    &format!("flags[{idx}].id"),
                    &format!("Duplicate flag ID: '{}'", flag.id),
                );
            }
            if !seen_values.insert(flag.value.as_str()) {
                self.add_error(
                    &format!("flags[{idx}].value"),
                    &format!("Duplicate flag value: '{}'", flag.value),
                );
            }

            self.validate_placement(&flag.placement, &format!("flags[{idx}].placement"));
        }
    }

    fn validate_placement(&mut self, placement: &FlagPlacement, path: &str) {
        match placement {
            FlagPlacement::File { path: file_path, details, .. } => {
                let resolved = file_path
                    .as_deref()
                    .or_else(|| details.as_ref().and_then(|d| d.path.as_deref()));
                if resolved.is_none_or(str::is_empty) {
                    self.add_error(path, "File placement requires 'path' field");
                }
            }
            FlagPlacement::EnvVar { variable, details, .. } => {
                let resolved = variable
                    .as_deref()
                    .or_else(|| details.as_ref().and_then(|d| d.variable.as_deref()));
                if resolved.is_none_or(str::is_empty) {
                    self.add_error(path, "Environment variable placement requires 'variable' field");
                }
            }
            FlagPlacement::DbRow { details, .. } => {
                let has_table = details
                    .as_ref()
                    .and_then(|d| d.table.as_deref())
                    .is_some_and(|t| !t.is_empty());
                let has_query = details
                    .as_ref()
                    .and_then(|d| d.query.as_deref())
                    .is_some_and(|q| !q.is_empty());
                if !has_table || !has_query {
                    self.add_error(path, "Database placement requires 'table' and 'query' in details");
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(Issue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(Issue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

/// Appends a did-you-mean hint when a declared id is close to the unknown one.
fn with_suggestion<'a>(
    message: String,
    target: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> String {
    let best = candidates
        .map(|c| (strsim::jaro_winkler(target, c), c))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0));

    match best {
        Some((_, candidate)) => format!("{message} (did you mean '{candidate}'?)"),
        None => message,
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Resource policy engine.
//!
//! Maps a scenario's difficulty (or a named policy) to container resource
//! limits. Selection priority: named `resource_policy` in scenario
//! metadata, then the difficulty tier, then the engine default. Engines are
//! plain values passed into provisioning; there is no global registry.

use indexmap::IndexMap;

use crate::scenario::schema::{Difficulty, HostResources, Metadata};

/// Difficulty tiers with default resource policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyTier {
    /// Generous limits.
    Easy,
    /// Balanced limits.
    Medium,
    /// Tight limits.
    Hard,
}

impl From<Difficulty> for DifficultyTier {
    fn from(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self::Easy,
            Difficulty::Medium => Self::Medium,
            Difficulty::Hard => Self::Hard,
        }
    }
}

/// Resource constraints applied to a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLimits {
    /// CPU cores.
    pub cpu: Option<f64>,
    /// Memory limit (e.g. `"512m"`).
    pub memory: Option<String>,
    /// Disk limit (e.g. `"10g"`).
    pub disk: Option<String>,
    /// Max process count.
    pub pids: Option<u32>,
}

impl ResourceLimits {
    /// Default limits for a difficulty tier.
    #[must_use]
    pub fn for_tier(tier: DifficultyTier) -> Self {
        match tier {
            DifficultyTier::Easy => Self {
                cpu: Some(2.0),
                memory: Some("2g".to_string()),
                disk: Some("20g".to_string()),
                pids: Some(1024),
            },
            DifficultyTier::Medium => Self {
                cpu: Some(1.0),
                memory: Some("1g".to_string()),
                disk: Some("10g".to_string()),
                pids: Some(512),
            },
            DifficultyTier::Hard => Self {
                cpu: Some(0.5),
                memory: Some("512m".to_string()),
                disk: Some("5g".to_string()),
                pids: Some(256),
            },
        }
    }
}

/// A named resource policy.
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    /// Policy name.
    pub name: String,
    /// Tier the policy was derived from; `None` for custom policies.
    pub tier: Option<DifficultyTier>,
    /// The limits to apply.
    pub limits: ResourceLimits,
    /// Whether limits are injected at all.
    pub enforce_limits: bool,
    /// When `true`, host-declared limits win over policy limits.
    pub allow_override: bool,
}

impl ResourcePolicy {
    /// Creates a policy from a difficulty tier.
    #[must_use]
    pub fn from_tier(tier: DifficultyTier) -> Self {
        let name = match tier {
            DifficultyTier::Easy => "easy_policy",
            DifficultyTier::Medium => "medium_policy",
            DifficultyTier::Hard => "hard_policy",
        };
        Self {
            name: name.to_string(),
            tier: Some(tier),
            limits: ResourceLimits::for_tier(tier),
            enforce_limits: true,
            allow_override: false,
        }
    }

    /// Creates a custom named policy.
    #[must_use]
    pub fn custom(name: impl Into<String>, limits: ResourceLimits, allow_override: bool) -> Self {
        Self {
            name: name.into(),
            tier: None,
            limits,
            enforce_limits: true,
            allow_override,
        }
    }
}

/// Enforces resource policies on scenario hosts.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    default_tier: DifficultyTier,
    custom_policies: IndexMap<String, ResourcePolicy>,
}

impl Default for PolicyEngine {
    /// Engine with the `medium` default tier plus the `minimal` and
    /// `generous` example policies registered.
    fn default() -> Self {
        let mut engine = Self::new(DifficultyTier::Medium);
        engine.register(ResourcePolicy::custom(
            "minimal",
            ResourceLimits {
                cpu: Some(0.25),
                memory: Some("256m".to_string()),
                disk: Some("2g".to_string()),
                pids: Some(128),
            },
            false,
        ));
        engine.register(ResourcePolicy::custom(
            "generous",
            ResourceLimits {
                cpu: Some(4.0),
                memory: Some("4g".to_string()),
                disk: Some("50g".to_string()),
                pids: Some(2048),
            },
            true,
        ));
        engine
    }
}

impl PolicyEngine {
    /// Creates an engine with the given default tier and no custom policies.
    #[must_use]
    pub fn new(default_tier: DifficultyTier) -> Self {
        Self {
            default_tier,
            custom_policies: IndexMap::new(),
        }
    }

    /// Registers a custom policy under its name.
    pub fn register(&mut self, policy: ResourcePolicy) {
        self.custom_policies.insert(policy.name.clone(), policy);
    }

    /// Replaces the fallback tier, keeping registered policies.
    #[must_use]
    pub fn with_default_tier(mut self, tier: DifficultyTier) -> Self {
        self.default_tier = tier;
        self
    }

    /// Resolves the policy for a scenario.
    ///
    /// Priority: named `resource_policy`, then difficulty tier, then the
    /// engine default. An unknown policy name falls through to the tier.
    #[must_use]
    pub fn policy_for(&self, metadata: &Metadata) -> ResourcePolicy {
        if let Some(name) = &metadata.resource_policy
            && let Some(policy) = self.custom_policies.get(name)
        {
            return policy.clone();
        }

        if let Some(difficulty) = metadata.difficulty {
            return ResourcePolicy::from_tier(difficulty.into());
        }

        ResourcePolicy::from_tier(self.default_tier)
    }

    /// Applies a policy to host-declared resources.
    ///
    /// When the policy allows overrides and the host declares any limit,
    /// the host's limits win unchanged. Otherwise the policy's limits are
    /// written over the host's, field by field.
    #[must_use]
    pub fn apply(&self, declared: &HostResources, policy: &ResourcePolicy) -> HostResources {
        if policy.allow_override && !declared.is_empty() {
            return declared.clone();
        }
        if !policy.enforce_limits {
            return declared.clone();
        }

        let mut effective = declared.clone();
        if let Some(cpu) = policy.limits.cpu {
            effective.cpu_limit = Some(format_cpu(cpu));
        }
        if let Some(memory) = &policy.limits.memory {
            effective.memory_limit = Some(memory.clone());
        }
        if let Some(disk) = &policy.limits.disk {
            effective.disk_limit = Some(disk.clone());
        }
        if let Some(pids) = policy.limits.pids {
            effective.pids_limit = Some(pids);
        }
        effective
    }

    /// Validates host-declared limits against policy maxima.
    ///
    /// # Errors
    ///
    /// Returns every violation joined by `"; "`.
    pub fn validate_limits(
        &self,
        declared: &HostResources,
        policy: &ResourcePolicy,
    ) -> Result<(), String> {
        if !policy.enforce_limits {
            return Ok(());
        }

        let mut violations = Vec::new();

        if let (Some(declared_cpu), Some(max_cpu)) = (&declared.cpu_limit, policy.limits.cpu) {
            match declared_cpu.parse::<f64>() {
                Ok(cpu) if cpu > max_cpu => violations.push(format!(
                    "CPU limit {declared_cpu} exceeds policy maximum {max_cpu}"
                )),
                Ok(_) => {}
                Err(_) => violations.push(format!("Invalid CPU limit format: {declared_cpu}")),
            }
        }

        if let Some(memory) = &declared.memory_limit
            && !has_size_unit(memory)
        {
            violations.push(format!("Invalid memory limit format: {memory}"));
        }

        if let Some(disk) = &declared.disk_limit
            && !has_size_unit(disk)
        {
            violations.push(format!("Invalid disk limit format: {disk}"));
        }

        if let (Some(declared_pids), Some(max_pids)) = (declared.pids_limit, policy.limits.pids)
            && declared_pids > max_pids
        {
            violations.push(format!(
                "PID limit {declared_pids} exceeds policy maximum {max_pids}"
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }
}

/// Renders a CPU core count the way the runtime flag expects it.
fn format_cpu(cpu: f64) -> String {
    if (cpu.fract()).abs() < f64::EPSILON {
        format!("{cpu:.1}")
    } else {
        cpu.to_string()
    }
}

/// Accepts `512m`, `2G`, `100k`-style size strings.
fn has_size_unit(value: &str) -> bool {
    value
        .chars()
        .last()
        .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'k' | 'm' | 'g'))
}

// ============================================================================
// Tests
// ============================================================================

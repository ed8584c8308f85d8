//! CLI argument definitions.
//!
//! All clap derive structs for rangeforge command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::logging::LogFormat;
use crate::provisioner::{IdempotentMode, SecurityLevel};

// ============================================================================
// Root CLI
// ============================================================================

/// Declarative cyber-range scenario deployer.
#[derive(Parser, Debug)]
#[command(name = "rangeforge", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "RANGEFORGE_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a scenario file.
    Validate(ValidateArgs),

    /// Plan deployment order and resources for a scenario.
    Plan(PlanArgs),

    /// Provision a scenario (dry-run by default).
    Provision(ProvisionArgs),
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Scenario file (.json, .yaml, .yml).
    pub scenario: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Scenario file (.json, .yaml, .yml).
    pub scenario: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `provision`.
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Scenario file (.json, .yaml, .yml).
    pub scenario: PathBuf,

    /// Execute runtime commands instead of a dry run.
    #[arg(long)]
    pub execute: bool,

    /// Apply the legacy minimal hardening set to every container.
    #[arg(long, conflicts_with = "security_profile")]
    pub isolate: bool,

    /// Named security profile applied to every container.
    #[arg(long, value_enum)]
    pub security_profile: Option<SecurityLevel>,

    /// Provision independent hosts concurrently.
    #[arg(long)]
    pub parallel: bool,

    /// Max concurrent workers per wave.
    #[arg(long, default_value_t = 4, env = "RANGEFORGE_MAX_WORKERS")]
    pub max_workers: usize,

    /// Resource policy tier used when the scenario does not pick one.
    #[arg(long, value_enum)]
    pub policy_tier: Option<PolicyTier>,

    /// What to do when a resource already exists.
    #[arg(long, value_enum, default_value = "skip")]
    pub idempotent_mode: IdempotentMode,

    /// Budget for one container to become healthy.
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub health_timeout: Duration,

    /// Write deployment events as JSONL to this file.
    #[arg(long, env = "RANGEFORGE_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on 127.0.0.1:<port> for the run.
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Container runtime binary to drive.
    #[arg(long, default_value = "docker", env = "RANGEFORGE_RUNTIME")]
    pub runtime: String,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Resource policy tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyTier {
    /// Generous limits.
    Easy,
    /// Balanced limits.
    Medium,
    /// Tight limits.
    Hard,
}

impl From<PolicyTier> for crate::provisioner::DifficultyTier {
    fn from(tier: PolicyTier) -> Self {
        match tier {
            PolicyTier::Easy => Self::Easy,
            PolicyTier::Medium => Self::Medium,
            PolicyTier::Hard => Self::Hard,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_parses() {
        let cli = Cli::try_parse_from(["rangeforge", "validate", "lab.json"]);
        assert!(cli.is_ok(), "{cli:?}");
    }

    #[test]
    fn plan_parses_with_format() {
        let cli = Cli::try_parse_from(["rangeforge", "plan", "--format", "json", "lab.json"]);
        assert!(cli.is_ok(), "{cli:?}");
    }

    #[test]
    fn provision_defaults() {
        let cli = Cli::try_parse_from(["rangeforge", "provision", "lab.json"]).unwrap();
        let Commands::Provision(args) = cli.command else {
            panic!("expected provision");
        };
        assert!(!args.execute);
        assert!(!args.parallel);
        assert_eq!(args.idempotent_mode, IdempotentMode::Skip);
        assert_eq!(args.max_workers, 4);
        assert_eq!(args.health_timeout, Duration::from_secs(60));
        assert_eq!(args.runtime, "docker");
    }

    #[test]
    fn provision_full_flag_set() {
        let cli = Cli::try_parse_from([
            "rangeforge",
            "provision",
            "lab.json",
            "--execute",
            "--parallel",
            "--security-profile",
            "strict",
            "--policy-tier",
            "hard",
            "--idempotent-mode",
            "replace",
            "--health-timeout",
            "90s",
            "--metrics-port",
            "9184",
        ])
        .unwrap();
        let Commands::Provision(args) = cli.command else {
            panic!("expected provision");
        };
        assert!(args.execute && args.parallel);
        assert_eq!(args.security_profile, Some(SecurityLevel::Strict));
        assert_eq!(args.policy_tier, Some(PolicyTier::Hard));
        assert_eq!(args.idempotent_mode, IdempotentMode::Replace);
        assert_eq!(args.health_timeout, Duration::from_secs(90));
        assert_eq!(args.metrics_port, Some(9184));
    }

    #[test]
    fn isolate_conflicts_with_security_profile() {
        let cli = Cli::try_parse_from([
            "rangeforge",
            "provision",
            "lab.json",
            "--isolate",
            "--security-profile",
            "minimal",
        ]);
        assert!(cli.is_err(), "expected conflict error");
    }

    #[test]
    fn verbose_counts_and_quiet() {
        let cli = Cli::try_parse_from(["rangeforge", "-vv", "validate", "lab.json"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["rangeforge", "--quiet", "validate", "lab.json"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn bad_health_timeout_is_rejected() {
        let cli = Cli::try_parse_from([
            "rangeforge",
            "provision",
            "lab.json",
            "--health-timeout",
            "soon",
        ]);
        assert!(cli.is_err());
    }
}

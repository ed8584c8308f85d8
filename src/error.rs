//! Error types for rangeforge.
//!
//! Stage results (validation, planning, provisioning) accumulate [`Issue`]
//! values instead of failing fast; `Err` is reserved for I/O and document
//! decoding failures that make a stage impossible to run at all.

use std::path::PathBuf;

use thiserror::Error;

/// Severity of a reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the pipeline from advancing to the next stage.
    Error,
    /// Advisory only; never gates a stage.
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

/// A single validation or planning issue.
///
/// `path` is a dotted/indexed location into the scenario document
/// (e.g. `hosts[2].networks[0]`), empty when the issue is document-wide.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Issue {
    /// Location in the scenario document.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Error or warning.
    pub severity: Severity,
}

impl Issue {
    /// Creates an error-severity issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Creates a warning-severity issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.severity, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
        }
    }
}

/// Failures while reading or decoding a scenario document.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file does not exist.
    #[error("scenario file not found: {path}")]
    MissingFile {
        /// Path that was attempted.
        path: PathBuf,
    },

    /// The file extension is not a supported scenario format.
    #[error("unsupported scenario format '{extension}' (expected .json, .yaml, or .yml)")]
    UnsupportedFormat {
        /// The offending extension.
        extension: String,
    },

    /// The document is not well-formed JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is not well-formed YAML.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Underlying I/O failure.
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while driving the container runtime.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The runtime binary could not be spawned.
    #[error("failed to spawn runtime command '{command}': {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// The runtime did not answer within the allotted time.
    #[error("runtime command '{command}' timed out after {timeout:?}")]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Elapsed budget.
        timeout: std::time::Duration,
    },

    /// The container runtime is not reachable at all.
    #[error("container runtime does not appear to be available on this host")]
    RuntimeUnavailable,
}

/// Top-level error type for rangeforge operations.
#[derive(Debug, Error)]
pub enum RangeforgeError {
    /// Scenario loading or decoding failed.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Runtime invocation failed outright.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// A pipeline stage reported errors; details were already printed.
    #[error("{stage} reported {count} error(s)")]
    StageFailed {
        /// Which stage failed (`validation`, `planning`, `provisioning`).
        stage: &'static str,
        /// Number of errors the stage accumulated.
        count: usize,
    },

    /// I/O failure outside scenario loading (event files, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process exit codes used by the CLI.
pub struct ExitCode;

impl ExitCode {
    /// Success.
    pub const OK: i32 = 0;
    /// The invoked stage reported at least one error.
    pub const FAILURE: i32 = 1;
    /// The command line itself was unusable.
    pub const USAGE: i32 = 2;
}

impl RangeforgeError {
    /// Maps an error to its process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Scenario(_) | Self::Executor(_) | Self::StageFailed { .. } | Self::Io(_) => {
                ExitCode::FAILURE
            }
        }
    }
}

/// Result type alias for rangeforge operations.
pub type Result<T> = std::result::Result<T, RangeforgeError>;

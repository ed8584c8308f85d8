//! Container runtime port.
//!
//! The core never shells out directly: it builds argv and hands it to an
//! [`Executor`]. Probes use runtime-neutral verbs (`net-inspect`,
//! `container-inspect`, `inspect --format ...`); the bundled
//! [`DockerCliExecutor`] translates those verbs and prefixes the binary
//! name. Everything else passes through opaquely, so a fake executor in
//! tests sees exactly what the real runtime would.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::ExecutorError;

/// Captured output of one runtime invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code; `-1` when terminated by signal.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ExecOutput {
    /// `true` when the invocation exited zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr when present, stdout otherwise - the most useful diagnostic.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// The sole side-effecting collaborator of the provisioner.
///
/// Implementations must be safe to call concurrently; the parallel
/// scheduler invokes the executor from multiple workers at once.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Invokes the runtime with the given argv.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] only when the invocation itself could not
    /// be performed; a nonzero exit is reported through [`ExecOutput`].
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput, ExecutorError>;
}

// ============================================================================
// Probes
// ============================================================================

/// Container health as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Healthcheck passing.
    Healthy,
    /// Within the start period or still probing.
    Starting,
    /// Healthcheck failing.
    Unhealthy,
    /// The container defines no healthcheck.
    None,
}

/// Checks whether a network exists.
///
/// # Errors
///
/// Propagates probe failures from the executor.
pub async fn network_exists(executor: &dyn Executor, id: &str) -> Result<bool, ExecutorError> {
    let output = executor
        .exec(&["net-inspect".to_string(), id.to_string()])
        .await?;
    Ok(output.success())
}

/// Checks whether a container exists.
///
/// # Errors
///
/// Propagates probe failures from the executor.
pub async fn container_exists(executor: &dyn Executor, name: &str) -> Result<bool, ExecutorError> {
    let output = executor
        .exec(&["container-inspect".to_string(), name.to_string()])
        .await?;
    Ok(output.success())
}

/// Reads a container's health status.
///
/// # Errors
///
/// Propagates probe failures from the executor.
pub async fn health_status(
    executor: &dyn Executor,
    name: &str,
) -> Result<HealthStatus, ExecutorError> {
    let output = executor
        .exec(&[
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .State.Health}}".to_string(),
            name.to_string(),
        ])
        .await?;

    let raw = output.stdout.trim();
    if !output.success() || raw.is_empty() || raw == "null" {
        return Ok(HealthStatus::None);
    }

    let status = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| v.get("Status").and_then(|s| s.as_str()).map(str::to_string));

    Ok(match status.as_deref() {
        Some("healthy") => HealthStatus::Healthy,
        Some("starting") => HealthStatus::Starting,
        Some("unhealthy") => HealthStatus::Unhealthy,
        _ => HealthStatus::None,
    })
}

/// Checks whether a container is running.
///
/// # Errors
///
/// Propagates probe failures from the executor.
pub async fn is_running(executor: &dyn Executor, name: &str) -> Result<bool, ExecutorError> {
    let output = executor
        .exec(&[
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            name.to_string(),
        ])
        .await?;
    Ok(output.success() && output.stdout.trim() == "true")
}

/// Polls a container until it reports healthy or the budget elapses.
///
/// Containers without a healthcheck are satisfied once they are running.
///
/// # Errors
///
/// Returns a human-readable error on timeout; probe failures are retried
/// until the deadline.
pub async fn wait_for_healthy(
    executor: &dyn Executor,
    name: &str,
    wait_timeout: Duration,
    poll_interval: Duration,
) -> Result<(), String> {
    let deadline = tokio::time::Instant::now() + wait_timeout;

    loop {
        match health_status(executor, name).await {
            Ok(HealthStatus::Healthy) => return Ok(()),
            Ok(HealthStatus::None) => {
                if matches!(is_running(executor, name).await, Ok(true)) {
                    return Ok(());
                }
            }
            Ok(HealthStatus::Starting | HealthStatus::Unhealthy) => {}
            Err(error) => {
                tracing::debug!(container = name, %error, "health probe failed, retrying");
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(format!(
                "Health timeout for container '{name}' after {}s",
                wait_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

// ============================================================================
// Docker CLI adapter
// ============================================================================

/// Default per-invocation budget for runtime commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Budget for the reachability preflight.
const INFO_TIMEOUT: Duration = Duration::from_secs(15);

/// [`Executor`] implementation that shells out to the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCliExecutor {
    binary: String,
    command_timeout: Duration,
}

impl Default for DockerCliExecutor {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliExecutor {
    /// Creates an executor invoking the given runtime binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    /// Overrides the per-invocation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    /// Checks that the runtime daemon answers within a short timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::RuntimeUnavailable`] when `info` fails or
    /// does not answer in time.
    pub async fn ensure_available(&self) -> Result<(), ExecutorError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let available = timeout(INFO_TIMEOUT, command.status())
            .await
            .ok()
            .and_then(Result::ok)
            .map(|status| status.success())
            .unwrap_or(false);

        if available {
            Ok(())
        } else {
            Err(ExecutorError::RuntimeUnavailable)
        }
    }

    /// Maps the runtime-neutral probe verbs onto docker subcommands.
    fn translate<'a>(argv: &'a [String]) -> Vec<&'a str> {
        match argv.first().map(String::as_str) {
            Some("net-inspect") => std::iter::once("network")
                .chain(std::iter::once("inspect"))
                .chain(argv[1..].iter().map(String::as_str))
                .collect(),
            Some("container-inspect") => std::iter::once("container")
                .chain(std::iter::once("inspect"))
                .chain(argv[1..].iter().map(String::as_str))
                .collect(),
            _ => argv.iter().map(String::as_str).collect(),
        }
    }
}

#[async_trait]
impl Executor for DockerCliExecutor {
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput, ExecutorError> {
        let args = Self::translate(argv);
        let rendered = format!("{} {}", self.binary, args.join(" "));

        let mut command = Command::new(&self.binary);
        command.args(&args).stdin(Stdio::null());

        let output = timeout(self.command_timeout, command.output())
            .await
            .map_err(|_| ExecutorError::Timeout {
                command: rendered.clone(),
                timeout: self.command_timeout,
            })?
            .map_err(|source| ExecutorError::Spawn {
                command: rendered,
                source,
            })?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

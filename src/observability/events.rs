//! Structured deployment event stream.
//!
//! Discrete, typed events emitted while provisioning runs. Events are
//! serialized as newline-delimited JSON (JSONL) and carry a monotonically
//! increasing sequence number plus the session id, so a run can be
//! reconstructed or reported on afterwards.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a provisioning run.
///
/// Each variant is tagged with `"type"` when serialized so consumers can
/// dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A provisioning run has started.
    RunStarted {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Scenario display name.
        scenario: String,
        /// Whether this is a dry run.
        dry_run: bool,
        /// Whether parallel execution was requested.
        parallel: bool,
    },

    /// A mutating operation was executed against the runtime.
    OperationExecuted {
        /// When the operation finished.
        timestamp: DateTime<Utc>,
        /// Operation kind (`network.create`, `container.run`, ...).
        op_type: String,
        /// The resource the operation targeted.
        target: String,
        /// Whether the runtime accepted it.
        success: bool,
    },

    /// An idempotent no-op: the resource already existed.
    OperationSkipped {
        /// When the skip was recorded.
        timestamp: DateTime<Utc>,
        /// Operation kind (`network.create.skip`, ...).
        op_type: String,
        /// The resource that already existed.
        target: String,
    },

    /// A container changed lifecycle state.
    StateChanged {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Container name.
        container: String,
        /// New state (`creating`, `running`, `healthy`, ...).
        state: String,
    },

    /// A health wait finished.
    HealthWait {
        /// When the wait finished.
        timestamp: DateTime<Utc>,
        /// Container that was waited on.
        container: String,
        /// Whether the container became healthy in time.
        healthy: bool,
        /// How long the wait took.
        waited_ms: u64,
    },

    /// The run finished.
    RunCompleted {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Number of operations in the stream.
        operations: usize,
        /// Number of accumulated errors.
        errors: usize,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with the session id and a sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    /// Session this event belongs to.
    session_id: &'a str,
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: &'a Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Writes deployment events as JSONL.
pub struct EventEmitter {
    session_id: String,
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("session_id", &self.session_id)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter writing to the given file, truncating it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be created.
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    /// Creates an emitter writing to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::from_writer(Box::new(std::io::stderr()))
    }

    fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// The session id stamped on every event.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Emits one event; serialization or write failures are logged and
    /// swallowed so event emission never aborts a deployment.
    pub fn emit(&self, event: &Event) {
        let envelope = EventEnvelope {
            session_id: &self.session_id,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            event,
        };

        let Ok(line) = serde_json::to_string(&envelope) else {
            tracing::warn!("failed to serialize deployment event");
            return;
        };

        let mut writer = self.writer.lock().expect("event writer poisoned");
        if writeln!(writer, "{line}").and_then(|()| writer.flush()).is_err() {
            tracing::warn!("failed to write deployment event");
        }
    }
}

/// Timestamp helper used by event constructors.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_envelope_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let emitter = EventEmitter::to_file(&path).unwrap();

        emitter.emit(&Event::RunStarted {
            timestamp: now(),
            scenario: "Mini Lab".to_string(),
            dry_run: true,
            parallel: false,
        });
        emitter.emit(&Event::RunCompleted {
            timestamp: now(),
            operations: 3,
            errors: 0,
        });

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "run_started");
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[0]["session_id"], lines[1]["session_id"]);
        assert_eq!(lines[0]["scenario"], "Mini Lab");
        assert_eq!(lines[1]["operations"], 3);
    }

    #[test]
    fn sequence_is_monotonic_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let emitter = std::sync::Arc::new(EventEmitter::to_file(&path).unwrap());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let emitter = std::sync::Arc::clone(&emitter);
                scope.spawn(move || {
                    for _ in 0..25 {
                        emitter.emit(&Event::StateChanged {
                            timestamp: now(),
                            container: "host_x".to_string(),
                            state: "running".to_string(),
                        });
                    }
                });
            }
        });

        let raw = std::fs::read_to_string(&path).unwrap();
        let mut sequences: Vec<u64> = raw
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["sequence"].as_u64().unwrap())
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (0..100).collect::<Vec<_>>());
    }
}

//! Scenario file loading.
//!
//! JSON is the canonical format; `.yaml`/`.yml` documents are accepted and
//! go through the same typed tree. Decode failures are surfaced as a single
//! schema-severity issue by the CLI rather than a panic or a partial result.

use std::path::Path;

use crate::error::ScenarioError;
use crate::scenario::schema::Scenario;

/// Loads a scenario document from disk, choosing the decoder by extension.
///
/// # Errors
///
/// Returns [`ScenarioError`] when the file is missing, has an unsupported
/// extension, or does not decode into a well-typed scenario tree.
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    if !path.exists() {
        return Err(ScenarioError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "json" => Ok(serde_json::from_str(&raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&raw)?),
        other => Err(ScenarioError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Parses a scenario from a JSON string.
///
/// # Errors
///
/// Returns [`ScenarioError::Json`] when the document is malformed or does
/// not match the scenario schema types.
pub fn parse_scenario(raw: &str) -> Result<Scenario, ScenarioError> {
    Ok(serde_json::from_str(raw)?)
}

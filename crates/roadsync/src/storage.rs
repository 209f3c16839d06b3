//! Roadmap file loading and run-report persistence.
//!
//! Roadmaps are YAML-first (JSON accepted, chosen by extension). Reports
//! are written as pretty JSON with an atomic write (temp file then rename).

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::domain::Roadmap;
use crate::ledger::RunReport;

/// Load a roadmap document from a YAML or JSON file.
pub fn load_roadmap(path: &Path) -> Result<Roadmap> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read roadmap {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let roadmap = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse roadmap {}", path.display()))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse roadmap {}", path.display()))?,
        other => bail!(
            "unsupported roadmap format '{}' (expected .yaml, .yml, or .json)",
            other
        ),
    };

    Ok(roadmap)
}

/// Persist a run report as pretty JSON.
pub fn save_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;

    // Atomic write: write to temp file, then rename
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to rename into {}", path.display()))?;

    Ok(())
}

//! Post-tour processing utilities.
//!
//! Handles snapshot capture and exports after a tour finishes.

use crate::cli::Cli;
use crate::store::{DemoState, DemoStore};
use anyhow::{Context, Result};
use std::path::Path;

/// Result of post-tour processing, ready for presentation layers.
pub(crate) struct ProcessedTour {
    pub snapshot: DemoState,
    pub export_messages: Vec<String>,
}

/// Capture the final store state and run any requested exports.
pub(crate) fn process_tour_completion(args: &Cli, store: &DemoStore) -> ProcessedTour {
    let snapshot = store.snapshot();

    let mut export_messages = Vec::new();
    if let Some(export_path) = args.export_json.as_deref() {
        match export_snapshot(export_path, &snapshot) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedTour {
        snapshot,
        export_messages,
    }
}

/// Write the store snapshot as pretty JSON.
pub(crate) fn export_snapshot(path: &Path, snapshot: &DemoState) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), "snapshot exported");
    Ok(())
}

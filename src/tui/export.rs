use crate::store::DemoState;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// File name for a snapshot exported at `at`.
pub fn snapshot_file_name(at: OffsetDateTime) -> Result<String> {
    let stamp = at
        .format(format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .context("format export timestamp")?;
    Ok(format!("demo-tour-snapshot-{stamp}.json"))
}

/// Export the store snapshot into `dir` under a timestamped name.
pub fn export_snapshot_json(snapshot: &DemoState, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(snapshot_file_name(OffsetDateTime::now_utc())?);
    crate::orchestrator::export_snapshot(&path, snapshot)?;
    Ok(path)
}

/// Export into the current working directory.
pub fn export_to_cwd(snapshot: &DemoState) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    export_snapshot_json(snapshot, &cwd)
}

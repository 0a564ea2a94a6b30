//! Atomic snapshot file writer.
//!
//! Snapshots are the interface to the external file server, so a reader
//! must never observe a half-written file: the JSON is staged in a temp
//! file next to the target and renamed into place.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Snapshot write errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Serialize `snapshot` as JSON and atomically replace `path` with it.
pub fn write_snapshot<T: Serialize>(path: &Path, snapshot: &T) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SnapshotError::Io(e.to_string()))?;
    }

    let json =
        serde_json::to_vec(snapshot).map_err(|e| SnapshotError::Serialization(e.to_string()))?;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| SnapshotError::Io(format!("failed to create temp file: {e}")))?;
    temp_file
        .write_all(&json)
        .map_err(|e| SnapshotError::Io(format!("failed to write temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| SnapshotError::Io(format!("failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| SnapshotError::Io(format!("failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| SnapshotError::Io(format!("failed to persist snapshot: {e}")))?;

    info!(path = %path.display(), bytes = json.len(), "snapshot written");
    Ok(())
}

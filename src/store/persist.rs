use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use crate::errors::StatusError;
use crate::pipeline::RunSnapshot;

/// Mirrors store snapshots to a JSON file that other processes can poll.
pub struct SnapshotWriter {
    path: PathBuf,
    last_written: Mutex<u64>,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` unless a newer revision is already on disk.
    /// Returns whether the file was written.
    pub async fn write(&self, snapshot: &RunSnapshot) -> Result<bool, StatusError> {
        let mut last_written = self.last_written.lock().await;
        if snapshot.revision <= *last_written {
            debug!(
                revision = snapshot.revision,
                on_disk = *last_written,
                "Skipping stale snapshot write"
            );
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        atomic_write(&self.path, &json).await?;
        *last_written = snapshot.revision;
        Ok(true)
    }
}

/// Atomic file write: write to temp, then rename
pub async fn atomic_write(path: &Path, content: &str) -> Result<(), StatusError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read a mirrored snapshot. A missing file means no run has been
/// mirrored yet and yields the empty snapshot.
pub async fn read_snapshot(path: &Path) -> Result<RunSnapshot, StatusError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RunSnapshot::empty()),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

//! Download-directory lifecycle: per-file cleanup and the age sweep.

use std::{
    path::Path,
    time::{Duration, SystemTime},
};

use tracing::{debug, warn};

use crate::error::{Context, Result};

/// Best-effort removal of one downloaded file. Returns whether a file was
/// actually deleted; a missing file is not an error.
pub async fn remove_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed downloaded file");
            true
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove downloaded file");
            false
        },
    }
}

/// Delete regular files in `dir` whose modification time is strictly older
/// than `max_age`. Returns the number of files removed. Subdirectories and
/// entries with unreadable metadata are skipped.
pub async fn sweep_older_than(dir: &Path, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("read download dir {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age > max_age && remove_file(&path).await {
            removed += 1;
        }
    }

    debug!(dir = %dir.display(), removed, "sweep finished");
    Ok(removed)
}

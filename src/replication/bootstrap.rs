use std::path::PathBuf;

use tracing::info;

use crate::ReplicatedStore;
use crate::Result;
use crate::SnapshotFiles;

/// Back up `store` and persist the blob as the snapshot taken at `index`.
pub async fn persist_snapshot<S: ReplicatedStore>(
    store: &S,
    files: &SnapshotFiles,
    index: u64,
) -> Result<PathBuf> {
    let blob = store.backup().await?;
    files.persist(index, &blob).await
}

/// Restore `store` from the newest persisted snapshot, if any.
///
/// Returns the log index the snapshot covers; the replica resumes applying
/// right after it.
pub async fn bootstrap_from_latest<S: ReplicatedStore>(
    store: &S,
    files: &SnapshotFiles,
) -> Result<Option<u64>> {
    let Some((index, blob)) = files.latest().await? else {
        info!(dir = %files.base_dir().display(), "no snapshot found, starting empty");
        return Ok(None);
    };

    store.restore(&blob).await?;
    info!(index, bytes = blob.len(), "replica bootstrapped from snapshot");
    Ok(Some(index))
}

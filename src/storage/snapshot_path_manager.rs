use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::SNAPSHOT_FILE_PREFIX;
use crate::constants::SNAPSHOT_FILE_SUFFIX;
use crate::constants::SNAPSHOT_TEMP_PREFIX;
use crate::NodeConfig;
use crate::Result;
use crate::StoreError;

/// Persisted backup blobs of one node, named `snapshot-<index>.bin`.
///
/// Blobs are written to a temporary file first and renamed into place, so a
/// reader never observes a partially written snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    base_dir: PathBuf,
}

impl SnapshotFiles {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Snapshot files under the node's `snap_dir()`
    pub fn for_node(config: &NodeConfig) -> Self {
        Self::new(config.snap_dir())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn snapshot_path(
        &self,
        index: u64,
    ) -> PathBuf {
        self.base_dir
            .join(format!("{}{}{}", SNAPSHOT_FILE_PREFIX, index, SNAPSHOT_FILE_SUFFIX))
    }

    fn temp_path(
        &self,
        index: u64,
    ) -> PathBuf {
        self.base_dir.join(format!("{}{}", SNAPSHOT_TEMP_PREFIX, index))
    }

    /// Extracts the log index from a snapshot filename
    pub fn parse_snapshot_filename(filename: &str) -> Option<u64> {
        filename
            .strip_prefix(SNAPSHOT_FILE_PREFIX)?
            .strip_suffix(SNAPSHOT_FILE_SUFFIX)?
            .parse()
            .ok()
    }

    /// Persist `blob` as the snapshot taken at log `index`.
    pub async fn persist(
        &self,
        index: u64,
        blob: &[u8],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| io_error("create snapshot dir", &self.base_dir, e))?;

        let temp = self.temp_path(index);
        let target = self.snapshot_path(index);
        tokio::fs::write(&temp, blob).await.map_err(|e| io_error("write", &temp, e))?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|e| io_error("rename", &target, e))?;

        info!(index, path = ?target, bytes = blob.len(), "snapshot persisted");
        Ok(target)
    }

    /// Index and blob of the newest persisted snapshot, if any.
    pub async fn latest(&self) -> Result<Option<(u64, Vec<u8>)>> {
        let mut dir = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.base_dir, "no snapshot directory");
                return Ok(None);
            }
            Err(e) => return Err(io_error("read dir", &self.base_dir, e)),
        };

        let mut newest: Option<u64> = None;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_error("read dir", &self.base_dir, e))?
        {
            let name = entry.file_name();
            match name.to_str().and_then(Self::parse_snapshot_filename) {
                Some(index) if newest.map_or(true, |n| index > n) => newest = Some(index),
                Some(_) => {}
                None => warn!(file = ?name, "ignoring unrecognised file in snapshot dir"),
            }
        }

        let Some(index) = newest else {
            return Ok(None);
        };
        let path = self.snapshot_path(index);
        let blob = tokio::fs::read(&path).await.map_err(|e| io_error("read", &path, e))?;
        Ok(Some((index, blob)))
    }
}

fn io_error(
    action: &str,
    path: &Path,
    e: std::io::Error,
) -> crate::Error {
    StoreError::Engine {
        operation: "snapshot_file",
        reason: format!("{} {}: {}", action, path.display(), e),
    }
    .into()
}

use crate::error::{Result, VectorStoreError};
use fs2::FileExt;
use std::path::PathBuf;
use std::time::Instant;

/// Exclusive advisory lock held for the duration of a snapshot write.
pub(crate) struct SnapshotLock {
    file: std::fs::File,
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) async fn acquire_snapshot_lock(path: PathBuf) -> Result<SnapshotLock> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || -> Result<SnapshotLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let start = Instant::now();
        file.lock_exclusive()?;
        log::debug!(
            "acquired snapshot lock {} after {}ms",
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(SnapshotLock { file })
    })
    .await
    .map_err(|err| {
        VectorStoreError::IoError(std::io::Error::other(format!(
            "join snapshot lock task: {err}"
        )))
    })?
}

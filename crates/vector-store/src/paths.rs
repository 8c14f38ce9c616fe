use std::path::{Path, PathBuf};

pub const SNAPSHOT_DIR_NAME: &str = ".imgfind";
pub const INDEX_FILE_NAME: &str = "index.bin";
pub const RECORDS_FILE_NAME: &str = "records.json";
pub const LOCK_FILE_NAME: &str = "snapshot.lock";

/// Locations of the two snapshot artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub index: PathBuf,
    pub records: PathBuf,
}

impl SnapshotPaths {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            index: dir.join(INDEX_FILE_NAME),
            records: dir.join(RECORDS_FILE_NAME),
        }
    }

    #[must_use]
    pub fn for_project_root(root: &Path) -> Self {
        Self::in_dir(&root.join(SNAPSHOT_DIR_NAME))
    }

    /// Both artifacts are present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.index.exists() && self.records.exists()
    }

    /// Nothing has ever been saved here: neither artifact nor a save backup exists.
    ///
    /// A snapshot with only one artifact is not absent; it has to be loaded (and fail)
    /// rather than be treated as empty and overwritten.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        !self.index.exists() && !self.records.exists() && !self.index_backup().exists()
    }

    /// Where the previous index artifact is kept while a save moves the new pair in.
    #[must_use]
    pub fn index_backup(&self) -> PathBuf {
        suffixed(&self.index, ".prev")
    }

    /// Lock file guarding saves. Lives next to the index artifact.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.index
            .parent()
            .map_or_else(|| PathBuf::from(LOCK_FILE_NAME), |dir| dir.join(LOCK_FILE_NAME))
    }
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    suffixed(path, ".tmp")
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

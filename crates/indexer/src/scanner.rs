use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg"];

/// Options for selecting images inside a folder
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase file extensions without the dot
    pub extensions: Vec<String>,
    /// Keep at most this many images (after sorting by file name)
    pub limit: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            limit: None,
        }
    }
}

/// Lists the images directly inside one folder
pub struct ImageScanner {
    folder: PathBuf,
    options: ScanOptions,
}

impl ImageScanner {
    pub fn new(folder: impl AsRef<Path>, options: ScanOptions) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            options,
        }
    }

    /// Image files in file-name order, so positions are reproducible across runs.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut images = Vec::new();

        let mut builder = WalkBuilder::new(&self.folder);
        builder
            .max_depth(Some(1))
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false);

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }
                    if self.is_image(entry.path()) {
                        images.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        images.sort();
        if let Some(limit) = self.options.limit {
            images.truncate(limit);
        }

        log::info!(
            "Found {} images in {}",
            images.len(),
            self.folder.display()
        );
        images
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.options
                    .extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn picks_matching_extensions_in_name_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["c.jpg", "a.JPG", "b.png", "notes.txt", ".hidden.jpg"] {
            touch(tmp.path(), name);
        }
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        touch(&tmp.path().join("nested"), "deep.jpg");

        let found = ImageScanner::new(tmp.path(), ScanOptions::default()).scan();
        assert_eq!(names(&found), vec!["a.JPG", "c.jpg"]);

        let options = ScanOptions {
            extensions: vec!["jpg".into(), "png".into()],
            limit: Some(2),
        };
        let found = ImageScanner::new(tmp.path(), options).scan();
        assert_eq!(names(&found), vec!["a.JPG", "b.png"]);
    }
}

use serde::{Deserialize, Serialize};

/// Statistics about an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Number of image files found by the scanner
    pub scanned: usize,

    /// Number of images added to the catalog
    pub added: usize,

    /// Images skipped because the catalog already had them
    pub already_indexed: usize,

    /// Added images that came with a caption
    pub captioned: usize,

    /// Images skipped because a provider or file read failed
    pub failed: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Errors encountered, one line per failed image
    pub errors: Vec<String>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&mut self, captioned: bool) {
        self.added += 1;
        if captioned {
            self.captioned += 1;
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
    }
}

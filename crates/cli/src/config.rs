use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "imgfind.toml";

/// Settings read from `imgfind.toml`. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub image: ImageSection,
    pub provider: ProviderSection,
    pub index: IndexSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSection {
    pub folder: PathBuf,
    pub extensions: Vec<String>,
    pub limit: Option<usize>,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("downloaded_images"),
            extensions: vec!["jpg".to_string()],
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Azure,
    Stub,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSection {
    pub kind: ProviderKind,
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the subscription key
    pub key_env: String,
    pub timeout_secs: u64,
    pub request_interval_ms: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Azure,
            endpoint: None,
            key_env: "IMGFIND_VISION_KEY".to_string(),
            timeout_secs: 30,
            request_interval_ms: 0,
        }
    }
}

impl ProviderSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.key_env)
            .with_context(|| format!("Vision API key not set (expected env var {})", self.key_env))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexSection {
    pub dimension: usize,
    pub top_n: usize,
    pub snapshot_dir: PathBuf,
    /// Save a snapshot every `n` added images during ingestion
    pub checkpoint_every: Option<usize>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            dimension: 1024,
            top_n: imgfind_search::DEFAULT_TOP_N,
            snapshot_dir: PathBuf::from(imgfind_vector_store::SNAPSHOT_DIR_NAME),
            checkpoint_every: None,
        }
    }
}

impl AppConfig {
    /// Load `path`, or `imgfind.toml` in the working directory when it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            log::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.index.dimension > 0, "index.dimension must be > 0");
        anyhow::ensure!(self.index.top_n > 0, "index.top_n must be > 0");
        anyhow::ensure!(
            !self.image.extensions.is_empty(),
            "image.extensions must list at least one extension"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.index.dimension, 1024);
        assert_eq!(config.index.top_n, 3);
        assert_eq!(config.provider.kind, ProviderKind::Azure);
        assert_eq!(config.image.extensions, vec!["jpg".to_string()]);
        assert_eq!(config.image.folder, PathBuf::from("downloaded_images"));
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::parse(
            r#"
            [image]
            folder = "photos"
            limit = 100

            [provider]
            kind = "stub"
            timeout_secs = 5

            [index]
            dimension = 8
            top_n = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.image.folder, PathBuf::from("photos"));
        assert_eq!(config.image.limit, Some(100));
        assert_eq!(config.provider.kind, ProviderKind::Stub);
        assert_eq!(config.provider.timeout(), Duration::from_secs(5));
        assert_eq!(config.index.dimension, 8);
        assert_eq!(config.index.top_n, 5);
    }

    #[test]
    fn typos_and_bad_values_are_rejected() {
        assert!(AppConfig::parse("[index]\ndimensions = 3\n").is_err());
        assert!(AppConfig::parse("[index]\ndimension = 0\n").is_err());
        assert!(AppConfig::parse("[provider]\nkind = \"openai\"\n").is_err());
    }
}

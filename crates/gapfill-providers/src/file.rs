//! Local file dataset source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use gapfill_core::traits::DatasetSource;
use gapfill_core::DatasetError;

use crate::error::ProviderError;

/// Reads datasets from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    base_dir: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locations against `dir` instead of the working directory.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl DatasetSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn accepts(&self, location: &str) -> bool {
        location.starts_with("file://") || !location.contains("://")
    }

    #[instrument(skip(self))]
    async fn fetch(&self, location: &str) -> Result<String, DatasetError> {
        let path = self.resolve(location);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            let err = if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::NotFound(path.display().to_string())
            } else {
                ProviderError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            };
            err.into_fetch_error(location)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_core::traits::load_dataset;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_relative_to_base_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("set01.json"),
            r#"{"sets":[{"id":1,"title":"T","sentences":[{"q":"I _____ it.","answer":"like"}]}]}"#,
        )
        .unwrap();

        let source = FileSource::with_base_dir(dir.path());
        let dataset = load_dataset(&source, "set01.json").await.unwrap();
        assert_eq!(dataset.origin, "set01.json");
        assert_eq!(dataset.total_gaps(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::with_base_dir(dir.path());
        let err = source.fetch("nope.json").await.unwrap_err();
        assert!(matches!(err, DatasetError::Fetch { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();
        let source = FileSource::with_base_dir(dir.path());
        let err = load_dataset(&source, "bad.json").await.unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn accepts_paths_but_not_urls() {
        let source = FileSource::new();
        assert!(source.accepts("data/set01.json"));
        assert!(source.accepts("file:///tmp/set01.json"));
        assert!(!source.accepts("https://example.com/set01.json"));
        assert!(!source.accepts("ftp://example.com/set01.json"));
    }
}

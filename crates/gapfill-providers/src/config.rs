//! Configuration loading and the dataset source factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gapfill_core::chunking::ChunkingStrategy;
use gapfill_core::narration::NarrationSettings;
use gapfill_core::progress::{FileStore, KeyValueStore};
use gapfill_core::session::ViewMode;
use gapfill_core::traits::DatasetSource;

use crate::error::ProviderError;
use crate::file::FileSource;
use crate::http::{HttpSource, DEFAULT_TIMEOUT_SECS};

/// A named dataset entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// File path or `http(s)` URL. `${VAR}` references are expanded.
    pub location: String,
    /// Override of the skill profile's chunking strategy.
    #[serde(default)]
    pub chunking: Option<ChunkingStrategy>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Narration voice and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub preferred_voices: Vec<String>,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub pause_ms: u64,
    pub voice_wait_ms: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        let settings = NarrationSettings::default();
        Self {
            preferred_voices: settings.preferred_voices,
            language: settings.language,
            rate: settings.rate,
            pitch: settings.pitch,
            pause_ms: settings.pause.as_millis() as u64,
            voice_wait_ms: settings.voice_wait.as_millis() as u64,
        }
    }
}

impl NarrationConfig {
    pub fn settings(&self) -> NarrationSettings {
        NarrationSettings {
            preferred_voices: self.preferred_voices.clone(),
            language: self.language.clone(),
            rate: self.rate,
            pitch: self.pitch,
            pause: Duration::from_millis(self.pause_ms),
            voice_wait: Duration::from_millis(self.voice_wait_ms),
        }
    }
}

/// Top-level gapfill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapfillConfig {
    /// Directory holding one progress file per dataset.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// View mode sessions start in.
    #[serde(default)]
    pub default_mode: ViewMode,
    /// Timeout for HTTP dataset fetches.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Datasets addressable by name.
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,
    #[serde(default)]
    pub narration: NarrationConfig,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./gapfill-progress")
}
fn default_http_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for GapfillConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            default_mode: ViewMode::default(),
            http_timeout_secs: default_http_timeout(),
            datasets: BTreeMap::new(),
            narration: NarrationConfig::default(),
        }
    }
}

impl GapfillConfig {
    /// Look up a dataset by name, or treat the argument as a location.
    pub fn resolve_dataset(&self, name_or_location: &str) -> DatasetConfig {
        self.datasets
            .get(name_or_location)
            .cloned()
            .unwrap_or_else(|| DatasetConfig {
                location: name_or_location.to_string(),
                chunking: None,
                description: None,
            })
    }

    /// The progress backend for this configuration.
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(FileStore::new(&self.storage_dir))
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order when no path is given:
/// 1. `gapfill.toml` in the current directory
/// 2. `~/.config/gapfill/config.toml`
///
/// Environment variable override: `GAPFILL_STORAGE_DIR`.
pub fn load_config_from(path: Option<&Path>) -> Result<GapfillConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gapfill.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<GapfillConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "config loaded");
            config
        }
        None => GapfillConfig::default(),
    };

    if let Ok(dir) = std::env::var("GAPFILL_STORAGE_DIR") {
        if !dir.is_empty() {
            config.storage_dir = PathBuf::from(dir);
        }
    }

    for dataset in config.datasets.values_mut() {
        dataset.location = resolve_env_vars(&dataset.location);
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gapfill"))
}

/// Create the source that handles a dataset location.
pub fn create_source(location: &str, config: &GapfillConfig) -> Result<Box<dyn DatasetSource>> {
    let file = FileSource::new();
    if file.accepts(location) {
        return Ok(Box::new(file));
    }

    let http = HttpSource::new(config.http_timeout_secs)
        .context("failed to create HTTP dataset source")?;
    if http.accepts(location) {
        return Ok(Box::new(http));
    }

    Err(ProviderError::UnsupportedLocation(location.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_GAPFILL_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_GAPFILL_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_GAPFILL_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_GAPFILL_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = GapfillConfig::default();
        assert_eq!(config.default_mode, ViewMode::Classic);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.narration.rate, 0.9);
        assert_eq!(config.narration.preferred_voices[0], "Kate");
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
storage_dir = "/tmp/progress"
default_mode = "guided"

[datasets.set01]
location = "data/set01.json"
chunking = "paragraph"

[datasets.reports]
location = "https://example.com/report-learn.json"
chunking = "flat"

[narration]
preferred_voices = ["Serena"]
pause_ms = 250
"#;
        let config: GapfillConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_mode, ViewMode::Guided);
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(
            config.datasets["set01"].chunking,
            Some(ChunkingStrategy::Paragraph)
        );
        let settings = config.narration.settings();
        assert_eq!(settings.preferred_voices, vec!["Serena"]);
        assert_eq!(settings.pause, Duration::from_millis(250));
        assert_eq!(settings.language, "en-GB");
    }

    #[test]
    fn explicit_path_with_env_locations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gapfill.toml");
        std::fs::write(
            &path,
            r#"
[datasets.remote]
location = "${_GAPFILL_TEST_HOST}/set01.json"
"#,
        )
        .unwrap();

        std::env::set_var("_GAPFILL_TEST_HOST", "https://cdn.example.com");
        let config = load_config_from(Some(&path)).unwrap();
        std::env::remove_var("_GAPFILL_TEST_HOST");

        assert_eq!(
            config.datasets["remote"].location,
            "https://cdn.example.com/set01.json"
        );
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn unknown_names_resolve_as_locations() {
        let mut config = GapfillConfig::default();
        config.datasets.insert(
            "set01".into(),
            DatasetConfig {
                location: "data/set01.json".into(),
                chunking: Some(ChunkingStrategy::Flat),
                description: None,
            },
        );
        assert_eq!(config.resolve_dataset("set01").location, "data/set01.json");
        assert_eq!(config.resolve_dataset("other.json").location, "other.json");
        assert_eq!(config.resolve_dataset("other.json").chunking, None);
    }

    #[test]
    fn source_by_location() {
        let config = GapfillConfig::default();
        assert_eq!(
            create_source("https://example.com/a.json", &config)
                .unwrap()
                .name(),
            "http"
        );
        assert_eq!(create_source("data/a.json", &config).unwrap().name(), "file");
        assert_eq!(
            create_source("file:///data/a.json", &config).unwrap().name(),
            "file"
        );
    }

    #[test]
    fn unknown_scheme_is_unsupported() {
        let config = GapfillConfig::default();
        let err = create_source("ftp://example.com/a.json", &config)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::UnsupportedLocation(location)) if location == "ftp://example.com/a.json"
        ));
    }
}

//! TOML configuration.
//!
//! Every table is optional; a missing file or table falls back to the
//! defaults of the original deployment.
//!
//! ```toml
//! [storage]
//! backend = "s3"             # s3 | filesystem | memory
//! region = "ap-northeast-2"
//! # endpoint_url = "http://localhost:9000"
//! # root = "./data"          # filesystem backend only
//! timeout_secs = 30
//!
//! [[sources]]
//! prefix = "transcribe/"
//! modality = "transcribe"
//!
//! [[sources]]
//! prefix = "twelvelabs/"
//! modality = "twelvelabs"
//!
//! [sink]
//! prefix = "combined_data/"
//!
//! [trigger]
//! sentinel_suffix = ".write_access_check_file.temp"
//! manifest_name = "manifest.json"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clipfuse_core::error::ConfigError;
use clipfuse_core::models::Modality;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            sources: default_sources(),
            sink: SinkConfig::default(),
            trigger: TriggerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            region: default_region(),
            endpoint_url: None,
            root: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "s3".to_string()
}
fn default_region() -> String {
    std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string())
}
fn default_timeout_secs() -> u64 {
    30
}

/// One listing prefix and the producer tag of the documents under it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    pub prefix: String,
    pub modality: String,
}

fn default_sources() -> Vec<SourceConfig> {
    [
        ("transcribe/", "transcribe"),
        ("twelvelabs/", "twelvelabs"),
        ("yolo/", "yolo_opencv"),
        ("yolo_opencv/", "yolo_opencv"),
        ("marengo_data/", "twelvelabs"),
    ]
    .into_iter()
    .map(|(prefix, modality)| SourceConfig {
        prefix: prefix.to_string(),
        modality: modality.to_string(),
    })
    .collect()
}

/// A source prefix with its modality tag resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePrefix {
    pub prefix: String,
    pub modality: Modality,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default = "default_sink_prefix")]
    pub prefix: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            prefix: default_sink_prefix(),
        }
    }
}

fn default_sink_prefix() -> String {
    "combined_data/".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriggerConfig {
    #[serde(default = "default_sentinel_suffix")]
    pub sentinel_suffix: String,
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            sentinel_suffix: default_sentinel_suffix(),
            manifest_name: default_manifest_name(),
        }
    }
}

fn default_sentinel_suffix() -> String {
    ".write_access_check_file.temp".to_string()
}
fn default_manifest_name() -> String {
    "manifest.json".to_string()
}

impl TriggerConfig {
    /// Storage write probes and job manifests are never modality documents.
    pub fn is_ignored(&self, key: &str) -> bool {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        key.ends_with(&self.sentinel_suffix) || file_name == self.manifest_name
    }
}

impl Config {
    /// Resolve every `[[sources]]` tag to a [`Modality`].
    ///
    /// An unknown tag is a wiring bug and fails loudly.
    pub fn source_prefixes(&self) -> Result<Vec<SourcePrefix>, ConfigError> {
        self.sources
            .iter()
            .map(|s| {
                Ok(SourcePrefix {
                    prefix: s.prefix.clone(),
                    modality: Modality::from_tag(&s.modality)?,
                })
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend.as_str() {
            "s3" | "memory" => {}
            "filesystem" => {
                if self.storage.root.is_none() {
                    return Err(invalid("storage.root", "required for the filesystem backend"));
                }
            }
            other => {
                return Err(invalid(
                    "storage.backend",
                    format!("unknown backend '{}'; must be s3, filesystem, or memory", other),
                ))
            }
        }

        if self.storage.timeout_secs == 0 {
            return Err(invalid("storage.timeout_secs", "must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(invalid("sources", "at least one source prefix is required"));
        }
        if let Some(empty) = self.sources.iter().find(|s| s.prefix.is_empty()) {
            return Err(invalid(
                "sources.prefix",
                format!("empty prefix for modality '{}'", empty.modality),
            ));
        }
        self.source_prefixes()?;

        if self.trigger.sentinel_suffix.is_empty() || self.trigger.manifest_name.is_empty() {
            return Err(invalid(
                "trigger",
                "sentinel_suffix and manifest_name must be non-empty",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Load `path` when it exists, otherwise fall back to [`Config::default`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.storage.backend, "s3");
        assert_eq!(cfg.sources.len(), 5);
        assert_eq!(cfg.sink.prefix, "combined_data/");
        let prefixes = cfg.source_prefixes().unwrap();
        assert_eq!(prefixes[4].prefix, "marengo_data/");
        assert_eq!(prefixes[4].modality, Modality::Embedding);
    }

    #[test]
    fn test_custom_sources_replace_defaults() {
        let file = write_config(
            r#"
[storage]
backend = "filesystem"
root = "/tmp/media"

[[sources]]
prefix = "asr/"
modality = "transcript"

[sink]
prefix = "fused/"
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.sources.len(), 1);
        assert_eq!(cfg.source_prefixes().unwrap()[0].modality, Modality::Transcript);
        assert_eq!(cfg.sink.prefix, "fused/");
        assert_eq!(cfg.storage.root, Some(PathBuf::from("/tmp/media")));
    }

    #[test]
    fn test_unknown_modality_fails_loudly() {
        let file = write_config(
            r#"
[[sources]]
prefix = "audio/"
modality = "waveform"
"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("unsupported modality tag: 'waveform'"));
    }

    #[test]
    fn test_filesystem_requires_root() {
        let file = write_config("[storage]\nbackend = \"filesystem\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let file = write_config("[storage]\nbackend = \"gcs\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_ignore_rules() {
        let trigger = TriggerConfig::default();
        assert!(trigger.is_ignored("yolo/.write_access_check_file.temp"));
        assert!(trigger.is_ignored("manifest.json"));
        assert!(trigger.is_ignored("transcribe/job-1/manifest.json"));
        assert!(!trigger.is_ignored("transcribe/manifest.json.bak"));
        assert!(!trigger.is_ignored("transcribe/episode.json"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.sources.len(), 5);
    }
}

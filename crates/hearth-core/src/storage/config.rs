use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json;
#[cfg(feature = "yaml-config")]
use serde_yaml;
#[cfg(feature = "toml-config")]
use toml;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Host configuration read at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory scanned (non-recursively) for package archives
    pub plugins_dir: PathBuf,
    /// Extension identifying package archives
    pub package_extension: String,
    /// Feed the declared dependencies of pre-world packages into the pre stage
    /// graph. Off by default: pre-world packages are ordered as independent.
    pub enforce_pre_dependencies: bool,
    /// Where native libraries are extracted; the system temp dir when unset
    pub extraction_dir: Option<PathBuf>,
    /// Log filter applied when RUST_LOG is not set
    pub log_level: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from(constants::DEFAULT_PLUGINS_DIR),
            package_extension: constants::PACKAGE_EXTENSION.to_string(),
            enforce_pre_dependencies: false,
            extraction_dir: None,
            log_level: None,
        }
    }
}

impl HostConfig {
    /// Load configuration from a file, picking the format from its extension
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        if !path.is_file() {
            return Err(StorageSystemError::FileNotFound(path.to_path_buf()).into());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| StorageSystemError::io(e, "read_config", path.to_path_buf()))?;
        let config = Self::deserialize(&data, format)?;
        log::debug!("Loaded host configuration from {}", path.display());
        Ok(config)
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| deserialization_error("json", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| deserialization_error("yaml", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| deserialization_error("toml", e)),
        };
        Ok(parsed?)
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let rendered = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| serialization_error("json", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| serialization_error("yaml", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| serialization_error("toml", e)),
        };
        Ok(rendered?)
    }
}

fn deserialization_error<E>(format: &str, source: E) -> StorageSystemError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageSystemError::DeserializationError {
        format: format.to_string(),
        source: Box::new(source),
    }
}

fn serialization_error<E>(format: &str, source: E) -> StorageSystemError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageSystemError::SerializationError {
        format: format.to_string(),
        source: Box::new(source),
    }
}

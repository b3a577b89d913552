//! Configuration loading
//!
//! Layered resolution, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the enrichment API key
pub const API_KEY_ENV: &str = "PHOTOSORT_API_KEY";

/// TOML configuration file contents
///
/// All fields are optional; absent fields fall back to compiled defaults
/// (or CLI/env overrides at a higher layer).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Enrichment API key
    pub api_key: Option<String>,
    /// Enrichment API endpoint URL
    pub endpoint: Option<String>,
    /// Outbound enrichment request budget (requests per second)
    pub requests_per_second: Option<f64>,
    /// Per-request HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Retry budget for enrichment calls and verified copies
    pub max_retries: Option<u32>,
    /// Exponential backoff base factor
    pub backoff_factor: Option<f64>,
    /// Fuzzy match cutoff (0.0 - 1.0)
    pub fuzzy_cutoff: Option<f64>,
    /// Similarity match threshold (0.0 - 1.0)
    pub similarity_threshold: Option<f64>,
    /// Maximum image payload size accepted for enrichment, in bytes
    pub max_image_bytes: Option<u64>,
}

impl TomlConfig {
    /// Load configuration from an explicit TOML file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load configuration from the default platform location, if present
    ///
    /// Looks for `photosort/config.toml` under the user config directory
    /// (e.g. `~/.config/photosort/config.toml` on Linux). A missing file is
    /// not an error; it yields the empty config.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Resolve the enrichment API key: environment variable wins over TOML
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::info!("Enrichment API key loaded from environment variable");
                return Some(key);
            }
        }

        if let Some(key) = &self.api_key {
            if !key.trim().is_empty() {
                tracing::info!("Enrichment API key loaded from TOML config");
                return Some(key.clone());
            }
        }

        None
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("photosort").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            api_key = "key-123"
            endpoint = "https://example.com/v1/describe"
            requests_per_second = 2.0
            timeout_secs = 20
            max_retries = 3
            fuzzy_cutoff = 0.7
            "#
        )
        .unwrap();

        let config = TomlConfig::load(file.path()).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.requests_per_second, Some(2.0));
        assert_eq!(config.timeout_secs, Some(20));
        assert_eq!(config.max_retries, Some(3));
        assert_eq!(config.fuzzy_cutoff, Some(0.7));
        assert_eq!(config.similarity_threshold, None);
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "api_key = [not toml").unwrap();

        let result = TomlConfig::load(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = TomlConfig::load(Path::new("/nonexistent/photosort.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the Flickr API key, page size, request timeout and the
//! service endpoints.
//!
//! Configuration is stored at `~/.config/pinalbum/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "pinalbum";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the stored API key
pub const API_KEY_ENV: &str = "FLICKR_API_KEY";

pub const DEFAULT_API_BASE_URL: &str = "https://www.flickr.com/services/rest/";

/// Photos requested per search page.
pub const DEFAULT_PER_PAGE: u32 = 25;

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub per_page: u32,
    pub request_timeout_secs: u64,
    /// Upper bound on image downloads in flight for one page. Defaults to `per_page`.
    pub max_concurrent_fetches: Option<usize>,
    pub api_base_url: String,
    /// Replaces `https://farm{farm}.staticflickr.com` when set.
    pub image_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            per_page: DEFAULT_PER_PAGE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_fetches: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            image_base_url: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `FLICKR_API_KEY` from the environment, if set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Image downloads allowed in flight at once, at least 1.
    pub fn fetch_concurrency(&self) -> usize {
        self.max_concurrent_fetches
            .unwrap_or(self.per_page as usize)
            .max(1)
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.per_page, 25);
        assert_eq!(config.fetch_concurrency(), 25);
    }

    #[test]
    fn test_fetch_concurrency_follows_page_size() {
        let config = Config {
            per_page: 100,
            ..Config::default()
        };
        assert_eq!(config.fetch_concurrency(), 100);

        let capped = Config {
            per_page: 100,
            max_concurrent_fetches: Some(8),
            ..Config::default()
        };
        assert_eq!(capped.fetch_concurrency(), 8);

        let zero = Config {
            max_concurrent_fetches: Some(0),
            ..Config::default()
        };
        assert_eq!(zero.fetch_concurrency(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_key: Some("abc123".to_string()),
            per_page: 10,
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key":"k"}"#).expect("write");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.api_key.as_deref(), Some("k"));
        assert_eq!(loaded.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(loaded.api_base_url, DEFAULT_API_BASE_URL);
    }
}

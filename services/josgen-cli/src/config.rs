//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! A missing config file is fine unless its path was given explicitly.

use josgen_gateway::{GatewayConfig, SkipList};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "josgen.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub ui: UiConfig,
    pub storage: StorageConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Extra skip-list patterns on top of the auth endpoints; `*` suffix for prefixes
    pub skip_patterns: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".into(),
            timeout_ms: 30_000,
            skip_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub default_language: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_language: "en".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Public storage root for avatars and attachments
    pub base_url: String,
    /// Where the session tokens are kept between invocations
    pub token_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/storage".into(),
            token_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables, for running without a file.
    pub fn from_env() -> common::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// Returns the path and whether it was asked for explicitly; the default
    /// `josgen.toml` is optional.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(url) = std::env::var("JOSGEN_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Ok(raw) = std::env::var("JOSGEN_API_TIMEOUT_MS") {
            self.api.timeout_ms = raw.trim().parse().map_err(|e| common::Error::Env {
                name: "JOSGEN_API_TIMEOUT_MS".into(),
                reason: format!("{e}"),
            })?;
        }
        if let Ok(language) = std::env::var("JOSGEN_DEFAULT_LANGUAGE") {
            self.ui.default_language = language;
        }
        if let Ok(url) = std::env::var("JOSGEN_STORAGE_BASE_URL") {
            self.storage.base_url = url;
        }
        if let Ok(path) = std::env::var("JOSGEN_TOKEN_FILE") {
            self.storage.token_file = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_ms == 0 {
            return Err(common::Error::Config(
                "api.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.ui.default_language.trim().is_empty() {
            return Err(common::Error::Config(
                "ui.default_language must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Token file path, defaulting to the user's config directory.
    pub fn token_file(&self) -> PathBuf {
        self.storage.token_file.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("josgen").join("tokens.json"))
                .unwrap_or_else(|| PathBuf::from(".josgen-tokens.json"))
        })
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_millis(self.api.timeout_ms),
            language: self.ui.default_language.clone(),
            skip_list: SkipList::default().with_patterns(self.api.skip_patterns.iter().cloned()),
        }
    }
}

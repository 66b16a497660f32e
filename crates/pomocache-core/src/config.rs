//! Worker configuration management.
//!
//! This module handles loading and saving the worker configuration, which
//! includes the app origin, the cache version and the precache manifest.
//!
//! Configuration is stored at `~/.config/pomocache/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "pomocache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// App shell assets cached at install time.
const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/css/style.css",
    "/js/app.js",
    "/manifest.json",
    "/tomato.png",
    "/icons/apple-icon-180.png",
    "/icons/manifest-icon-192.maskable.png",
    "/icons/manifest-icon-512.maskable.png",
    "/musics/lofi-background-music-336230.mp3",
    "/musics/lofi-coffee-332824.mp3",
    "/musics/lofi-rain-lofi-music-332732.mp3",
    "/musics/coffee-lofi-chill-lofi-music-332738.mp3",
    "/musics/rainy-lofi-city-lofi-music-332746.mp3",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the app shell is served from, e.g. `https://pomodoro.example`.
    pub origin: String,
    /// Prefix shared by every cache partition name.
    pub cache_prefix: String,
    /// Bump when assets change; old partitions are purged on activation.
    pub version: String,
    pub manifest: Vec<String>,
    /// Served for navigations when both network and cache miss.
    pub offline_document: String,
    /// Mutating requests below this path go through the retry queue.
    pub api_prefix: String,
    pub sync_tag: String,
    pub request_timeout_secs: u64,
    /// Overrides the platform cache directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            cache_prefix: "pomodoro-app".to_string(),
            version: "v1".to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            offline_document: "/index.html".to_string(),
            api_prefix: "/api/".to_string(),
            sync_tag: "sync-pomodoro-data".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root directory for cache partitions and the retry queue.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin: {}", self.origin))
    }

    /// Origin in serialized form without a trailing slash, for prefix matching.
    pub fn origin_str(&self) -> String {
        self.origin.trim_end_matches('/').to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

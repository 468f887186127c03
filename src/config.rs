//! Engine configuration management.
//!
//! This module handles loading the engine configuration: the
//! application origin, cache names, the static asset manifest, background
//! trigger tags and notification styling.
//!
//! Configuration is stored at `~/.config/swcache/config.json`. Missing
//! fields fall back to the defaults below.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use url::Url;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "swcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cached API responses older than this are not served during an outage.
const DEFAULT_FRESHNESS_MINUTES: i64 = 60;

const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/static/js/main.js",
    "/static/css/main.css",
    "/manifest.json",
    "/favicon.ico",
    "/logo192.png",
    "/logo512.png",
    "https://fonts.googleapis.com/css2?family=Roboto:wght@300;400;500;700&display=swap",
    "https://fonts.googleapis.com/icon?family=Material+Icons",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the manifest and relative request URLs resolve against.
    pub origin: Url,
    /// Static generations are named `<cache_prefix>-<version>`.
    pub cache_prefix: String,
    pub version: String,
    pub api_cache_name: String,
    /// Path prefix of the API namespace.
    pub api_prefix: String,
    pub freshness_minutes: i64,
    pub manifest: Vec<String>,
    /// Background sync tag that replays queued mutations.
    pub sync_tag: String,
    /// Periodic sync tag that refreshes the API store.
    pub refresh_tag: String,
    pub notification_icon: String,
    pub vibrate: Vec<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:3000/").expect("static default origin"),
            cache_prefix: "neuroimaging-dashboard".to_string(),
            version: "v1".to_string(),
            api_cache_name: "api-cache-v1".to_string(),
            api_prefix: "/api/".to_string(),
            freshness_minutes: DEFAULT_FRESHNESS_MINUTES,
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            sync_tag: "sync-scans".to_string(),
            refresh_tag: "update-data".to_string(),
            notification_icon: "/logo192.png".to_string(),
            vibrate: vec![100, 50, 100],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?, |key| std::env::var(key).ok())
    }

    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply overrides from `env` and validate the result.
    pub fn load_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// `SWCACHE_ORIGIN` and `SWCACHE_VERSION` override the file.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(origin) = env("SWCACHE_ORIGIN") {
            self.origin = Url::parse(&origin)
                .with_context(|| format!("Invalid SWCACHE_ORIGIN: {}", origin))?;
        }
        if let Some(version) = env("SWCACHE_VERSION") {
            self.version = version;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.freshness_minutes > 0 && Duration::try_minutes(self.freshness_minutes).is_some(),
            "freshness_minutes out of range: {}",
            self.freshness_minutes
        );
        anyhow::ensure!(!self.version.is_empty(), "version must not be empty");
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Out-of-range values (rejected by `validate`) clamp to the default window.
    pub fn freshness_window(&self) -> Duration {
        Duration::try_minutes(self.freshness_minutes)
            .unwrap_or_else(|| Duration::minutes(DEFAULT_FRESHNESS_MINUTES))
    }

    /// Name of the static generation owned by this version.
    pub fn static_cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// True for static generations left behind by other versions.
    /// Caches outside the prefix are foreign and never match.
    pub fn is_superseded_static_cache(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.cache_prefix)) && name != self.static_cache_name()
    }

    /// Resolve a URL relative to the configured origin. Absolute URLs pass through.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.origin
            .join(url)
            .with_context(|| format!("Invalid URL: {}", url))
    }

    pub fn manifest_urls(&self) -> Result<Vec<Url>> {
        self.manifest.iter().map(|u| self.resolve(u)).collect()
    }
}

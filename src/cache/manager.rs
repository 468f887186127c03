//! On-disk cache generations.
//!
//! Each generation is one JSON file under `<cache_dir>/caches/`, holding a
//! map from request identity to `CachedResponse`. Operations are scoped:
//! every call reads the file, applies its change and writes it back while
//! holding that generation's lock. Locks are per generation and never held
//! across a network fetch, so an asset lookup does not wait on an API store
//! write.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::CachedResponse;
use crate::http::RequestIdentity;

/// Directory under the cache root holding one file per generation
const CACHES_DIR: &str = "caches";

const GENERATION_EXT: &str = "json";

type Generation = BTreeMap<RequestIdentity, CachedResponse>;

pub struct CacheManager {
    cache_dir: PathBuf,
    /// Created on first use, keyed by generation name.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        let cache_dir = cache_dir.join(CACHES_DIR);
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Exclusive access to one generation's file.
    async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(name.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    fn cache_path(&self, name: &str) -> Result<PathBuf> {
        anyhow::ensure!(
            !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != "..",
            "Invalid cache name: {:?}",
            name
        );
        Ok(self.cache_dir.join(format!("{}.{}", name, GENERATION_EXT)))
    }

    fn load(&self, name: &str) -> Result<Option<Generation>> {
        let path = self.cache_path(name)?;
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let generation: Generation = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(generation))
    }

    fn save(&self, name: &str, generation: &Generation) -> Result<()> {
        let path = self.cache_path(name)?;
        let contents = serde_json::to_string_pretty(generation)?;
        // Write-then-rename keeps a reader from ever seeing a half-written file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace cache file: {}", name))?;
        Ok(())
    }

    /// Names of every generation currently in storage, sorted.
    /// Saves land by rename, so listing needs no generation lock.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(GENERATION_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns false if there was nothing to delete.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.cache_path(name)?;
        let _guard = self.lock(name).await;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete cache generation: {}", name))?;
        debug!(cache = name, "Deleted cache generation");
        Ok(true)
    }

    pub async fn match_entry(
        &self,
        name: &str,
        identity: &RequestIdentity,
    ) -> Result<Option<CachedResponse>> {
        let _guard = self.lock(name).await;
        Ok(self
            .load(name)?
            .and_then(|mut generation| generation.remove(identity)))
    }

    /// Store one entry, replacing any entry with the same identity.
    pub async fn put(&self, name: &str, entry: CachedResponse) -> Result<()> {
        self.put_all(name, vec![entry]).await
    }

    /// Store several entries in a single write. Creates the generation if needed.
    pub async fn put_all(&self, name: &str, entries: Vec<CachedResponse>) -> Result<()> {
        let _guard = self.lock(name).await;
        let mut generation = self.load(name)?.unwrap_or_default();
        for entry in entries {
            generation.insert(entry.identity(), entry);
        }
        self.save(name, &generation)
    }

    /// All entries of a generation; empty if it does not exist.
    pub async fn entries(&self, name: &str) -> Result<Vec<CachedResponse>> {
        let _guard = self.lock(name).await;
        Ok(self
            .load(name)?
            .map(|generation| generation.into_values().collect())
            .unwrap_or_default())
    }
}

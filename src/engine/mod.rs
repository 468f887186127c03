//! The request-interception engine.
//!
//! `Engine` owns every cache generation and the mutation queue. Hosts drive
//! it through explicit event methods:
//!
//! - `route`: serve an intercepted request (`router`)
//! - `on_install` / `on_activate`: version lifecycle (`lifecycle`)
//! - `on_sync` / `on_reconnect` / `on_periodic_trigger`: background work (`sync`)
//! - `on_push` / `on_notification_click`: push notifications (`notify`)

pub mod lifecycle;
pub mod notify;
pub mod router;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::cache::{CacheManager, MutationQueue, PendingMutation};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::network::Fetcher;
use crate::platform::Platform;

pub use lifecycle::{ActivationReport, LifecycleState};
pub use notify::NotificationPayload;
pub use router::{classify, RequestClass};
pub use sync::{RefreshReport, ReplayReport};

pub struct Engine {
    config: Config,
    caches: CacheManager,
    queue: MutationQueue,
    fetcher: Arc<dyn Fetcher>,
    platform: Arc<dyn Platform>,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<LifecycleState>>,
}

/// One line of `Engine::cache_summary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub name: String,
    pub entries: usize,
    /// Age of the most recently written entry, for display.
    pub newest: Option<String>,
}

impl Engine {
    pub fn new(
        config: Config,
        cache_dir: PathBuf,
        fetcher: Arc<dyn Fetcher>,
        platform: Arc<dyn Platform>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            caches: CacheManager::new(cache_dir.clone())?,
            queue: MutationQueue::new(cache_dir)?,
            config,
            fetcher,
            platform,
            clock: Arc::new(SystemClock),
            state: Mutex::new(None),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every generation in storage, including foreign ones.
    pub async fn cache_summary(&self) -> Result<Vec<GenerationSummary>> {
        let now = self.clock.now();
        let mut summaries = Vec::new();
        for name in self.caches.keys().await? {
            let entries = self.caches.entries(&name).await?;
            let newest = entries
                .iter()
                .max_by_key(|e| e.cached_at)
                .map(|e| e.age_display(now));
            summaries.push(GenerationSummary {
                name,
                entries: entries.len(),
                newest,
            });
        }
        Ok(summaries)
    }

    pub async fn pending_mutations(&self) -> Result<Vec<PendingMutation>> {
        self.queue.pending().await
    }
}

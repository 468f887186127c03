//! Durable queue of mutations recorded while offline.
//!
//! The queue lives in `<cache_dir>/mutations.json` and survives restarts.
//! Entries are only removed after a confirmed replay; there is no eviction.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::http::{Request, RequestIdentity};

/// Queue file name in cache directory
const QUEUE_FILE: &str = "mutations.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Local bookkeeping only; never sent with the replayed request.
    pub id: u64,
    pub request: Request,
    pub queued_at: DateTime<Utc>,
}

impl PendingMutation {
    pub fn identity(&self) -> RequestIdentity {
        self.request.identity()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    next_id: u64,
    mutations: Vec<PendingMutation>,
}

pub struct MutationQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MutationQueue {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            path: cache_dir.join(QUEUE_FILE),
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> Result<QueueFile> {
        if !self.path.exists() {
            return Ok(QueueFile::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read mutation queue")?;
        serde_json::from_str(&contents).context("Failed to parse mutation queue")
    }

    fn save(&self, queue: &QueueFile) -> Result<()> {
        let contents = serde_json::to_string_pretty(queue)?;
        // Write-then-rename so an interrupted write never truncates the queue
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write mutation queue")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace mutation queue")?;
        Ok(())
    }

    /// Append a request. Returns its queue id.
    pub async fn push(&self, request: &Request, queued_at: DateTime<Utc>) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut queue = self.load()?;
        let id = queue.next_id;
        queue.next_id += 1;
        queue.mutations.push(PendingMutation {
            id,
            request: request.clone(),
            queued_at,
        });
        self.save(&queue)?;
        Ok(id)
    }

    /// Snapshot of every queued mutation in insertion order.
    pub async fn pending(&self) -> Result<Vec<PendingMutation>> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.mutations)
    }

    /// Remove the given ids. Mutations pushed since the snapshot are kept.
    pub async fn remove(&self, ids: &[u64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        let mut queue = self.load()?;
        let before = queue.mutations.len();
        queue.mutations.retain(|m| !ids.contains(&m.id));
        let removed = before - queue.mutations.len();
        self.save(&queue)?;
        Ok(removed)
    }
}

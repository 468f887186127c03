//! Background work outside the request path.
//!
//! Two triggers, identified by tag:
//! - the sync tag replays every queued mutation (at-least-once; a replay
//!   whose success is not observed will be sent again next time)
//! - the periodic tag re-fetches every identity in the API store
//!
//! Both fan out concurrently and isolate failures per entry.

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::Engine;
use crate::cache::{CachedResponse, PendingMutation};
use crate::http::Request;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub remaining: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

impl Engine {
    /// Record a request for replay on the next reconnect trigger.
    pub async fn enqueue_mutation(&self, request: &Request) -> Result<u64> {
        self.queue.push(request, self.clock.now()).await
    }

    /// Background sync event. Unrecognized tags are ignored.
    pub async fn on_sync(&self, tag: &str) -> Result<Option<ReplayReport>> {
        if tag != self.config.sync_tag {
            debug!(tag = tag, "Ignoring sync tag");
            return Ok(None);
        }
        self.on_reconnect().await.map(Some)
    }

    /// Replay every queued mutation; keep the ones that did not succeed.
    pub async fn on_reconnect(&self) -> Result<ReplayReport> {
        let pending = self.queue.pending().await?;
        if pending.is_empty() {
            return Ok(ReplayReport::default());
        }

        let outcomes = join_all(pending.iter().map(|m| self.replay(m))).await;
        let done: Vec<u64> = pending
            .iter()
            .zip(outcomes)
            .filter_map(|(m, ok)| ok.then_some(m.id))
            .collect();

        self.queue.remove(&done).await?;

        let report = ReplayReport {
            replayed: done.len(),
            remaining: pending.len() - done.len(),
        };
        info!(replayed = report.replayed, remaining = report.remaining, "Mutation replay finished");
        Ok(report)
    }

    async fn replay(&self, mutation: &PendingMutation) -> bool {
        match self.fetcher.fetch(&mutation.request).await {
            Ok(response) if response.is_success() => {
                debug!(id = mutation.id, url = %mutation.request.url, "Replayed mutation");
                true
            }
            Ok(response) => {
                warn!(id = mutation.id, url = %mutation.request.url, status = response.status.as_u16(), "Mutation replay rejected");
                false
            }
            Err(e) => {
                warn!(id = mutation.id, url = %mutation.request.url, error = %e, "Error replaying mutation");
                false
            }
        }
    }

    /// Periodic sync event. Unrecognized tags are ignored.
    pub async fn on_periodic_trigger(&self, tag: &str) -> Result<Option<RefreshReport>> {
        if tag != self.config.refresh_tag {
            debug!(tag = tag, "Ignoring periodic sync tag");
            return Ok(None);
        }
        self.refresh_api_cache().await.map(Some)
    }

    /// Re-fetch every cached API identity, overwriting entries that succeed.
    pub async fn refresh_api_cache(&self) -> Result<RefreshReport> {
        let entries = self.caches.entries(&self.config.api_cache_name).await?;
        let results = join_all(entries.iter().map(|e| self.refresh_entry(&e.request))).await;

        let refreshed = results.iter().filter(|&&ok| ok).count();
        let report = RefreshReport {
            refreshed,
            failed: results.len() - refreshed,
        };
        info!(refreshed = report.refreshed, failed = report.failed, "API cache refresh finished");
        Ok(report)
    }

    async fn refresh_entry(&self, request: &Request) -> bool {
        let response = match self.fetcher.fetch(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(url = %request.url, status = response.status.as_u16(), "Refresh returned error status");
                return false;
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Error updating cached data");
                return false;
            }
        };

        let entry = CachedResponse::new(request, &response, self.clock.now());
        match self.caches.put(&self.config.api_cache_name, entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Failed to store refreshed response");
                false
            }
        }
    }
}

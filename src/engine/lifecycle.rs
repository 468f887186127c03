//! Version lifecycle: install, then activate.
//!
//! Install precaches the whole manifest into this version's static
//! generation, all or nothing. Activate removes static generations left by
//! other versions and takes control of open clients. There is no rollback.

use std::fmt;

use anyhow::Result;
use futures::future::join_all;
use tracing::{error, info};

use super::Engine;
use crate::cache::CachedResponse;
use crate::error::EngineError;
use crate::http::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Installed,
    Activating,
    Active,
}

impl LifecycleState {
    pub fn label(self) -> &'static str {
        match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn state_label(state: Option<LifecycleState>) -> &'static str {
    state.map(LifecycleState::label).unwrap_or("uninstalled")
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Superseded static generations removed during activation.
    pub deleted: Vec<String>,
}

impl Engine {
    pub async fn state(&self) -> Option<LifecycleState> {
        *self.state.lock().await
    }

    async fn transition(
        &self,
        from: Option<LifecycleState>,
        to: LifecycleState,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        if *state != from {
            return Err(EngineError::InvalidTransition {
                from: state_label(*state),
                to: to.label(),
            });
        }
        *state = Some(to);
        Ok(())
    }

    async fn set_state(&self, to: Option<LifecycleState>) {
        *self.state.lock().await = to;
    }

    /// Precache the manifest and request skip-waiting.
    ///
    /// If any asset fails (transport error or non-2xx) nothing is written and
    /// the engine returns to the uninstalled state, leaving prior versions'
    /// generations in place.
    pub async fn on_install(&self) -> Result<()> {
        self.transition(None, LifecycleState::Installing).await?;

        match self.precache().await {
            Ok(count) => {
                info!(cache = %self.config.static_cache_name(), assets = count, "Install complete");
                self.platform.skip_waiting();
                self.set_state(Some(LifecycleState::Installed)).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Install failed");
                self.set_state(None).await;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let requests: Vec<Request> = self
            .config
            .manifest_urls()?
            .into_iter()
            .map(Request::get)
            .collect();

        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let now = self.clock.now();
        let mut entries = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            let url = request.url.as_str();
            let response = result.map_err(|e| EngineError::install_transport(url, &e))?;
            if !response.is_success() {
                return Err(EngineError::install_status(url, response.status, &response.body).into());
            }
            entries.push(CachedResponse::new(request, &response, now));
        }

        let count = entries.len();
        self.caches
            .put_all(&self.config.static_cache_name(), entries)
            .await?;
        Ok(count)
    }

    /// Delete superseded static generations and claim clients, concurrently.
    pub async fn on_activate(&self) -> Result<ActivationReport> {
        self.transition(Some(LifecycleState::Installed), LifecycleState::Activating)
            .await?;

        let (cleanup, claim) = tokio::join!(
            self.delete_superseded_caches(),
            self.platform.claim_clients()
        );

        match cleanup.and_then(|deleted| claim.map(|()| deleted)) {
            Ok(deleted) => {
                self.set_state(Some(LifecycleState::Active)).await;
                info!(version = %self.config.version, deleted = ?deleted, "Activated");
                Ok(ActivationReport { deleted })
            }
            Err(e) => {
                error!(error = %e, "Activation failed");
                self.set_state(Some(LifecycleState::Installed)).await;
                Err(e)
            }
        }
    }

    async fn delete_superseded_caches(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .caches
            .keys()
            .await?
            .into_iter()
            .filter(|name| self.config.is_superseded_static_cache(name))
            .collect();

        for result in join_all(stale.iter().map(|name| self.caches.delete(name))).await {
            result?;
        }
        Ok(stale)
    }
}

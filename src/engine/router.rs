//! Request routing.
//!
//! Every intercepted request is classified once and handed to exactly one
//! strategy:
//!
//! - API GETs: network first, falling back to a cached copy younger than the
//!   freshness window, then to a synthesized 503.
//! - Other GETs (assets): cache first from the current static generation,
//!   network on miss. Asset failures propagate.
//! - Non-GET requests: straight to the network. API mutations that cannot
//!   reach the network are queued for replay.

use anyhow::Result;
use reqwest::Method;
use tracing::{debug, info, warn};

use super::Engine;
use crate::cache::CachedResponse;
use crate::error::EngineError;
use crate::http::{Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Api,
    Asset,
    Passthrough,
}

pub fn classify(request: &Request, api_prefix: &str) -> RequestClass {
    if request.method != Method::GET {
        RequestClass::Passthrough
    } else if request.url.path().starts_with(api_prefix) {
        RequestClass::Api
    } else {
        RequestClass::Asset
    }
}

impl Engine {
    /// Resolve an intercepted request. Always yields a response unless an
    /// asset (or non-API passthrough) fetch fails at the transport level.
    pub async fn route(&self, request: &Request) -> Result<Response> {
        let class = classify(request, &self.config.api_prefix);
        debug!(method = %request.method, url = %request.url, class = ?class, "Routing request");

        match class {
            RequestClass::Api => self.network_first(request).await,
            RequestClass::Asset => self.cache_first(request).await,
            RequestClass::Passthrough => self.passthrough(request).await,
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response> {
        let cache_name = self.config.static_cache_name();

        match self.caches.match_entry(&cache_name, &request.identity()).await {
            Ok(Some(entry)) => {
                debug!(url = %request.url, "Asset cache hit");
                return Ok(entry.to_response());
            }
            Ok(None) => {}
            Err(e) => {
                warn!(cache = %cache_name, error = %e, "Failed to read asset cache");
            }
        }

        let response = self.fetcher.fetch(request).await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Asset fetch failed");
            EngineError::Fetch(e)
        })?;

        if response.is_success() {
            self.store(&cache_name, request, &response).await;
        }
        Ok(response)
    }

    async fn network_first(&self, request: &Request) -> Result<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                // Error statuses are live results: returned as-is, never cached,
                // and they do not consult the cache.
                if response.is_success() {
                    self.store(&self.config.api_cache_name, request, &response)
                        .await;
                }
                return Ok(response);
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "API fetch failed, trying cache");
            }
        }

        Ok(self
            .cached_api_response(request)
            .await
            .unwrap_or_else(Response::offline))
    }

    async fn cached_api_response(&self, request: &Request) -> Option<Response> {
        let now = self.clock.now();
        match self
            .caches
            .match_entry(&self.config.api_cache_name, &request.identity())
            .await
        {
            Ok(Some(entry)) if entry.is_fresh(now, self.config.freshness_window()) => {
                debug!(url = %request.url, age_minutes = entry.age_minutes(now), "Serving cached API response");
                Some(entry.to_response())
            }
            Ok(Some(entry)) => {
                debug!(url = %request.url, age_minutes = entry.age_minutes(now), "Cached API response expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read API cache");
                None
            }
        }
    }

    async fn passthrough(&self, request: &Request) -> Result<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) if request.url.path().starts_with(&self.config.api_prefix) => {
                let id = self.enqueue_mutation(request).await?;
                info!(id = id, url = %request.url, error = %e, "Deferred mutation until reconnect");
                Ok(Response::offline())
            }
            Err(e) => Err(EngineError::Fetch(e).into()),
        }
    }

    /// Cache writes are best effort: a failed write never fails the request.
    async fn store(&self, cache_name: &str, request: &Request, response: &Response) {
        let entry = CachedResponse::new(request, response, self.clock.now());
        if let Err(e) = self.caches.put(cache_name, entry).await {
            warn!(cache = cache_name, url = %request.url, error = %e, "Failed to store response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{CACHE_TIME_HEADER, OFFLINE_BODY};
    use crate::test_support::{serve_manifest, url, Harness};
    use chrono::Duration;

    #[test]
    fn test_classify() {
        let api = Request::get(url("/api/v1/subjects"));
        let asset = Request::get(url("/static/js/main.js"));
        let post = Request::new(Method::POST, url("/api/v1/scans"));
        let apis = Request::get(url("/apis.html"));
        assert_eq!(classify(&api, "/api/"), RequestClass::Api);
        assert_eq!(classify(&asset, "/api/"), RequestClass::Asset);
        assert_eq!(classify(&post, "/api/"), RequestClass::Passthrough);
        assert_eq!(classify(&apis, "/api/"), RequestClass::Asset);
    }

    #[tokio::test]
    async fn test_subjects_scenario_fresh_then_expired() {
        let h = Harness::new();
        let req = Request::get(url("/api/v1/subjects"));
        h.fetcher.respond("/api/v1/subjects", 200, r#"[{"id":1}]"#);

        // T=0: live
        let live = h.engine.route(&req).await.unwrap();
        assert_eq!(live.status.as_u16(), 200);
        assert_eq!(live.text(), r#"[{"id":1}]"#);

        // T=30min: offline, served from cache
        h.fetcher.set_offline(true);
        h.clock.advance(Duration::minutes(30));
        let cached = h.engine.route(&req).await.unwrap();
        assert_eq!(cached.status.as_u16(), 200);
        assert_eq!(cached.body, live.body);
        assert!(cached.header(CACHE_TIME_HEADER).is_some());

        // T=90min: still offline, entry expired
        h.clock.advance(Duration::minutes(60));
        let offline = h.engine.route(&req).await.unwrap();
        assert_eq!(offline.status.as_u16(), 503);
        assert_eq!(offline.text(), OFFLINE_BODY);
        assert_eq!(offline.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_api_offline_without_cache_is_503() {
        let h = Harness::new();
        h.fetcher.set_offline(true);
        let resp = h.engine.route(&Request::get(url("/api/v1/scans"))).await.unwrap();
        assert_eq!(resp, Response::offline());
    }

    #[tokio::test]
    async fn test_api_error_status_returned_uncached() {
        let h = Harness::new();
        let req = Request::get(url("/api/v1/subjects"));
        h.fetcher.respond("/api/v1/subjects", 200, "[1]");
        h.engine.route(&req).await.unwrap();

        // A server error is a live result, even with a fresh cache entry present
        h.fetcher.respond("/api/v1/subjects", 500, "boom");
        let resp = h.engine.route(&req).await.unwrap();
        assert_eq!(resp.status.as_u16(), 500);
        assert_eq!(resp.text(), "boom");

        // And it did not replace the cached success
        h.fetcher.set_offline(true);
        let cached = h.engine.route(&req).await.unwrap();
        assert_eq!(cached.text(), "[1]");
    }

    #[tokio::test]
    async fn test_api_error_status_not_cached_when_empty() {
        let h = Harness::new();
        let req = Request::get(url("/api/v1/subjects/9"));
        h.fetcher.respond("/api/v1/subjects/9", 404, "missing");
        assert_eq!(h.engine.route(&req).await.unwrap().status.as_u16(), 404);

        h.fetcher.set_offline(true);
        assert_eq!(h.engine.route(&req).await.unwrap(), Response::offline());
    }

    #[tokio::test]
    async fn test_api_success_refreshes_timestamp() {
        let h = Harness::new();
        let req = Request::get(url("/api/v1/subjects"));
        h.fetcher.respond("/api/v1/subjects", 200, "v1");
        h.engine.route(&req).await.unwrap();

        h.clock.advance(Duration::minutes(50));
        h.fetcher.respond("/api/v1/subjects", 200, "v2");
        h.engine.route(&req).await.unwrap();

        // 50 minutes after the second write the entry is still fresh
        h.clock.advance(Duration::minutes(50));
        h.fetcher.set_offline(true);
        let resp = h.engine.route(&req).await.unwrap();
        assert_eq!(resp.text(), "v2");
    }

    #[tokio::test]
    async fn test_asset_hit_never_touches_network() {
        let h = Harness::new();
        serve_manifest(&h.fetcher, h.engine.config());
        h.engine.on_install().await.unwrap();
        h.fetcher.reset_calls();

        let resp = h.engine.route(&Request::get(url("/index.html"))).await.unwrap();
        assert_eq!(resp.text(), "asset /index.html");
        assert!(h.fetcher.calls().is_empty());

        // Even when the network would now answer differently
        h.fetcher.respond("/index.html", 200, "changed");
        let again = h.engine.route(&Request::get(url("/index.html"))).await.unwrap();
        assert_eq!(again.text(), "asset /index.html");
        assert!(h.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_asset_miss_fetches_and_stores() {
        let h = Harness::new();
        h.fetcher.respond("/logo512.png", 200, "png");
        let req = Request::get(url("/logo512.png"));

        assert_eq!(h.engine.route(&req).await.unwrap().text(), "png");
        assert_eq!(h.engine.route(&req).await.unwrap().text(), "png");
        assert_eq!(h.fetcher.call_count("/logo512.png"), 1);
    }

    #[tokio::test]
    async fn test_asset_error_status_not_stored() {
        let h = Harness::new();
        let req = Request::get(url("/missing.js"));
        assert_eq!(h.engine.route(&req).await.unwrap().status.as_u16(), 404);
        assert_eq!(h.engine.route(&req).await.unwrap().status.as_u16(), 404);
        assert_eq!(h.fetcher.call_count("/missing.js"), 2);
    }

    #[tokio::test]
    async fn test_asset_transport_failure_propagates() {
        let h = Harness::new();
        h.fetcher.fail("/static/css/main.css");
        let err = h
            .engine
            .route(&Request::get(url("/static/css/main.css")))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_asset_lookup_ignores_api_store() {
        let h = Harness::new();
        h.fetcher.respond("/api/v1/subjects", 200, "[]");
        h.engine.route(&Request::get(url("/api/v1/subjects"))).await.unwrap();
        h.fetcher.reset_calls();

        // Assets only consult the static generation
        h.engine.route(&Request::get(url("/favicon.ico"))).await.unwrap();
        assert_eq!(h.fetcher.call_count("/favicon.ico"), 1);
    }

    #[tokio::test]
    async fn test_mutation_passthrough_online() {
        let h = Harness::new();
        h.fetcher.respond("/api/v1/scans", 201, r#"{"id":3}"#);
        let req = Request::new(Method::POST, url("/api/v1/scans")).with_body(r#"{"subject":1}"#);

        let resp = h.engine.route(&req).await.unwrap();
        assert_eq!(resp.status.as_u16(), 201);
        assert!(h.engine.pending_mutations().await.unwrap().is_empty());
        assert_eq!(h.fetcher.calls()[0].body, br#"{"subject":1}"#.to_vec());
    }

    #[tokio::test]
    async fn test_mutation_deferred_when_offline() {
        let h = Harness::new();
        h.fetcher.set_offline(true);
        let req = Request::new(Method::POST, url("/api/v1/scans")).with_body(r#"{"subject":1}"#);

        let resp = h.engine.route(&req).await.unwrap();
        assert_eq!(resp, Response::offline());

        let pending = h.engine.pending_mutations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request, req);
    }

    #[tokio::test]
    async fn test_non_api_mutation_failure_propagates() {
        let h = Harness::new();
        h.fetcher.set_offline(true);
        let req = Request::new(Method::POST, url("/feedback"));
        assert!(h.engine.route(&req).await.is_err());
        assert!(h.engine.pending_mutations().await.unwrap().is_empty());
    }
}

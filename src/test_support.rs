//! Fakes shared by the engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;
use url::Url;

use crate::clock::Clock;
use crate::config::Config;
use crate::engine::Engine;
use crate::http::{Request, Response};
use crate::network::{FetchError, Fetcher};
use crate::platform::{Notification, Platform};

pub const ORIGIN: &str = "http://localhost:3000/";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

#[derive(Clone)]
enum Outcome {
    Respond(StatusCode, Vec<u8>),
    Fail,
}

/// Scripted network. Unscripted URLs answer 404; `set_offline` fails everything.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Outcome>>,
    offline: AtomicBool,
    calls: Mutex<Vec<Request>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            url(path).to_string(),
            Outcome::Respond(StatusCode::from_u16(status).unwrap(), body.as_bytes().to_vec()),
        );
    }

    pub fn fail(&self, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Outcome::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        let target = url(path);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == target)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Fetcher for MockFetcher {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        self.calls.lock().unwrap().push(request.clone());
        let outcome = if self.offline.load(Ordering::SeqCst) {
            Outcome::Fail
        } else {
            self.routes
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .unwrap_or(Outcome::Respond(StatusCode::NOT_FOUND, b"not found".to_vec()))
        };
        let url = request.url.to_string();
        async move {
            match outcome {
                Outcome::Respond(status, body) => Ok(Response::new(status, body)),
                Outcome::Fail => Err(FetchError::Unreachable(url)),
            }
        }
        .boxed()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    SkipWaiting,
    ClaimClients,
    Show(Notification),
    Close(String),
    OpenWindow(String),
}

#[derive(Default)]
pub struct RecordingPlatform {
    events: Mutex<Vec<PlatformEvent>>,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PlatformEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: PlatformEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Platform for RecordingPlatform {
    fn skip_waiting(&self) {
        self.record(PlatformEvent::SkipWaiting);
    }

    fn claim_clients(&self) -> BoxFuture<'_, Result<()>> {
        self.record(PlatformEvent::ClaimClients);
        async { Ok(()) }.boxed()
    }

    fn show_notification(&self, notification: &Notification) -> Result<()> {
        self.record(PlatformEvent::Show(notification.clone()));
        Ok(())
    }

    fn close_notification(&self, notification: &Notification) {
        self.record(PlatformEvent::Close(notification.title.clone()));
    }

    fn open_window<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        self.record(PlatformEvent::OpenWindow(url.to_string()));
        async { Ok(()) }.boxed()
    }
}

/// An engine wired to fakes over a temporary cache directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub fetcher: Arc<MockFetcher>,
    pub platform: Arc<RecordingPlatform>,
    pub clock: Arc<ManualClock>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new();
        let platform = RecordingPlatform::new();
        let clock = ManualClock::new();
        let engine = Engine::new(
            config,
            dir.path().to_path_buf(),
            fetcher.clone(),
            platform.clone(),
        )
        .unwrap()
        .with_clock(clock.clone());
        Self {
            dir,
            fetcher,
            platform,
            clock,
            engine,
        }
    }

    /// Another engine over the same storage and fakes, e.g. a newer version.
    pub fn engine_with(&self, config: Config) -> Engine {
        Engine::new(
            config,
            self.dir.path().to_path_buf(),
            self.fetcher.clone(),
            self.platform.clone(),
        )
        .unwrap()
        .with_clock(self.clock.clone())
    }
}

pub fn test_config() -> Config {
    Config {
        origin: Url::parse(ORIGIN).unwrap(),
        manifest: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/static/js/main.js".to_string(),
        ],
        ..Config::default()
    }
}

/// Script 2xx responses for every manifest entry of `config`.
pub fn serve_manifest(fetcher: &MockFetcher, config: &Config) {
    for path in &config.manifest {
        fetcher.respond(path, 200, &format!("asset {}", path));
    }
}

//! Host platform seam.
//!
//! The engine never talks to windows, tabs or the notification tray itself.
//! Everything that reaches outside the cache and the network goes through
//! a `Platform`, so the engine can run under a real host, the CLI, or a
//! recording fake in tests.

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Routing data carried by a notification and read back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: Option<String>,
}

/// A user-visible notification built from a push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

pub trait Platform: Send + Sync {
    /// Ask the host to activate a freshly installed version without waiting
    /// for existing application instances to close.
    fn skip_waiting(&self);

    /// Take control of every open application instance.
    fn claim_clients(&self) -> BoxFuture<'_, Result<()>>;

    fn show_notification(&self, notification: &Notification) -> Result<()>;

    fn close_notification(&self, notification: &Notification);

    /// Open or focus an application window at `url`.
    fn open_window<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Platform for headless hosts: every side effect is logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPlatform;

impl Platform for LogPlatform {
    fn skip_waiting(&self) {
        info!("Skip waiting requested");
    }

    fn claim_clients(&self) -> BoxFuture<'_, Result<()>> {
        async {
            info!("Claiming clients");
            Ok(())
        }
        .boxed()
    }

    fn show_notification(&self, notification: &Notification) -> Result<()> {
        info!(
            title = %notification.title,
            body = %notification.body,
            url = ?notification.data.url,
            "Notification"
        );
        Ok(())
    }

    fn close_notification(&self, notification: &Notification) {
        info!(title = %notification.title, "Notification closed");
    }

    fn open_window<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            info!(url = url, "Open window");
            Ok(())
        }
        .boxed()
    }
}

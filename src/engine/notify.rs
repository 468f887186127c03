//! Push notifications.

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::Engine;
use crate::error::EngineError;
use crate::platform::{Notification, NotificationData};

/// Inbound push message. Fields other than these are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl NotificationPayload {
    pub fn parse(payload: &[u8]) -> Result<Self, EngineError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl Engine {
    /// Show a notification for a push payload.
    ///
    /// A payload that is not valid JSON is returned as
    /// `EngineError::MalformedPush`; there is nobody to report it to, so the
    /// host is expected to log it and move on.
    pub fn on_push(&self, payload: &[u8]) -> Result<Notification> {
        let payload = NotificationPayload::parse(payload)?;
        let notification = Notification {
            title: payload.title,
            body: payload.body,
            icon: self.config.notification_icon.clone(),
            badge: self.config.notification_icon.clone(),
            vibrate: self.config.vibrate.clone(),
            data: NotificationData { url: payload.url },
        };
        self.platform.show_notification(&notification)?;
        Ok(notification)
    }

    /// Dismiss the notification and open the window it points at.
    pub async fn on_notification_click(&self, notification: &Notification) -> Result<()> {
        self.platform.close_notification(notification);
        match notification.data.url.as_deref() {
            Some(url) => self.platform.open_window(url).await,
            None => {
                debug!(title = %notification.title, "Notification has no target url");
                Ok(())
            }
        }
    }
}

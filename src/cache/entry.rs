use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{Request, RequestIdentity, Response, CACHE_TIME_HEADER};

/// A response stored in a cache generation, together with the request that
/// produced it and the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub request: Request,
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Snapshot `response` for `request`. The request body is dropped (only
    /// GETs are cached) and the write time is stamped into the headers.
    pub fn new(request: &Request, response: &Response, cached_at: DateTime<Utc>) -> Self {
        let mut request = request.clone();
        request.body.clear();

        let mut response = response.clone();
        response.headers.insert(
            CACHE_TIME_HEADER.to_string(),
            cached_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        Self {
            request,
            response,
            cached_at,
        }
    }

    pub fn identity(&self) -> RequestIdentity {
        self.request.identity()
    }

    pub fn to_response(&self) -> Response {
        self.response.clone()
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_minutes()
    }

    /// Fresh while strictly younger than `window`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.cached_at < window
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_minutes(now);
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

//! Request and response types that flow through the engine.
//!
//! These are deliberately plain data: the engine never holds a live socket,
//! so everything it caches or queues can be serialized to disk and handed
//! back to the application unchanged.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Header injected into every stored response, carrying the write time (RFC 3339).
pub const CACHE_TIME_HEADER: &str = "cache-time";

/// Body of the synthesized offline response. Must stay byte-exact.
pub const OFFLINE_BODY: &str = r#"{"error":"You are offline and no cached data is available."}"#;

pub type Headers = BTreeMap<String, String>;

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(with = "method_serde")]
    pub method: Method,
    pub url: Url,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "body_serde")]
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Header names are stored lowercase.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::of(&self.method, &self.url)
    }
}

/// Canonical cache key: method plus absolute URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestIdentity(String);

impl RequestIdentity {
    pub fn of(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method.as_str(), url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response handed back to the application, either live or from a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(with = "status_serde")]
    pub status: StatusCode,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "body_serde")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The deterministic 503 returned when an API request can be served neither
    /// from the network nor from a fresh cache entry.
    pub fn offline() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_BODY)
            .with_header("Content-Type", "application/json")
    }
}

mod method_serde {
    use std::str::FromStr;

    use reqwest::Method;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Method::from_str(&raw).map_err(de::Error::custom)
    }
}

mod status_serde {
    use reqwest::StatusCode;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let code = u16::deserialize(deserializer)?;
        StatusCode::from_u16(code).map_err(de::Error::custom)
    }
}

/// Bodies are arbitrary bytes, stored as base64 so cache files stay valid JSON.
mod body_serde {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw).map_err(de::Error::custom)
    }
}

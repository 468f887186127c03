//! reqwest-backed fetcher.

use std::time::Duration;

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{header, Client};
use tracing::debug;

use super::FetchError;
use crate::http::{Headers, Request, Response};

/// HTTP request timeout in seconds.
/// A hung fetch only blocks the request that issued it.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Performs outbound requests on behalf of the engine.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>>;
}

/// Fetcher over a shared reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client })
    }

    fn request_headers(request: &Request) -> Result<header::HeaderMap, FetchError> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Repeated header names are folded into one comma-separated value, in
    /// the order received. Non-UTF-8 values are dropped rather than failing
    /// the fetch.
    fn response_headers(map: &header::HeaderMap) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in map {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        headers
    }

    async fn send(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::request_headers(request)?);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();

        let headers = Self::response_headers(response.headers());

        let body = response.bytes().await?.to_vec();
        debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Fetched");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        self.send(request).boxed()
    }
}

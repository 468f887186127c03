use thiserror::Error;

use crate::network::{error::truncate_body, FetchError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Install failed for {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Malformed push payload: {0}")]
    MalformedPush(#[from] serde_json::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl EngineError {
    pub fn install_status(url: &str, status: reqwest::StatusCode, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        EngineError::InstallFailed {
            url: url.to_string(),
            reason: format!("Status {}: {}", status, truncate_body(&body)),
        }
    }

    pub fn install_transport(url: &str, error: &FetchError) -> Self {
        EngineError::InstallFailed {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

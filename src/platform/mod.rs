//! Hosted backend adapters: HTTP implementations of the auth collaborators.
//!
//! DESIGN
//! ======
//! `PlatformClient` wraps one `reqwest::Client` configured with the backend
//! URL and public key. Transport failures and HTTP statuses are mapped into
//! `CollaboratorError` here, so nothing past this module sees `reqwest`
//! types. Wire parsing lives in pure functions for testability.

pub mod profiles;
pub mod session;

use std::time::Duration;

use reqwest::{Method, RequestBuilder};

use crate::auth::CollaboratorError;
use crate::config::PlatformConfig;

pub use profiles::HttpProfileRepository;
pub use session::HttpSessionStore;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// CLIENT
// =============================================================================

/// Shared HTTP access to the hosted backend. Cheap to clone.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    config: PlatformConfig,
}

impl PlatformClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| PlatformError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Absolute URL for a path relative to the backend root.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.url, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.config.anon_key
    }

    /// Request builder carrying the public key header.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.config.anon_key)
    }

    /// Send a request and return the body of a successful response.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<String, CollaboratorError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        classify_status(status, &body)?;
        Ok(body)
    }
}

// =============================================================================
// ERROR NORMALIZATION
// =============================================================================

/// Map an HTTP status to the closed error set. 2xx is success.
///
/// # Errors
///
/// Returns the matching [`CollaboratorError`] for any non-2xx status.
pub fn classify_status(status: u16, body: &str) -> Result<(), CollaboratorError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(CollaboratorError::Unauthorized),
        404 => Err(CollaboratorError::NotFound),
        408 | 504 => Err(CollaboratorError::Timeout),
        _ => Err(CollaboratorError::Backend { status, message: error_message(body) }),
    }
}

fn transport_error(e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout
    } else if e.is_decode() {
        CollaboratorError::Malformed(e.to_string())
    } else {
        CollaboratorError::Network(e.to_string())
    }
}

/// Best human-readable message from an error body. The auth and data
/// endpoints use different field names.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_owned();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.trim().to_owned(), str::to_owned)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

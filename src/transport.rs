//! Blocking HTTP transport for recording-mode passthrough

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, RewindError};
use crate::matcher::LiveRequest;

/// Response fetched from the real network
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in wire order
    pub headers: Vec<(String, String)>,
    /// Raw response body
    pub body: Vec<u8>,
}

/// Re-issues intercepted calls against the real network
///
/// The record path is synchronous: one blocking call, the given timeout, no
/// retry. A failure propagates to the caller and nothing is recorded.
pub trait Transport {
    /// Send the request, honoring `timeout`
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be built or the network call fails
    fn send(&self, request: &LiveRequest, timeout: Duration) -> Result<FetchedResponse>;
}

/// Transport backed by a blocking `reqwest` client
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Transport with a default client
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &LiveRequest, timeout: Duration) -> Result<FetchedResponse> {
        debug!(method = %request.method, url = %request.url, "forwarding to network");

        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| RewindError::Transport(format!("invalid method: {e}")))?;

        let mut builder = self.client.request(method, &request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().map_err(|e| {
            warn!("request failed: {e}");
            RewindError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| RewindError::Transport(format!("failed to read response body: {e}")))?
            .to_vec();

        Ok(FetchedResponse {
            status,
            headers,
            body,
        })
    }
}

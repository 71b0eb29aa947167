//! Shared HTTP plumbing for the outbound service clients.

use sip_ingest_core::error::CapabilityError;
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

pub(crate) fn transport_error(e: reqwest::Error) -> CapabilityError {
    if e.is_timeout() {
        CapabilityError::Timeout
    } else {
        CapabilityError::Transport(e.to_string())
    }
}

/// Body text for diagnostics; an unreadable body is not worth failing over.
pub(crate) async fn body_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<Failed to decode response body>"))
}

//! Completion-notification client: posts each [`ProcessingOutcome`] as JSON.

use async_trait::async_trait;
use sip_ingest_core::contract::{CompletionNotifier, ProcessingOutcome};
use sip_ingest_core::error::CapabilityError;
use std::time::Duration;

use crate::http::{body_text, build_client, transport_error};

pub struct NotifyClient {
    http: reqwest::Client,
    url: String,
}

impl NotifyClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CompletionNotifier for NotifyClient {
    async fn notify(&self, outcome: &ProcessingOutcome) -> Result<(), CapabilityError> {
        tracing::info!(url = %self.url, transfer_id = %outcome.transfer_id, status = ?outcome.status, "Sending completion notification");
        let response = self
            .http
            .post(&self.url)
            .json(outcome)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            tracing::error!(status = %status, "Completion notification rejected");
            return Err(CapabilityError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

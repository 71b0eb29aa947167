//! Archival-metadata registration client.
//!
//! The registry accepts an [`ArchivalPayload`] as JSON and signals acceptance with
//! `201 Created`; any other status is a failure, even another 2xx.

use async_trait::async_trait;
use reqwest::StatusCode;
use sip_ingest_core::contract::{ArchivalPayload, MetadataRegistrar};
use sip_ingest_core::error::CapabilityError;
use std::time::Duration;

use crate::http::{body_text, build_client, transport_error};

pub struct RegistryClient {
    http: reqwest::Client,
    url: String,
}

impl RegistryClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MetadataRegistrar for RegistryClient {
    async fn register(&self, payload: &ArchivalPayload) -> Result<(), CapabilityError> {
        tracing::info!(
            url = %self.url,
            transfer_id = %payload.transfer_id,
            originals = payload.originals.len(),
            preserved = payload.preserved.len(),
            "Registering archival metadata"
        );
        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = body_text(response).await;
            tracing::error!(status = %status, body = %body, "Metadata registration was not accepted");
            return Err(CapabilityError::UnexpectedStatus {
                expected: StatusCode::CREATED.as_u16(),
                code: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

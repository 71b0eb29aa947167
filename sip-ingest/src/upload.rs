#![doc = "Object-storage upload client: streams staged artifacts to the storage service as multipart form data."]
//
//! # Storage Upload (CLI <-> Core)
//!
//! [`StorageClient`] implements the core [`ObjectStore`] contract against the storage
//! service's upload endpoint. Each call opens the file, streams it as the `file` part
//! and sends `bucket` and `key` as text fields. A 2xx response carries a JSON
//! acknowledgement which is returned as-is.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use sip_ingest_core::contract::{ObjectStore, UploadAck};
use sip_ingest_core::error::CapabilityError;
use std::path::Path;
use std::time::Duration;

use crate::http::{body_text, build_client, transport_error};

pub struct StorageClient {
    http: reqwest::Client,
    url: String,
}

impl StorageClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let url = url.into();
        tracing::info!(url = %url, timeout = ?timeout, "Initialized StorageClient");
        Ok(Self {
            http: build_client(timeout)?,
            url,
        })
    }
}

#[async_trait]
impl ObjectStore for StorageClient {
    async fn upload(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<UploadAck, CapabilityError> {
        tracing::info!(bucket, key, path = %path.display(), "Uploading artifact to storage");

        let file = tokio::fs::File::open(path).await.map_err(|e| {
            tracing::error!(error = ?e, path = %path.display(), "Failed to open artifact for upload");
            CapabilityError::Io(e)
        })?;
        let length = file.metadata().await?.len();
        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();

        let form = Form::new()
            .part("file", Part::stream_with_length(file, length).file_name(file_name))
            .text("bucket", bucket.to_string())
            .text("key", key.to_string());

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            tracing::error!(status = %status, bucket, key, "Storage service rejected upload");
            return Err(CapabilityError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let ack = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| CapabilityError::Decode(e.to_string()))?;
        tracing::info!(bucket, key, "Successfully uploaded artifact");
        Ok(UploadAck(ack))
    }
}

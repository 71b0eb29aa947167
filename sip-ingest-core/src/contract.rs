//! # contract: capability interfaces for the ingestion pipeline
//!
//! Every side effect the pipeline performs outside of the staging directory goes
//! through one of the traits defined here:
//!
//! - [`Normalizer`]: out-of-process conversion into the preservation format
//! - [`ObjectStore`]: upload of a local artifact into a logical bucket
//! - [`MetadataRegistrar`]: submission of the [`ArchivalPayload`] for a file
//! - [`CompletionNotifier`]: delivery of the per-file [`ProcessingOutcome`]
//! - [`TaskFeed`]: the source of raw incoming task messages
//!
//! ## Mocking & Testing
//! - Traits are annotated for `mockall`; the mocks are exported under the
//!   default `test-export-mocks` feature so integration tests and the CLI crate
//!   can drive the orchestrator without any network or conversion tool.
//!
//! ## Wire Types
//! - [`ArchivalPayload`], [`FileDescriptor`] and [`ProcessingOutcome`] serialize
//!   to the JSON documents the registration and notification services accept.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{CapabilityError, ConversionError, FeedError};

/// Describes one stored artifact inside an [`ArchivalPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    /// Only set for entries in `originals`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub storage_key: String,
    pub digest: String,
    pub format_tag: String,
}

/// Structured description of the artifacts produced for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalPayload {
    pub transfer_id: String,
    pub originals: Vec<FileDescriptor>,
    pub preserved: Vec<FileDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// Per-file result reported to the completion notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    #[serde(rename = "transferId")]
    pub transfer_id: String,
    pub status: OutcomeStatus,
    pub message: String,
}

/// Acknowledgement returned by the object store, kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAck(pub serde_json::Value);

/// Converts a staged file into its preservation copy.
///
/// Implementations must only return `Ok` when the output file actually exists.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, input: &Path, output_dir: &Path)
        -> Result<PathBuf, ConversionError>;
}

/// Pushes a local artifact into a named bucket under a key.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &Path, bucket: &str, key: &str)
        -> Result<UploadAck, CapabilityError>;
}

/// Submits archival metadata for the artifacts of one file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MetadataRegistrar: Send + Sync {
    async fn register(&self, payload: &ArchivalPayload) -> Result<(), CapabilityError>;
}

/// Reports the per-file processing outcome downstream.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, outcome: &ProcessingOutcome) -> Result<(), CapabilityError>;
}

/// Source of raw task messages.
///
/// `next_message` yields `Ok(None)` once the feed is exhausted; a broker-backed
/// feed never ends and instead waits for the next record. `acknowledge` marks the
/// most recently returned message as consumed.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TaskFeed: Send {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, FeedError>;

    async fn acknowledge(&mut self) -> Result<(), FeedError>;
}

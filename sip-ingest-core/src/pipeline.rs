//! Per-transfer orchestration: drives every staged file of a transfer through
//! sanitize → hash → classify → normalize → upload → register → notify.
//!
//! # Flow
//! For a [`TransferTask`], the staging directory `staging_root/<transferId>` is listed
//! once; a missing directory means there is nothing to do. Each regular file is then
//! processed to completion, one at a time, in name order:
//!
//! ```text
//! RECEIVED → SANITIZED → HASHED → CLASSIFIED → {NORMALIZED | NOT_NORMALIZED}
//!          → UPLOADED → REGISTERED → NOTIFIED
//! ```
//!
//! `HASH_FAILED` (and `RENAME_FAILED`, for a failed in-place rename) are absorbing:
//! the file is abandoned with no upload, registration or notification.
//!
//! # Failure Policy
//! - Conversion failures downgrade the file to `NOT_NORMALIZED`; processing continues.
//! - Upload, registration and notification failures are logged and recorded in the
//!   [`FileReport`], never raised. Under [`StatusPolicy::AllSteps`] they also turn the
//!   notified status into `FAILED`, and a failed original upload skips registration.
//! - Only a failure to read the staging directory itself is returned as an error.
//!
//! # Navigation
//! - Main entrypoint: [`TransferProcessor::process_transfer`]
//! - Results: [`TransferReport`], [`FileReport`]

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{error, info, info_span, warn, Instrument};

use crate::checksum::file_digest;
use crate::config::{PipelineConfig, StatusPolicy};
use crate::contract::{
    ArchivalPayload, CompletionNotifier, FileDescriptor, MetadataRegistrar, Normalizer,
    ObjectStore, OutcomeStatus, ProcessingOutcome,
};
use crate::error::PipelineError;
use crate::format::{classify, FormatTag};
use crate::sanitize::sanitize_filename;
use crate::task::TransferTask;

/// Message sent with a `FAILED` outcome when the file has no preservation copy.
pub const NORMALIZATION_FAILED_MESSAGE: &str = "File normalization failed.";

/// The external collaborators a [`TransferProcessor`] drives.
pub struct Capabilities {
    pub normalizer: Box<dyn Normalizer>,
    pub store: Box<dyn ObjectStore>,
    pub registrar: Box<dyn MetadataRegistrar>,
    pub notifier: Box<dyn CompletionNotifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Received,
    Sanitized,
    RenameFailed,
    Hashed,
    HashFailed,
    Classified,
    Normalized,
    NotNormalized,
    Uploaded,
    Registered,
    Notified,
}

/// Working record of one file during a single processing pass.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub original_name: String,
    pub sanitized_name: String,
    pub absolute_path: PathBuf,
    pub content_digest: Option<String>,
    pub format_tag: Option<FormatTag>,
    pub normalized_path: Option<PathBuf>,
    pub normalized_digest: Option<String>,
}

impl FileEntry {
    fn normalized_name(&self) -> Option<String> {
        self.normalized_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Result of one sub-step for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Skipped,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }

    fn from_result<T, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => StepOutcome::Succeeded,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub original_name: String,
    pub sanitized_name: String,
    /// Last state reached.
    pub state: FileState,
    pub format_tag: Option<FormatTag>,
    pub normalization: StepOutcome,
    pub original_upload: StepOutcome,
    pub preserved_upload: StepOutcome,
    pub registration: StepOutcome,
    pub notification: StepOutcome,
    /// Status sent to the notifier; `None` when the file was abandoned.
    pub status: Option<OutcomeStatus>,
}

impl FileReport {
    fn new(original_name: &str, sanitized_name: &str) -> Self {
        Self {
            original_name: original_name.to_string(),
            sanitized_name: sanitized_name.to_string(),
            state: FileState::Received,
            format_tag: None,
            normalization: StepOutcome::Skipped,
            original_upload: StepOutcome::Skipped,
            preserved_upload: StepOutcome::Skipped,
            registration: StepOutcome::Skipped,
            notification: StepOutcome::Skipped,
            status: None,
        }
    }

    /// Conjunction of every sub-outcome that applies to this file.
    pub fn all_succeeded(&self) -> bool {
        self.state == FileState::Notified
            && self.normalization.succeeded()
            && self.original_upload.succeeded()
            && self.preserved_upload.succeeded()
            && self.registration.succeeded()
            && self.notification.succeeded()
    }
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    pub transfer_id: String,
    pub ra: String,
    /// `false` when the staging directory did not exist.
    pub staged: bool,
    pub files: Vec<FileReport>,
}

impl TransferReport {
    pub fn count_status(&self, status: OutcomeStatus) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == Some(status))
            .count()
    }

    pub fn abandoned(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_none()).count()
    }
}

pub struct TransferProcessor {
    config: PipelineConfig,
    caps: Capabilities,
}

impl TransferProcessor {
    pub fn new(config: PipelineConfig, caps: Capabilities) -> Self {
        Self { config, caps }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn staging_dir(&self, task: &TransferTask) -> PathBuf {
        self.config.staging_root.join(&task.transfer_id)
    }

    pub async fn process_transfer(
        &self,
        task: &TransferTask,
    ) -> Result<TransferReport, PipelineError> {
        let span = info_span!("transfer", transfer_id = %task.transfer_id, ra = %task.ra);
        self.process_transfer_inner(task).instrument(span).await
    }

    async fn process_transfer_inner(
        &self,
        task: &TransferTask,
    ) -> Result<TransferReport, PipelineError> {
        let staging = self.staging_dir(task);
        let mut report = TransferReport {
            transfer_id: task.transfer_id.clone(),
            ra: task.ra.clone(),
            staged: false,
            files: Vec::new(),
        };

        if !tokio::fs::metadata(&staging)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            info!(path = %staging.display(), "[INGEST] No staging directory, nothing to do");
            return Ok(report);
        }
        report.staged = true;

        let names = list_regular_files(&staging).await?;
        info!(path = %staging.display(), files = names.len(), "[INGEST] Processing transfer");

        for name in names {
            let file_report = self.process_file(task, &staging, &name).await;
            report.files.push(file_report);
        }

        info!(
            files = report.files.len(),
            completed = report.count_status(OutcomeStatus::Completed),
            failed = report.count_status(OutcomeStatus::Failed),
            abandoned = report.abandoned(),
            "[INGEST] Transfer processed"
        );
        Ok(report)
    }

    async fn process_file(&self, task: &TransferTask, staging: &Path, raw_name: &OsStr) -> FileReport {
        // RECEIVED -> SANITIZED
        // Undecodable bytes become U+FFFD, which the sanitizer strips.
        let lossy = raw_name.to_string_lossy();
        let original: &str = &lossy;
        let sanitized = sanitize_filename(original);
        let mut report = FileReport::new(original, &sanitized);
        let original_path = staging.join(raw_name);
        let sanitized_path = staging.join(&sanitized);

        if original_path != sanitized_path {
            if tokio::fs::try_exists(&sanitized_path).await.unwrap_or(false) {
                warn!(from = %original, to = %sanitized, "[INGEST] Sanitized name collides with an existing file, overwriting");
            }
            if let Err(e) = tokio::fs::rename(&original_path, &sanitized_path).await {
                error!(error = ?e, from = %original, to = %sanitized, "[INGEST] Rename failed, abandoning file");
                report.state = FileState::RenameFailed;
                return report;
            }
        }
        report.state = FileState::Sanitized;
        info!(original = %original, sanitized = %sanitized, "[INGEST] Processing file");

        let mut entry = FileEntry {
            original_name: original.to_string(),
            sanitized_name: sanitized,
            absolute_path: sanitized_path,
            content_digest: None,
            format_tag: None,
            normalized_path: None,
            normalized_digest: None,
        };

        // SANITIZED -> HASHED | HASH_FAILED
        match file_digest(&entry.absolute_path).await {
            Ok(digest) => entry.content_digest = Some(digest),
            Err(e) => {
                error!(error = %e, file = %entry.sanitized_name, "[INGEST] Checksum failed, abandoning file");
                report.state = FileState::HashFailed;
                return report;
            }
        }
        report.state = FileState::Hashed;

        // HASHED -> CLASSIFIED
        let format = classify(&entry.sanitized_name);
        entry.format_tag = Some(format);
        report.format_tag = Some(format);
        report.state = FileState::Classified;
        info!(file = %entry.sanitized_name, format = %format, digest = ?entry.content_digest, "[INGEST] Classified");

        // CLASSIFIED -> NORMALIZED | NOT_NORMALIZED
        report.normalization = self.normalize(&mut entry, format).await;
        report.state = if entry.normalized_path.is_some() {
            FileState::Normalized
        } else {
            FileState::NotNormalized
        };

        // -> UPLOADED
        let original_key = storage_key(&task.ra, &entry.sanitized_name);
        report.original_upload = self
            .upload(&entry.absolute_path, &self.config.originals_bucket, &original_key)
            .await;

        let preserved_key = entry
            .normalized_name()
            .map(|name| storage_key(&task.ra, &name));
        if let (Some(path), Some(key)) = (entry.normalized_path.as_deref(), preserved_key.as_deref()) {
            report.preserved_upload = self
                .upload(path, &self.config.preservation_bucket, key)
                .await;
        }
        report.state = FileState::Uploaded;

        // -> REGISTERED
        let skip_registration = self.config.status_policy == StatusPolicy::AllSteps
            && !report.original_upload.succeeded();
        if skip_registration {
            warn!(file = %entry.sanitized_name, "[INGEST] Original upload failed, skipping registration");
        } else {
            let payload = archival_payload(task, &entry, &original_key, preserved_key.as_deref());
            let result = self.caps.registrar.register(&payload).await;
            if let Err(e) = &result {
                error!(error = %e, file = %entry.sanitized_name, "[INGEST] Metadata registration failed");
            } else {
                info!(file = %entry.sanitized_name, preserved = payload.preserved.len(), "[INGEST] Metadata registered");
            }
            report.registration = StepOutcome::from_result(&result);
        }
        report.state = FileState::Registered;

        // -> NOTIFIED
        let outcome = self.outcome(task, &report);
        let result = self.caps.notifier.notify(&outcome).await;
        if let Err(e) = &result {
            error!(error = %e, file = %entry.sanitized_name, status = ?outcome.status, "[INGEST] Completion notification failed");
        } else {
            info!(file = %entry.sanitized_name, status = ?outcome.status, "[INGEST] Completion notified");
        }
        report.notification = StepOutcome::from_result(&result);
        report.status = Some(outcome.status);
        report.state = FileState::Notified;
        report
    }

    async fn normalize(&self, entry: &mut FileEntry, format: FormatTag) -> StepOutcome {
        if !format.is_convertible() {
            info!(file = %entry.sanitized_name, format = %format, "[INGEST] Format not convertible, skipping normalization");
            return StepOutcome::Skipped;
        }

        let normalized = match self
            .caps
            .normalizer
            .normalize(&entry.absolute_path, &self.config.normalized_dir)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, file = %entry.sanitized_name, "[INGEST] Normalization failed, continuing without preservation copy");
                return StepOutcome::Failed(e.to_string());
            }
        };

        match file_digest(&normalized).await {
            Ok(digest) => {
                entry.normalized_digest = Some(digest);
                entry.normalized_path = Some(normalized);
                StepOutcome::Succeeded
            }
            Err(e) => {
                warn!(error = %e, path = %normalized.display(), "[INGEST] Checksum of normalized copy failed, treating as not normalized");
                StepOutcome::Failed(e.to_string())
            }
        }
    }

    async fn upload(&self, path: &Path, bucket: &str, key: &str) -> StepOutcome {
        info!(bucket, key, "[INGEST][UPLOAD] Uploading artifact");
        let result = self.caps.store.upload(path, bucket, key).await;
        match &result {
            Ok(ack) => info!(bucket, key, ack = ?ack.0, "[INGEST][UPLOAD] Upload succeeded"),
            Err(e) => error!(error = %e, bucket, key, "[INGEST][UPLOAD] Upload failed"),
        }
        StepOutcome::from_result(&result)
    }

    fn outcome(&self, task: &TransferTask, report: &FileReport) -> ProcessingOutcome {
        let normalized = report.normalization.succeeded();
        let (status, message) = match self.config.status_policy {
            StatusPolicy::NormalizationOnly => {
                if normalized {
                    (OutcomeStatus::Completed, String::new())
                } else {
                    (OutcomeStatus::Failed, NORMALIZATION_FAILED_MESSAGE.to_string())
                }
            }
            StatusPolicy::AllSteps => {
                let mut failed = Vec::new();
                if !normalized {
                    failed.push("normalization");
                }
                if !report.original_upload.succeeded() {
                    failed.push("original upload");
                }
                if matches!(report.preserved_upload, StepOutcome::Failed(_)) {
                    failed.push("preserved upload");
                }
                if !report.registration.succeeded() {
                    failed.push("registration");
                }
                if failed.is_empty() {
                    (OutcomeStatus::Completed, String::new())
                } else {
                    (OutcomeStatus::Failed, format!("Failed steps: {}", failed.join(", ")))
                }
            }
        };
        ProcessingOutcome {
            transfer_id: task.transfer_id.clone(),
            status,
            message,
        }
    }
}

/// Storage key for an artifact: `{ra}/{name}`.
pub fn storage_key(ra: &str, name: &str) -> String {
    format!("{ra}/{name}")
}

fn archival_payload(
    task: &TransferTask,
    entry: &FileEntry,
    original_key: &str,
    preserved_key: Option<&str>,
) -> ArchivalPayload {
    let original = FileDescriptor {
        name: entry.sanitized_name.clone(),
        original_name: Some(entry.original_name.clone()),
        storage_key: original_key.to_string(),
        digest: entry.content_digest.clone().unwrap_or_default(),
        format_tag: entry
            .format_tag
            .map(|f| f.as_str().to_string())
            .unwrap_or_default(),
    };

    let preserved = match (entry.normalized_name(), preserved_key, &entry.normalized_digest) {
        (Some(name), Some(key), Some(digest)) => vec![FileDescriptor {
            name,
            original_name: None,
            storage_key: key.to_string(),
            digest: digest.clone(),
            format_tag: FormatTag::Pdf.as_str().to_string(),
        }],
        _ => Vec::new(),
    };

    ArchivalPayload {
        transfer_id: task.transfer_id.clone(),
        originals: vec![original],
        preserved,
    }
}

async fn list_regular_files(dir: &Path) -> Result<Vec<OsString>, PipelineError> {
    let to_err = |source| PipelineError::StagingDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(to_err)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(to_err)? {
        let is_file = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}

//! Incoming transfer task messages.

use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::DecodeError;

/// One ingestion request: the files staged under `transfer_id`, stored under the `ra` namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub transfer_id: String,
    pub ra: String,
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(rename = "transferId")]
    transfer_id: String,
    #[serde(default)]
    ra: Option<String>,
}

impl TransferTask {
    pub fn new(transfer_id: impl Into<String>, ra: impl Into<String>) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            ra: ra.into(),
        }
    }

    /// Decodes a JSON task message. A missing `ra` falls back to `default_ra`.
    ///
    /// The `transferId` doubles as a staging directory name, so anything other
    /// than a single plain path component is rejected.
    pub fn decode(payload: &[u8], default_ra: &str) -> Result<Self, DecodeError> {
        let raw: RawTask = serde_json::from_slice(payload)?;
        validate_transfer_id(&raw.transfer_id)?;
        let ra = raw
            .ra
            .filter(|ra| !ra.is_empty())
            .unwrap_or_else(|| default_ra.to_string());
        Ok(Self {
            transfer_id: raw.transfer_id,
            ra,
        })
    }
}

pub fn validate_transfer_id(transfer_id: &str) -> Result<(), DecodeError> {
    let mut components = Path::new(transfer_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == transfer_id && !transfer_id.contains('\\') => {
            Ok(())
        }
        _ => Err(DecodeError::InvalidTransferId(transfer_id.to_string())),
    }
}

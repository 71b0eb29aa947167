//! Content identification: streaming SHA-256 over a file's bytes.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::HashError;

/// Read buffer size; memory use is bounded by this regardless of file size.
pub const CHUNK_SIZE: usize = 4096;

/// Computes the hex-encoded SHA-256 digest of the file at `path`.
pub async fn file_digest(path: &Path) -> Result<String, HashError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    let digest = format!("{:x}", hasher.finalize());
    debug!(path = %path.display(), bytes = total, digest = %digest, "Computed content digest");
    Ok(digest)
}

//! Normalization into the preservation format by an external conversion command.
//!
//! The converter is trusted only as far as it can be verified: a run counts as a
//! success when the process exits with status zero *and* the expected output file
//! `<output_dir>/<input stem>.pdf` exists afterwards. The output directory is shared
//! between transfers, so a file already sitting at that path is removed before the
//! converter starts and can never be mistaken for its output. Timeouts, launch failures,
//! non-zero exits and missing outputs are all reported as [`ConversionError`] with
//! the converter's stderr attached where available.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::ConverterConfig;
use crate::contract::Normalizer;
use crate::error::ConversionError;

/// Path the converter is expected to write for `input`.
pub fn expected_output(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}.pdf"))
}

async fn remove_stale_output(output: &Path) -> Result<(), ConversionError> {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {
            warn!(path = %output.display(), "[NORMALIZE] Removed stale output left by an earlier run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!(error = ?e, path = %output.display(), "[NORMALIZE] Could not clear stale output");
            Err(ConversionError::Io(e))
        }
    }
}

/// [`Normalizer`] backed by an out-of-process converter such as `unoconv`.
pub struct CommandNormalizer {
    config: ConverterConfig,
}

impl CommandNormalizer {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl Normalizer for CommandNormalizer {
    async fn normalize(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        tokio::fs::create_dir_all(output_dir).await?;
        let output = expected_output(input, output_dir);
        remove_stale_output(&output).await?;
        let args = self.render_args(input, &output);

        info!(
            program = %self.config.program,
            input = %input.display(),
            output = %output.display(),
            "[NORMALIZE] Converting to PDF"
        );

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                error!(error = ?source, program = %self.config.program, "[NORMALIZE] Failed to launch converter");
                ConversionError::Spawn {
                    program: self.config.program.clone(),
                    source,
                }
            })?;

        let result = match tokio::time::timeout(self.timeout(), child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                error!(timeout = ?self.timeout(), input = %input.display(), "[NORMALIZE] Converter timed out");
                return Err(ConversionError::Timeout(self.timeout()));
            }
        };

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if !result.status.success() {
            error!(
                code = ?result.status.code(),
                stderr = %stderr,
                "[NORMALIZE] Converter exited with non-zero status"
            );
            return Err(ConversionError::NonZeroExit {
                code: result.status.code(),
                stderr,
            });
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            error!(path = %output.display(), stderr = %stderr, "[NORMALIZE] Converter did not create output file");
            return Err(ConversionError::MissingOutput {
                path: output,
                stderr,
            });
        }

        info!(output = %output.display(), "[NORMALIZE] Normalized copy written");
        Ok(output)
    }
}

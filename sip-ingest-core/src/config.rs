use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// How the per-file notification status is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// COMPLETED iff normalization succeeded; upload and registration failures are only logged.
    #[default]
    NormalizationOnly,
    /// COMPLETED iff normalization, every upload and registration succeeded.
    /// A failed original upload also skips registration.
    AllSteps,
}

/// Fixed locations and names the transfer orchestrator works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Each transfer is staged under `staging_root/<transferId>`.
    pub staging_root: PathBuf,
    pub normalized_dir: PathBuf,
    /// Namespace used when a task message carries no `ra`.
    pub default_ra: String,
    pub originals_bucket: String,
    pub preservation_bucket: String,
    pub status_policy: StatusPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from("/app/sip-staging"),
            normalized_dir: PathBuf::from("/app/normalized-output"),
            default_ra: "sem-ra".to_string(),
            originals_bucket: "originals".to_string(),
            preservation_bucket: "preservation".to_string(),
            status_policy: StatusPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            staging_root = %self.staging_root.display(),
            normalized_dir = %self.normalized_dir.display(),
            status_policy = ?self.status_policy,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}

/// External conversion command. `{input}` and `{output}` in `args` are
/// replaced by the staged file and the expected PDF path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "unoconv".to_string(),
            args: ["-f", "pdf", "-o", "{output}", "{input}"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 120,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `load_config` module: loads the worker's YAML configuration and applies environment overrides.
///
/// This module is the only place where untrusted YAML is parsed and mapped to the typed
/// configuration handed to every component at startup.
///
/// # Responsibilities
/// - Parse the YAML file into [`AppConfig`]; every section and field has a default, so a
///   partial file (or no file at all) is valid
/// - Apply environment overrides: `KAFKA_BROKER` replaces `broker.address`
/// - Produce clear diagnostics for unreadable or malformed files
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use serde::Deserialize;
use sip_ingest_core::config::{ConverterConfig, PipelineConfig};
use sip_ingest_core::retry::RetryPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Environment variable selecting the message-broker address.
pub const BROKER_ENV: &str = "KAFKA_BROKER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub pipeline: PipelineConfig,
    pub converter: ConverterConfig,
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    #[default]
    Earliest,
    Latest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub address: String,
    pub topic: String,
    pub partition: i32,
    /// Where to start when no offset file records a position.
    pub start_offset: StartOffset,
    /// Persists the next offset to consume after each acknowledged message.
    pub offset_file: Option<PathBuf>,
    pub max_wait_ms: i32,
    pub connect_retry: RetryPolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: "kafka:29092".to_string(),
            topic: "ingest-requests".to_string(),
            partition: 0,
            start_offset: StartOffset::default(),
            offset_file: None,
            max_wait_ms: 1_000,
            connect_retry: RetryPolicy::fixed(Duration::from_secs(10), None),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub storage_url: String,
    pub registry_url: String,
    pub notify_url: String,
    pub storage_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Applied to every outbound service call.
    pub retry: RetryPolicy,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            storage_url: "http://storage_app:3003/storage/upload".to_string(),
            registry_url: "http://gestao_dados_app:8000/aips/".to_string(),
            notify_url: "http://mapoteca_app:3000/internal/processing-complete".to_string(),
            storage_timeout_secs: 30,
            request_timeout_secs: 15,
            retry: RetryPolicy::exponential(
                Duration::from_millis(500),
                Duration::from_secs(5),
                Some(3),
            ),
        }
    }
}

impl AppConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var(BROKER_ENV) {
            if !address.trim().is_empty() {
                info!(broker = %address, "Broker address overridden from {BROKER_ENV}");
                self.broker.address = address;
            }
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            broker = %self.broker.address,
            topic = %self.broker.topic,
            converter = %self.converter.program,
            "Loaded AppConfig"
        );
        self.pipeline.trace_loaded();
    }
}

/// Loads the YAML config at `path` and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty document deserializes to unit, not to an empty mapping.
    let mut config: AppConfig = if config_content.trim().is_empty() {
        AppConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Like [`load_config`], falling back to built-in defaults when no path is given.
pub fn load_config_or_default(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using built-in defaults");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

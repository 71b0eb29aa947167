///
/// This module implements the CLI interface for sip-ingest: command parsing, wiring of the
/// HTTP and broker implementations into the core pipeline, and user-visible invocations.
///
/// All pipeline logic (sanitizing, hashing, normalization, orchestration) lives in the
/// [`sip-ingest-core`] crate. This module is strictly glue.
///
/// ## Commands
/// - `consume`: connect to the broker (with backoff) and process tasks until interrupted
/// - `process`: run a single transfer directly, e.g. to replay one by hand
///
/// For programmatic/integration use, call [`run`] with a constructed [`Cli`].
///
/// [`sip-ingest-core`]: ../../sip_ingest_core/
use crate::kafka::KafkaFeed;
use crate::load_config::{load_config_or_default, AppConfig};
use crate::notify::NotifyClient;
use crate::registry::RegistryClient;
use crate::upload::StorageClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sip_ingest_core::normalize::CommandNormalizer;
use sip_ingest_core::pipeline::{Capabilities, TransferProcessor, TransferReport};
use sip_ingest_core::retry::{connect_with_backoff, Retrying};
use sip_ingest_core::task::{validate_transfer_id, TransferTask};
use sip_ingest_core::worker::Worker;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

/// CLI for sip-ingest: process deposited submission packages into preservation storage.
#[derive(Parser)]
#[clap(
    name = "sip-ingest",
    version,
    about = "Sanitize, identify, normalize, store and register deposited transfer files"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume transfer tasks from the broker until interrupted
    Consume {
        /// Path to the YAML config file (built-in defaults when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Process a single staged transfer and print its report
    Process {
        /// Path to the YAML config file (built-in defaults when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
        /// Staging directory name of the transfer
        #[clap(long)]
        transfer_id: String,
        /// Storage namespace; defaults to the configured default RA
        #[clap(long)]
        ra: Option<String>,
    },
}

/// Wires the HTTP clients and the command normalizer into a transfer processor.
pub fn build_processor(config: &AppConfig) -> Result<TransferProcessor> {
    let services = &config.services;
    let storage = StorageClient::new(
        services.storage_url.clone(),
        Duration::from_secs(services.storage_timeout_secs),
    )
    .context("building storage client")?;
    let registry = RegistryClient::new(
        services.registry_url.clone(),
        Duration::from_secs(services.request_timeout_secs),
    )
    .context("building registry client")?;
    let notifier = NotifyClient::new(
        services.notify_url.clone(),
        Duration::from_secs(services.request_timeout_secs),
    )
    .context("building notification client")?;

    let caps = Capabilities {
        normalizer: Box::new(CommandNormalizer::new(config.converter.clone())),
        store: Box::new(Retrying::new(storage, services.retry.clone())),
        registrar: Box::new(Retrying::new(registry, services.retry.clone())),
        notifier: Box::new(Retrying::new(notifier, services.retry.clone())),
    };
    Ok(TransferProcessor::new(config.pipeline.clone(), caps))
}

fn print_report(report: &TransferReport) {
    if !report.staged {
        println!("Transfer {}: no staging directory, nothing to do.", report.transfer_id);
        return;
    }
    println!(
        "Transfer {} (ra {}): {} file(s)",
        report.transfer_id,
        report.ra,
        report.files.len()
    );
    for file in &report.files {
        println!(
            "  {} -> {}: state={:?} status={:?} format={:?}",
            file.original_name, file.sanitized_name, file.state, file.status, file.format_tag
        );
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Consume { config } => {
            let config = load_config_or_default(config.as_deref())?;
            config.trace_loaded();
            // Broker hiccups after startup are retried like the initial connection.
            let worker = Worker::new(build_processor(&config)?)
                .with_feed_retry(config.broker.connect_retry.clone());

            let mut feed = connect_with_backoff(&config.broker.connect_retry, "kafka", || {
                KafkaFeed::connect(&config.broker)
            })
            .await
            .map_err(|e| anyhow::anyhow!("Could not connect to broker: {e}"))?;

            let (stop, mut shutdown) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!(command = "consume", "Interrupted, finishing current task");
                    let _ = stop.send(true);
                }
            });

            tracing::info!(command = "consume", "Consuming transfer tasks");
            let handled = worker
                .consume(&mut feed, &mut shutdown)
                .await
                .map_err(|e| anyhow::anyhow!("Task feed failed: {e}"))?;
            tracing::info!(command = "consume", handled, "Consumer stopped");
            Ok(())
        }
        Commands::Process {
            config,
            transfer_id,
            ra,
        } => {
            let config = load_config_or_default(config.as_deref())?;
            validate_transfer_id(&transfer_id)?;
            let ra = ra.unwrap_or_else(|| config.pipeline.default_ra.clone());
            let processor = build_processor(&config)?;

            tracing::info!(command = "process", transfer_id = %transfer_id, "Processing single transfer");
            let report = processor
                .process_transfer(&TransferTask::new(transfer_id, ra))
                .await?;
            print_report(&report);
            Ok(())
        }
    }
}

//! Kafka-backed [`TaskFeed`]: reads task messages from one partition of the task topic.
//!
//! Consumer groups are not used. The position is tracked locally: it starts from the
//! offset recorded in the optional offset file, or from the configured earliest/latest
//! offset, and the file is rewritten after every acknowledged message so a restart
//! resumes after the last consumed task. If the position has been removed by retention,
//! the feed jumps to the configured earliest/latest offset instead of failing.

use async_trait::async_trait;
use rskafka::client::error::{Error as ClientError, ProtocolError};
use rskafka::client::partition::{OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use sip_ingest_core::contract::TaskFeed;
use sip_ingest_core::error::FeedError;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::load_config::{BrokerConfig, StartOffset};

/// Largest record batch requested per fetch.
const MAX_FETCH_BYTES: i32 = 1_000_000;

/// File holding the next offset to consume.
#[derive(Debug, Clone)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no offset has been recorded yet.
    pub async fn load(&self) -> Result<Option<i64>, FeedError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw.trim().parse::<i64>().map(Some).map_err(|e| {
                FeedError::Commit(format!("corrupt offset file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FeedError::Commit(format!(
                "failed to read offset file {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Writes through a temporary file so a crash never leaves a truncated offset.
    pub async fn save(&self, next_offset: i64) -> Result<(), FeedError> {
        let tmp = self.path.with_extension("tmp");
        let to_err = |e: std::io::Error| FeedError::Commit(format!("{}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(to_err)?;
        }
        tokio::fs::write(&tmp, next_offset.to_string())
            .await
            .map_err(to_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(to_err)
    }
}

pub struct KafkaFeed {
    partition: PartitionClient,
    fetch_offset: i64,
    pending: VecDeque<(i64, Vec<u8>)>,
    in_flight: Option<i64>,
    max_wait_ms: i32,
    start_offset: StartOffset,
    offsets: Option<OffsetStore>,
}

fn offset_at(start: StartOffset) -> OffsetAt {
    match start {
        StartOffset::Earliest => OffsetAt::Earliest,
        StartOffset::Latest => OffsetAt::Latest,
    }
}

impl KafkaFeed {
    pub async fn connect(config: &BrokerConfig) -> Result<Self, FeedError> {
        info!(broker = %config.address, topic = %config.topic, partition = config.partition, "Connecting to Kafka");
        let client = ClientBuilder::new(vec![config.address.clone()])
            .build()
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        let partition = client
            .partition_client(
                config.topic.clone(),
                config.partition,
                UnknownTopicHandling::Error,
            )
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        let offsets = config.offset_file.clone().map(OffsetStore::new);
        let stored = match &offsets {
            Some(store) => store.load().await?,
            None => None,
        };
        let fetch_offset = match stored {
            Some(offset) => {
                info!(offset, "Resuming from recorded offset");
                offset
            }
            None => {
                partition
                    .get_offset(offset_at(config.start_offset))
                    .await
                    .map_err(|e| FeedError::Connect(e.to_string()))?
            }
        };

        info!(offset = fetch_offset, "Connected to Kafka, waiting for tasks");
        Ok(Self {
            partition,
            fetch_offset,
            pending: VecDeque::new(),
            in_flight: None,
            max_wait_ms: config.max_wait_ms,
            start_offset: config.start_offset,
            offsets,
        })
    }
}

#[async_trait]
impl TaskFeed for KafkaFeed {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, FeedError> {
        loop {
            if let Some((offset, value)) = self.pending.pop_front() {
                self.in_flight = Some(offset);
                return Ok(Some(value));
            }

            let fetched = self
                .partition
                .fetch_records(self.fetch_offset, 1..MAX_FETCH_BYTES, self.max_wait_ms)
                .await;
            let (records, high_watermark) = match fetched {
                Ok(fetched) => fetched,
                Err(ClientError::ServerError {
                    protocol_error: ProtocolError::OffsetOutOfRange,
                    ..
                }) => {
                    let reset = self
                        .partition
                        .get_offset(offset_at(self.start_offset))
                        .await
                        .map_err(|e| FeedError::Fetch(e.to_string()))?;
                    warn!(stale = self.fetch_offset, reset, "Offset out of range, resetting position");
                    self.fetch_offset = reset;
                    continue;
                }
                Err(e) => return Err(FeedError::Fetch(e.to_string())),
            };
            debug!(fetched = records.len(), high_watermark, offset = self.fetch_offset, "Fetched records");

            for record in records {
                // Compressed batches may start before the requested offset.
                if record.offset < self.fetch_offset {
                    continue;
                }
                self.fetch_offset = record.offset + 1;
                match record.record.value {
                    Some(value) => self.pending.push_back((record.offset, value)),
                    None => debug!(offset = record.offset, "Skipping record without value"),
                }
            }
        }
    }

    async fn acknowledge(&mut self) -> Result<(), FeedError> {
        let Some(offset) = self.in_flight.take() else {
            return Ok(());
        };
        if let Some(store) = &self.offsets {
            store.save(offset + 1).await?;
        }
        debug!(offset, "Acknowledged task message");
        Ok(())
    }
}

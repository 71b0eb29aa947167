//! Single sequential consumer: takes one task message at a time from a [`TaskFeed`],
//! decodes it and runs the whole transfer before asking for the next message.
//!
//! Decode failures and transfer-level errors are logged once here and the message is
//! still acknowledged: a task is consumed exactly once whatever its outcome.
//!
//! Feed errors are retried under the worker's feed [`RetryPolicy`]. A shutdown request
//! is only honoured between messages; a transfer that has started always runs to the
//! end and is acknowledged.

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::contract::TaskFeed;
use crate::error::FeedError;
use crate::pipeline::{TransferProcessor, TransferReport};
use crate::retry::RetryPolicy;
use crate::task::TransferTask;

pub struct Worker {
    processor: TransferProcessor,
    feed_retry: RetryPolicy,
}

impl Worker {
    /// Feed errors are not retried until [`Worker::with_feed_retry`] says otherwise.
    pub fn new(processor: TransferProcessor) -> Self {
        Self {
            processor,
            feed_retry: RetryPolicy::none(),
        }
    }

    pub fn with_feed_retry(mut self, policy: RetryPolicy) -> Self {
        self.feed_retry = policy;
        self
    }

    pub fn processor(&self) -> &TransferProcessor {
        &self.processor
    }

    /// Handles one raw message. Returns the report when the task was decoded and its
    /// transfer processed; `None` when the message was dropped.
    pub async fn handle_message(&self, payload: &[u8]) -> Option<TransferReport> {
        let task = match TransferTask::decode(payload, &self.processor.config().default_ra) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "[WORKER] Dropping undecodable task message");
                return None;
            }
        };

        info!(transfer_id = %task.transfer_id, ra = %task.ra, "[WORKER] New task received");
        match self.processor.process_transfer(&task).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, transfer_id = %task.transfer_id, "[WORKER] Unexpected failure processing transfer");
                None
            }
        }
    }

    /// Consumes messages until the feed is exhausted or `shutdown` turns `true`.
    ///
    /// Returns the number of messages handled. Errors only once a feed failure
    /// outlasts the feed retry policy, or when acknowledging fails.
    pub async fn consume<F>(
        &self,
        feed: &mut F,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<u64, FeedError>
    where
        F: TaskFeed + ?Sized,
    {
        let mut handled = 0u64;
        let mut failures = 0u32;
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    info!(handled, "[WORKER] Shutdown requested, stopping between tasks");
                    return Ok(handled);
                }
                next = feed.next_message() => next,
            };

            let payload = match next {
                Ok(Some(payload)) => {
                    failures = 0;
                    payload
                }
                Ok(None) => break,
                Err(e) => {
                    failures += 1;
                    if !self.feed_retry.allows_another(failures) {
                        error!(error = %e, failures, "[WORKER] Task feed failed, giving up");
                        return Err(e);
                    }
                    let delay = self.feed_retry.delay_for(failures);
                    warn!(error = %e, failures, delay = ?delay, "[WORKER] Task feed failed, retrying");
                    tokio::select! {
                        biased;
                        _ = shutdown_requested(shutdown) => {
                            info!(handled, "[WORKER] Shutdown requested while waiting for the feed");
                            return Ok(handled);
                        }
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            self.handle_message(&payload).await;
            feed.acknowledge().await?;
            handled += 1;
        }
        info!(handled, "[WORKER] Task feed exhausted");
        Ok(handled)
    }
}

/// Resolves once shutdown is signalled. A dropped sender never signals.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

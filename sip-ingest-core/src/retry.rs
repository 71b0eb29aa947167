//! Retry policies and the bounded-retry decorator for outbound capabilities.
//!
//! - [`RetryPolicy`] describes a fixed or exponential delay schedule with an optional
//!   attempt ceiling (`None` retries forever).
//! - [`connect_with_backoff`] runs a one-off initialization (e.g. the broker
//!   connection) under a policy before steady-state processing starts.
//! - [`Retrying`] wraps any [`ObjectStore`], [`MetadataRegistrar`] or
//!   [`CompletionNotifier`] and retries only errors classified as transient by
//!   [`CapabilityError::is_transient`]. Call sites are unchanged.

use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::contract::{
    ArchivalPayload, CompletionNotifier, MetadataRegistrar, ObjectStore, ProcessingOutcome,
    UploadAck,
};
use crate::error::CapabilityError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    /// Doubles from `initial_ms` up to `max_ms`.
    Exponential { initial_ms: u64, max_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    /// Total attempts including the first one. `None` means unbounded.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            backoff: Backoff::Fixed {
                delay_ms: delay.as_millis() as u64,
            },
            max_attempts,
        }
    }

    pub fn exponential(initial: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            backoff: Backoff::Exponential {
                initial_ms: initial.as_millis() as u64,
                max_ms: max.as_millis() as u64,
            },
            max_attempts,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO, Some(1))
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { initial_ms, max_ms } => {
                let shift = retry.saturating_sub(1).min(32);
                let ms = initial_ms.saturating_mul(1u64 << shift).min(max_ms);
                Duration::from_millis(ms)
            }
        }
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn allows_another(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

/// Runs `connect` until it succeeds or the policy gives up, returning the last error.
pub async fn connect_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut connect: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match connect().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.allows_another(attempts) => {
                let delay = policy.delay_for(attempts);
                warn!(target_name = what, attempt = attempts, error = %e, delay = ?delay, "[CONNECT] Unavailable, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(target_name = what, attempts, error = %e, "[CONNECT] Giving up");
                return Err(e);
            }
        }
    }
}

async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && policy.allows_another(attempts) => {
                let delay = policy.delay_for(attempts);
                warn!(operation, attempt = attempts, error = %e, delay = ?delay, "[RETRY] Transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Bounded-retry decorator around a capability.
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> Retrying<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ObjectStore> ObjectStore for Retrying<C> {
    async fn upload(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<UploadAck, CapabilityError> {
        retry_transient(&self.policy, "upload", || self.inner.upload(path, bucket, key)).await
    }
}

#[async_trait]
impl<C: MetadataRegistrar> MetadataRegistrar for Retrying<C> {
    async fn register(&self, payload: &ArchivalPayload) -> Result<(), CapabilityError> {
        retry_transient(&self.policy, "register", || self.inner.register(payload)).await
    }
}

#[async_trait]
impl<C: CompletionNotifier> CompletionNotifier for Retrying<C> {
    async fn notify(&self, outcome: &ProcessingOutcome) -> Result<(), CapabilityError> {
        retry_transient(&self.policy, "notify", || self.inner.notify(outcome)).await
    }
}

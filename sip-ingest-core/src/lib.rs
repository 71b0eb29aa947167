#![doc = "sip-ingest-core: per-transfer file-processing pipeline for SIP ingestion."]

//! This crate contains the pipeline logic, data models and capability contracts.
//! Network clients and the message broker live in the `sip-ingest` binary crate.
//!
//! # Modules
//! - [`sanitize`], [`checksum`], [`format`]: pure per-file identity steps
//! - [`normalize`]: external-command conversion to PDF
//! - [`pipeline`]: the per-transfer orchestrator
//! - [`worker`]: sequential consumption of task messages
//! - [`retry`]: backoff policies and the retrying capability decorator

pub mod checksum;
pub mod config;
pub mod contract;
pub mod error;
pub mod format;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod sanitize;
pub mod task;
pub mod worker;

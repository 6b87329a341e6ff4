//! Collects finished Tripo3D models into object storage.
//!
//! A harvesting pass lists the `daily_models` rows that are still waiting for
//! a model, asks the Tripo3D API whether each row's task has finished,
//! downloads finished models to a staging directory, uploads them to an
//! S3-compatible bucket and marks the row completed.
//!
//! ## Features
//! - Typed access to the Tripo task API and the D1 query endpoint.
//! - Parameterized SQL only.
//! - S3 (R2) uploads or the `wrangler` CLI, chosen by configuration.
//! - Per-item outcomes collected into a [`RunSummary`].

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod records;
pub mod storage;
pub mod types;

pub use client::{TripoClient, DOWNLOAD_CHUNK_SIZE};
pub use config::{Config, D1Config, S3Config, StorageConfig, WranglerConfig};
pub use error::HarvestError;
pub use pipeline::{Harvester, ItemOutcome, RunSummary};
pub use records::{D1Client, RecordStore, PENDING_STATUSES};
pub use storage::{ObjectStore, S3Store, WranglerStore, MODEL_CONTENT_TYPE};
pub use types::{PendingRow, TaskOutput, TaskState, TaskStatus, WorkItem};

//! `kvdex` Engine: denormalized multi-index data access over a key-value store.
//!
//! Layers, leaf first:
//!
//! - [`client`]: the [`StoreClient`](client::StoreClient) seam and the in-process [`MemoryStore`](client::MemoryStore)
//! - [`storage`]: per-type record CRUD
//! - [`index`]: relationship lists, partition sets, rankings, time series
//! - [`batch`] and [`loader`]: bounded batched bulk loading with in-memory aggregates
//! - [`consistency`]: schema-driven index maintenance for create, transition and delete
//! - [`domain`]: the commerce and telemetry schemas built on the above

pub mod batch;
pub mod client;
pub mod config;
pub mod consistency;
pub mod domain;
pub mod error;
pub mod index;
pub mod loader;
pub mod logging;
pub mod storage;

pub use batch::{Batch, BatchStats};
pub use client::{MemoryStore, StoreClient, WriteOp};
pub use config::{LoaderConfig, TelemetryConfig};
pub use consistency::{CategoryChange, EntityError, EntityIndex, EntitySchema, Snapshot};
pub use error::{StoreError, StoreResult};
pub use loader::{BatchLoader, EntityRows, LoadError, LoadReport, Row, RowError, RowHandler};

//! Concrete schemas built on the core: commerce orders and sensor telemetry.
//!
//! Each domain bundles its [`EntitySchema`](crate::consistency::EntitySchema)s,
//! the [`RowHandler`](crate::loader::RowHandler)s that import its JSON Lines
//! files, and a service type with the CRUD and analytical queries.

pub mod commerce;
pub mod telemetry;

use std::path::Path;

use crate::consistency::EntityError;
use crate::error::StoreError;
use crate::loader::{JsonLinesSource, LoadError};

pub use commerce::Commerce;
pub use telemetry::Telemetry;

/// Errors from domain services.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Opens `{dir}/{file}`, `None` when it does not exist.
fn open_source(dir: &Path, file: &str) -> Result<Option<JsonLinesSource>, LoadError> {
    JsonLinesSource::open(dir.join(file))
}

//! Bulk loading: rows in, batched writes out.
//!
//! A load step streams [`Row`]s from a source, hands each to a
//! [`RowHandler`] (after letting it read whatever it needs from the store in
//! [`RowHandler::prepare`]) that turns it into [`WriteOp`]s (or rejects it with a
//! [`RowError`]), and submits the ops through a bounded [`Batch`]. Once the
//! stream ends the handler publishes its accumulated aggregates from
//! [`RowHandler::finish`] into a second batch.
//!
//! Malformed rows are skipped and counted per reason; they never abort a
//! step. A missing source yields a [`LoadReport`] marked `missing`. Store
//! failures abort the step.

pub mod accumulate;
pub mod entity;
pub mod source;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use kvdex_core::CodecError;

use crate::batch::{Batch, BatchStats};
use crate::client::{StoreClient, WriteOp};
use crate::config::LoaderConfig;
use crate::error::StoreError;

pub use accumulate::{Averages, Latest, Tally};
pub use entity::{EntityRows, RowMapper};
pub use source::JsonLinesSource;

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One input row: column name to raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Raw value of a column, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Trimmed, non-empty value of a column.
    ///
    /// # Errors
    ///
    /// [`RowError::MissingField`] when the column is absent or blank.
    pub fn required(&self, name: &str) -> Result<&str, RowError> {
        match self.get(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(RowError::MissingField(name.to_string())),
        }
    }

    /// Required column parsed as `T`.
    ///
    /// # Errors
    ///
    /// [`RowError::MissingField`] or [`RowError::Unparsable`].
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, RowError> {
        let value = self.required(name)?;
        value.parse().map_err(|_| RowError::Unparsable {
            field: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Optional column parsed as `T`; absent or blank is `None`.
    ///
    /// # Errors
    ///
    /// [`RowError::Unparsable`] when a value is present but does not parse.
    pub fn optional<T: FromStr>(&self, name: &str) -> Result<Option<T>, RowError> {
        match self.get(name).map(str::trim) {
            Some(value) if !value.is_empty() => self.parse(name).map(Some),
            _ => Ok(None),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single row was rejected. Rejected rows are skipped, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("field `{field}` has unparsable value `{value}`")]
    Unparsable { field: String, value: String },
    #[error("field `{field}` value {value} outside {min}..={max}")]
    OutOfDomain {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("malformed row: {0}")]
    Malformed(String),
}

impl RowError {
    /// Short label used to count skips per reason.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::Unparsable { .. } => "unparsable",
            Self::OutOfDomain { .. } => "out_of_domain",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Checks `min <= value <= max`.
    ///
    /// # Errors
    ///
    /// [`RowError::OutOfDomain`] when the value falls outside the range.
    pub fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<f64, Self> {
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Self::OutOfDomain {
                field: field.to_string(),
                value,
                min,
                max,
            })
        }
    }
}

impl From<CodecError> for RowError {
    fn from(err: CodecError) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Failure that aborts a load step.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// RowHandler
// ---------------------------------------------------------------------------

/// Turns rows of one source into writes.
///
/// `handle` must either push every op for the row or reject it; ops pushed
/// before an error are discarded by the loader.
#[async_trait]
pub trait RowHandler: Send {
    /// Reads state the next [`handle`](Self::handle) depends on. Runs for
    /// every well-formed row, including rows `handle` then rejects.
    ///
    /// # Errors
    ///
    /// A failure here aborts the step.
    async fn prepare(&mut self, row: &Row) -> Result<(), LoadError> {
        let _ = row;
        Ok(())
    }

    /// # Errors
    ///
    /// A [`RowError`] skips the row.
    fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError>;

    /// Publishes aggregates once every row has been handled.
    ///
    /// # Errors
    ///
    /// A failure here aborts the step.
    fn finish(&mut self, ops: &mut Vec<WriteOp>) -> Result<(), LoadError> {
        let _ = ops;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LoadReport
// ---------------------------------------------------------------------------

/// Outcome of one load step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub step: String,
    /// Rows accepted by the handler.
    pub loaded: usize,
    /// Skipped rows per [`RowError::reason`].
    pub skipped: BTreeMap<&'static str, usize>,
    /// The source did not exist; nothing was loaded.
    pub missing: bool,
    pub stats: BatchStats,
}

impl LoadReport {
    fn new(step: &str) -> Self {
        Self {
            step: step.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

// ---------------------------------------------------------------------------
// BatchLoader
// ---------------------------------------------------------------------------

/// Runs load steps against one store.
#[derive(Clone)]
pub struct BatchLoader {
    client: Arc<dyn StoreClient>,
    config: LoaderConfig,
}

impl BatchLoader {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>, config: LoaderConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    /// Runs one step.
    ///
    /// # Errors
    ///
    /// Store failures and errors from [`RowHandler::prepare`] or
    /// [`RowHandler::finish`] abort the step.
    /// Writes committed before the failure stay applied.
    pub async fn load<S, H>(
        &self,
        step: &str,
        source: Option<S>,
        handler: &mut H,
    ) -> Result<LoadReport, LoadError>
    where
        S: IntoIterator<Item = Result<Row, RowError>>,
        H: RowHandler + ?Sized,
    {
        let mut report = LoadReport::new(step);
        let Some(source) = source else {
            tracing::warn!(step, "source missing, step skipped");
            report.missing = true;
            return Ok(report);
        };

        let mut batch = Batch::start(Arc::clone(&self.client), self.config.batch_threshold);
        let mut ops = Vec::new();
        for (index, row) in source.into_iter().enumerate() {
            let outcome = match row {
                Ok(row) => {
                    handler.prepare(&row).await?;
                    handler.handle(&row, &mut ops)
                }
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => {
                    report.loaded += 1;
                    batch.extend(std::mem::take(&mut ops)).await?;
                }
                Err(err) => {
                    ops.clear();
                    tracing::debug!(step, row = index + 1, reason = err.reason(), %err, "row skipped");
                    *report.skipped.entry(err.reason()).or_insert(0) += 1;
                }
            }
        }
        let mut stats = batch.finish().await?;

        handler.finish(&mut ops)?;
        let mut finalize = Batch::start(Arc::clone(&self.client), self.config.batch_threshold);
        finalize.extend(ops).await?;
        stats += finalize.finish().await?;
        report.stats = stats;

        metrics::counter!("kvdex_rows_loaded_total", "step" => step.to_string())
            .increment(report.loaded as u64);
        metrics::counter!("kvdex_rows_skipped_total", "step" => step.to_string())
            .increment(report.skipped_total() as u64);
        tracing::info!(
            step,
            loaded = report.loaded,
            skipped = report.skipped_total(),
            ops = report.stats.ops,
            commits = report.stats.commits,
            "load step finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;

    /// Adds each row's `id` to `thing:all` and publishes a count ranking.
    #[derive(Default)]
    struct CountingHandler {
        totals: Tally,
    }

    impl RowHandler for CountingHandler {
        fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError> {
            let id = row.required("id")?;
            let weight: f64 = row.parse("weight")?;
            ops.push(WriteOp::SetAdd {
                key: "thing:all".to_string(),
                member: id.to_string(),
            });
            self.totals.add(id, weight);
            Ok(())
        }

        fn finish(&mut self, ops: &mut Vec<WriteOp>) -> Result<(), LoadError> {
            for (id, total) in self.totals.finalize() {
                ops.push(WriteOp::RankedAdd {
                    key: "thing:weight".to_string(),
                    member: id,
                    score: total,
                });
            }
            Ok(())
        }
    }

    fn rows() -> Vec<Result<Row, RowError>> {
        vec![
            Ok(Row::new().with("id", "a").with("weight", "2")),
            Ok(Row::new().with("id", "b").with("weight", "oops")),
            Ok(Row::new().with("weight", "1")),
            Err(RowError::Malformed("line 4: eof".to_string())),
            Ok(Row::new().with("id", "a").with("weight", "3")),
        ]
    }

    fn make_loader(store: &Arc<MemoryStore>, threshold: usize) -> BatchLoader {
        BatchLoader::new(
            store.clone(),
            LoaderConfig {
                batch_threshold: threshold,
                ..LoaderConfig::default()
            },
        )
    }

    #[test]
    fn row_accessors() {
        let row = Row::new().with("price", " 12.5 ").with("blank", "  ");
        assert_eq!(row.parse::<f64>("price").unwrap(), 12.5);
        assert_eq!(row.required("blank"), Err(RowError::MissingField("blank".to_string())));
        assert_eq!(row.optional::<f64>("blank").unwrap(), None);
        assert!(matches!(
            row.optional::<u32>("price"),
            Err(RowError::Unparsable { .. })
        ));
    }

    #[test]
    fn check_range_is_inclusive() {
        assert!(RowError::check_range("humidity", 100.0, 0.0, 100.0).is_ok());
        let err = RowError::check_range("humidity", 100.5, 0.0, 100.0).unwrap_err();
        assert_eq!(err.reason(), "out_of_domain");
    }

    #[tokio::test]
    async fn load_counts_skips_per_reason_and_publishes_aggregates() {
        let store = Arc::new(MemoryStore::new());
        let loader = make_loader(&store, 1);
        let mut handler = CountingHandler::default();

        let report = loader.load("things", Some(rows()), &mut handler).await.unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped_total(), 3);
        assert_eq!(report.skipped.get("unparsable"), Some(&1));
        assert_eq!(report.skipped.get("missing_field"), Some(&1));
        assert_eq!(report.skipped.get("malformed"), Some(&1));
        assert!(!report.missing);
        assert_eq!(report.stats.ops, 3);

        assert_eq!(store.set_len("thing:all").await.unwrap(), 1);
        assert_eq!(store.ranked_score("thing:weight", "a").await.unwrap(), Some(5.0));
    }

    #[tokio::test]
    async fn reloading_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let loader = make_loader(&store, 5_000);

        for _ in 0..2 {
            let mut handler = CountingHandler::default();
            loader.load("things", Some(rows()), &mut handler).await.unwrap();
        }

        assert_eq!(store.set_len("thing:all").await.unwrap(), 1);
        assert_eq!(store.ranked_score("thing:weight", "a").await.unwrap(), Some(5.0));
    }

    #[tokio::test]
    async fn missing_source_is_reported_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let loader = make_loader(&store, 10);
        let mut handler = CountingHandler::default();

        let report = loader
            .load::<Vec<Result<Row, RowError>>, _>("things", None, &mut handler)
            .await
            .unwrap();

        assert!(report.missing);
        assert_eq!(report.loaded, 0);
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn store_outage_aborts_step() {
        let store = Arc::new(MemoryStore::new());
        store.disconnect("down");
        let loader = make_loader(&store, 1);
        let mut handler = CountingHandler::default();

        let err = loader.load("things", Some(rows()), &mut handler).await.unwrap_err();
        assert!(matches!(err, LoadError::Store(ref e) if e.is_unavailable()));
    }
}

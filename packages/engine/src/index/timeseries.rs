//! Time-series mode of the ranked set: one entry per event.
//!
//! Each event is a typed value object encoded through [`kvdex_core::codec`]
//! and stored as a ranked-set member scored by its epoch-seconds timestamp.
//! Recording the same payload twice keeps a single entry, so reloading a
//! history is idempotent.

use std::marker::PhantomData;
use std::sync::Arc;

use kvdex_core::{codec, CodecError, RankOrder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreResult;

/// Typed view over time-scored ranked sets holding payloads of type `T`.
pub struct TimeSeries<T> {
    client: Arc<dyn StoreClient>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for TimeSeries<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            _payload: PhantomData,
        }
    }
}

impl<T> TimeSeries<T>
where
    T: Serialize + DeserializeOwned,
{
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self {
            client,
            _payload: PhantomData,
        }
    }

    /// Records one event at `timestamp` (epoch seconds).
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be encoded or the store rejects the write.
    pub async fn record(&self, key: &str, payload: &T, timestamp: f64) -> StoreResult<()> {
        let member = codec::encode(payload)?;
        self.client.ranked_add(key, &member, timestamp).await?;
        Ok(())
    }

    /// Events with `from <= timestamp <= to`, oldest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Fails on store errors or if a stored member does not decode as `T`.
    pub async fn between(
        &self,
        key: &str,
        from: f64,
        to: f64,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(T, f64)>> {
        let entries = self
            .client
            .ranked_range_by_score(key, from, to, 0, limit)
            .await?;
        entries
            .into_iter()
            .map(|entry| Ok((codec::decode(&entry.id)?, entry.score)))
            .collect()
    }

    /// The `n` newest events, newest first.
    ///
    /// # Errors
    ///
    /// Fails on store errors or if a stored member does not decode as `T`.
    pub async fn recent(&self, key: &str, n: usize) -> StoreResult<Vec<(T, f64)>> {
        let Some(stop) = n.checked_sub(1).and_then(|s| i64::try_from(s).ok()) else {
            return Ok(Vec::new());
        };
        let entries = self
            .client
            .ranked_range(key, 0, stop, RankOrder::Descending)
            .await?;
        entries
            .into_iter()
            .map(|entry| Ok((codec::decode(&entry.id)?, entry.score)))
            .collect()
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn count(&self, key: &str) -> StoreResult<usize> {
        self.client.ranked_len(key).await
    }

    /// Drops every event at or before `timestamp`. Returns how many went.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn prune_before(&self, key: &str, timestamp: f64) -> StoreResult<usize> {
        self.client
            .ranked_remove_by_score(key, f64::NEG_INFINITY, timestamp)
            .await
    }

    /// Queued form of [`record`](Self::record).
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be encoded.
    pub fn record_op(&self, key: &str, payload: &T, timestamp: f64) -> Result<WriteOp, CodecError> {
        Ok(WriteOp::RankedAdd {
            key: key.to_string(),
            member: codec::encode(payload)?,
            score: timestamp,
        })
    }
}

//! Score-ordered leaderboards (e.g. `product:sales`, `sensor:avg:temperature`).

use std::sync::Arc;

use kvdex_core::{RankOrder, ScoredEntry};

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreResult;

/// Named collections mapping an id to a numeric score, one entry per id.
///
/// Equal scores are ordered by id; descending reads are the exact reverse of
/// ascending reads. Cross-entity snapshots are not consistent under
/// concurrent writers.
#[derive(Clone)]
pub struct RankingIndex {
    client: Arc<dyn StoreClient>,
}

fn k_to_stop(k: usize) -> Option<i64> {
    if k == 0 {
        return None;
    }
    i64::try_from(k - 1).ok()
}

impl RankingIndex {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self { client }
    }

    /// Inserts or overwrites the score of `id`.
    ///
    /// # Errors
    ///
    /// Fails with `NotANumber` for NaN scores, or on store failure.
    pub async fn set_score(&self, collection: &str, id: &str, score: f64) -> StoreResult<()> {
        self.client.ranked_add(collection, id, score).await?;
        Ok(())
    }

    /// Adds `delta` to the score of `id` and returns the new score.
    ///
    /// Not idempotent: reserved for genuine event counters.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn increment_score(&self, collection: &str, id: &str, delta: f64) -> StoreResult<f64> {
        self.client.ranked_incr(collection, id, delta).await
    }

    /// Returns whether `id` was present.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn remove_entry(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.client.ranked_remove(collection, id).await
    }

    /// Entries at ranks `start..=end` (negative ranks count from the end).
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn rank_range(
        &self,
        collection: &str,
        start: i64,
        end: i64,
        order: RankOrder,
    ) -> StoreResult<Vec<ScoredEntry>> {
        self.client.ranked_range(collection, start, end, order).await
    }

    /// Entries with `min <= score <= max`, ascending by score, at most `limit`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn score_range(
        &self,
        collection: &str,
        min: f64,
        max: f64,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ScoredEntry>> {
        self.client
            .ranked_range_by_score(collection, min, max, 0, limit)
            .await
    }

    /// Zero-based rank of `id`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn rank_of(&self, collection: &str, id: &str, order: RankOrder) -> StoreResult<Option<u64>> {
        self.client.ranked_rank(collection, id, order).await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn score_of(&self, collection: &str, id: &str) -> StoreResult<Option<f64>> {
        self.client.ranked_score(collection, id).await
    }

    /// The `k` highest-scored entries, highest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn top(&self, collection: &str, k: usize) -> StoreResult<Vec<ScoredEntry>> {
        match k_to_stop(k) {
            Some(stop) => self.rank_range(collection, 0, stop, RankOrder::Descending).await,
            None => Ok(Vec::new()),
        }
    }

    /// The `k` lowest-scored entries, lowest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn bottom(&self, collection: &str, k: usize) -> StoreResult<Vec<ScoredEntry>> {
        match k_to_stop(k) {
            Some(stop) => self.rank_range(collection, 0, stop, RankOrder::Ascending).await,
            None => Ok(Vec::new()),
        }
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn len(&self, collection: &str) -> StoreResult<usize> {
        self.client.ranked_len(collection).await
    }

    /// Queued form of [`set_score`](Self::set_score).
    #[must_use]
    pub fn set_score_op(&self, collection: &str, id: &str, score: f64) -> WriteOp {
        WriteOp::RankedAdd {
            key: collection.to_string(),
            member: id.to_string(),
            score,
        }
    }

    #[must_use]
    pub fn remove_op(&self, collection: &str, id: &str) -> WriteOp {
        WriteOp::RankedRemove {
            key: collection.to_string(),
            member: id.to_string(),
        }
    }
}

//! Store client trait and the batched write vocabulary.
//!
//! [`StoreClient`] is the seam between this crate and the key-value service.
//! It mirrors what a single-node key-value store offers: scalar values,
//! field-maps (records), lists, sets, and ranked (score-ordered) sets, plus a
//! pipelined write mode ([`StoreClient::execute`]) that submits a vector of
//! [`WriteOp`]s in one round trip.
//!
//! Semantics every implementation must honor:
//! - reading a missing key yields an empty value, never an error;
//! - a collection that becomes empty ceases to exist;
//! - a key holds one kind of value; touching it as another kind fails with
//!   [`StoreError::WrongType`](crate::error::StoreError::WrongType);
//! - each call is atomic on its own; `execute` guarantees ordering only.

mod memory;
mod ranked;

pub use memory::MemoryStore;

use async_trait::async_trait;
use kvdex_core::{Fields, RankOrder, ScoredEntry};

use crate::error::StoreResult;

/// A single write that can be queued in a [`Batch`](crate::batch::Batch).
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Merge fields into a record.
    SetFields { key: String, fields: Fields },
    /// Delete a key of any kind.
    Delete { key: String },
    /// Overwrite a scalar value.
    Set { key: String, value: String },
    /// Add to an integer scalar.
    IncrBy { key: String, delta: i64 },
    /// Insert at the head of a list.
    PushFront { key: String, value: String },
    /// Insert at the tail of a list.
    PushBack { key: String, value: String },
    /// Remove up to `count` occurrences of `value` from the head side (0 = all).
    RemoveFromList { key: String, count: usize, value: String },
    /// Keep only the inclusive range `start..=stop` of a list.
    TrimList { key: String, start: i64, stop: i64 },
    /// Add a member to a set.
    SetAdd { key: String, member: String },
    /// Remove a member from a set.
    SetRemove { key: String, member: String },
    /// Insert or overwrite a ranked-set score.
    RankedAdd { key: String, member: String, score: f64 },
    /// Add to a ranked-set score (inserting at `delta` if absent).
    RankedIncr { key: String, member: String, delta: f64 },
    /// Remove a member from a ranked set.
    RankedRemove { key: String, member: String },
}

impl WriteOp {
    /// The key this operation writes to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::SetFields { key, .. }
            | Self::Delete { key }
            | Self::Set { key, .. }
            | Self::IncrBy { key, .. }
            | Self::PushFront { key, .. }
            | Self::PushBack { key, .. }
            | Self::RemoveFromList { key, .. }
            | Self::TrimList { key, .. }
            | Self::SetAdd { key, .. }
            | Self::SetRemove { key, .. }
            | Self::RankedAdd { key, .. }
            | Self::RankedIncr { key, .. }
            | Self::RankedRemove { key, .. } => key,
        }
    }

    /// Whether applying this operation twice leaves the store as applying it once.
    ///
    /// Increments and list pushes are not; re-running a load that used them
    /// double counts.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        !matches!(
            self,
            Self::IncrBy { .. }
                | Self::RankedIncr { .. }
                | Self::PushFront { .. }
                | Self::PushBack { .. }
        )
    }
}

/// Connection to a key-value service.
///
/// Created once at process start and shared as `Arc<dyn StoreClient>` by every
/// component. Timeouts and reconnects belong to the implementation.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Round-trips to the store. Fails with `Unavailable` if it cannot be reached.
    async fn ping(&self) -> StoreResult<()>;

    // --- Keys and scalars ---

    /// Deletes the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> StoreResult<usize>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Adds `delta` to an integer scalar (missing = 0) and returns the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64>;

    // --- Records ---

    /// Merges `fields` into the record at `key`, creating it if needed.
    async fn set_fields(&self, key: &str, fields: &Fields) -> StoreResult<()>;

    async fn get_field(&self, key: &str, name: &str) -> StoreResult<Option<String>>;

    /// Returns every field of the record; empty when the record is absent.
    async fn get_fields(&self, key: &str) -> StoreResult<Fields>;

    // --- Lists ---

    /// Inserts at the head; returns the new length.
    async fn push_front(&self, key: &str, value: &str) -> StoreResult<usize>;

    /// Inserts at the tail; returns the new length.
    async fn push_back(&self, key: &str, value: &str) -> StoreResult<usize>;

    /// Removes up to `count` occurrences of `value` scanning from the head
    /// (`0` removes all). Returns the number removed.
    async fn remove_from_list(&self, key: &str, count: usize, value: &str) -> StoreResult<usize>;

    /// Inclusive range; negative indices count from the tail (`-1` is the last element).
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    async fn list_len(&self, key: &str) -> StoreResult<usize>;

    /// Keeps only the inclusive range `start..=stop`.
    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()>;

    // --- Sets ---

    /// Returns `true` if the member was newly added.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns `true` if the member was present.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn set_len(&self, key: &str) -> StoreResult<usize>;

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Up to `count` distinct members chosen at random.
    async fn set_sample(&self, key: &str, count: usize) -> StoreResult<Vec<String>>;

    // --- Ranked sets ---

    /// Inserts or overwrites a score. Returns `true` if the member is new.
    async fn ranked_add(&self, key: &str, member: &str, score: f64) -> StoreResult<bool>;

    /// Adds `delta` to a score (absent = 0) and returns the new score.
    async fn ranked_incr(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64>;

    /// Returns `true` if the member was present.
    async fn ranked_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Entries at ranks `start..=stop` in `order`; negative ranks count from the end.
    async fn ranked_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        order: RankOrder,
    ) -> StoreResult<Vec<ScoredEntry>>;

    /// Entries with `min <= score <= max`, ascending, skipping `offset`, at most `limit`.
    async fn ranked_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ScoredEntry>>;

    /// Zero-based rank of `member` in `order`.
    async fn ranked_rank(&self, key: &str, member: &str, order: RankOrder)
        -> StoreResult<Option<u64>>;

    async fn ranked_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    async fn ranked_len(&self, key: &str) -> StoreResult<usize>;

    /// Removes entries with `min <= score <= max`; returns how many were removed.
    async fn ranked_remove_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<usize>;

    // --- Batched writes ---

    /// Applies one queued write.
    async fn apply(&self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::SetFields { key, fields } => self.set_fields(&key, &fields).await,
            WriteOp::Delete { key } => self.delete(&[key]).await.map(drop),
            WriteOp::Set { key, value } => self.set(&key, &value).await,
            WriteOp::IncrBy { key, delta } => self.incr_by(&key, delta).await.map(drop),
            WriteOp::PushFront { key, value } => self.push_front(&key, &value).await.map(drop),
            WriteOp::PushBack { key, value } => self.push_back(&key, &value).await.map(drop),
            WriteOp::RemoveFromList { key, count, value } => {
                self.remove_from_list(&key, count, &value).await.map(drop)
            }
            WriteOp::TrimList { key, start, stop } => self.list_trim(&key, start, stop).await,
            WriteOp::SetAdd { key, member } => self.set_add(&key, &member).await.map(drop),
            WriteOp::SetRemove { key, member } => self.set_remove(&key, &member).await.map(drop),
            WriteOp::RankedAdd { key, member, score } => {
                self.ranked_add(&key, &member, score).await.map(drop)
            }
            WriteOp::RankedIncr { key, member, delta } => {
                self.ranked_incr(&key, &member, delta).await.map(drop)
            }
            WriteOp::RankedRemove { key, member } => {
                self.ranked_remove(&key, &member).await.map(drop)
            }
        }
    }

    /// Submits a batch of writes in order.
    ///
    /// Atomic only per operation: if this fails partway, earlier writes stay
    /// applied. Recovery is an idempotent re-run.
    async fn execute(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        for op in ops {
            self.apply(op).await?;
        }
        Ok(())
    }
}

//! Bounded write batches.
//!
//! A [`Batch`] buffers [`WriteOp`]s and submits them through
//! [`StoreClient::execute`] whenever the buffer reaches its threshold, so a
//! bulk load of any size never holds more than one batch in memory.

use std::sync::Arc;

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreResult;

/// Totals for a finished [`Batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Operations submitted.
    pub ops: usize,
    /// Round trips to the store.
    pub commits: usize,
}

impl std::ops::AddAssign for BatchStats {
    fn add_assign(&mut self, other: Self) {
        self.ops += other.ops;
        self.commits += other.commits;
    }
}

/// Write buffer that auto-commits at `threshold` pending operations.
///
/// Dropping a batch without [`finish`](Self::finish) discards whatever is
/// still pending.
pub struct Batch {
    client: Arc<dyn StoreClient>,
    threshold: usize,
    pending: Vec<WriteOp>,
    stats: BatchStats,
}

impl Batch {
    /// Opens an empty batch. A threshold of zero is treated as one.
    #[must_use]
    pub fn start(client: Arc<dyn StoreClient>, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            client,
            threshold,
            pending: Vec::with_capacity(threshold.min(8_192)),
            stats: BatchStats::default(),
        }
    }

    /// Number of operations waiting for the next commit.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queues `op`, committing once the buffer is full.
    ///
    /// # Errors
    ///
    /// Propagates store failures from an automatic commit.
    pub async fn append(&mut self, op: WriteOp) -> StoreResult<()> {
        self.pending.push(op);
        if self.pending.len() >= self.threshold {
            self.commit().await?;
        }
        Ok(())
    }

    /// Queues every op in `ops`.
    ///
    /// # Errors
    ///
    /// Propagates store failures from an automatic commit.
    pub async fn extend(&mut self, ops: impl IntoIterator<Item = WriteOp>) -> StoreResult<()> {
        for op in ops {
            self.append(op).await?;
        }
        Ok(())
    }

    /// Submits everything pending. A no-op on an empty buffer.
    ///
    /// # Errors
    ///
    /// Propagates store failures. Writes already applied stay applied.
    pub async fn commit(&mut self) -> StoreResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let ops = std::mem::take(&mut self.pending);
        let count = ops.len();
        self.client.execute(ops).await?;

        self.stats.ops += count;
        self.stats.commits += 1;
        metrics::counter!("kvdex_batch_commits_total").increment(1);
        tracing::debug!(ops = count, commits = self.stats.commits, "batch committed");
        Ok(())
    }

    /// Commits the remainder and returns the totals.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the final commit.
    pub async fn finish(mut self) -> StoreResult<BatchStats> {
        self.commit().await?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;

    fn add(member: &str) -> WriteOp {
        WriteOp::SetAdd {
            key: "order:all".to_string(),
            member: member.to_string(),
        }
    }

    #[tokio::test]
    async fn auto_commits_at_threshold() {
        let store = Arc::new(MemoryStore::new());
        let mut batch = Batch::start(store.clone(), 2);

        batch.append(add("O1")).await.unwrap();
        assert_eq!(batch.pending(), 1);
        assert_eq!(store.set_len("order:all").await.unwrap(), 0);

        batch.append(add("O2")).await.unwrap();
        assert_eq!(batch.pending(), 0);
        assert_eq!(store.set_len("order:all").await.unwrap(), 2);

        batch.append(add("O3")).await.unwrap();
        let stats = batch.finish().await.unwrap();
        assert_eq!(stats, BatchStats { ops: 3, commits: 2 });
        assert_eq!(store.set_len("order:all").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn empty_finish_does_not_commit() {
        let store = Arc::new(MemoryStore::new());
        let stats = Batch::start(store, 10).finish().await.unwrap();
        assert_eq!(stats, BatchStats::default());
    }

    #[tokio::test]
    async fn commit_fails_when_store_unavailable() {
        let store = Arc::new(MemoryStore::new());
        store.disconnect("test outage");
        let mut batch = Batch::start(store, 1);

        let err = batch.append(add("O1")).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn stats_accumulate() {
        let mut total = BatchStats { ops: 3, commits: 1 };
        total += BatchStats { ops: 2, commits: 2 };
        assert_eq!(total, BatchStats { ops: 5, commits: 3 });
    }
}

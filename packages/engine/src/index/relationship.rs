//! Parent → children ordered lists (e.g. `customer:{id}:orders`).

use std::sync::Arc;

use kvdex_core::keys::owned_key;

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreResult;

/// Ordered sequence of child ids owned by each parent entity.
///
/// New links go to the front, so reads come back most-recent-first. Links are
/// not deduplicated. Unlinking is a linear scan, which is fine for the small
/// per-parent lists this is meant for.
#[derive(Clone)]
pub struct RelationshipIndex {
    client: Arc<dyn StoreClient>,
    parent_kind: String,
    relation: String,
}

impl RelationshipIndex {
    /// Index stored at `{parent_kind}:{parent_id}:{relation}`.
    #[must_use]
    pub fn new(
        client: Arc<dyn StoreClient>,
        parent_kind: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            client,
            parent_kind: parent_kind.into(),
            relation: relation.into(),
        }
    }

    #[must_use]
    pub fn key(&self, parent_id: &str) -> String {
        owned_key(&self.parent_kind, parent_id, &self.relation)
    }

    /// Inserts `child_id` at the front of the parent's list.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn link(&self, parent_id: &str, child_id: &str) -> StoreResult<()> {
        self.client.push_front(&self.key(parent_id), child_id).await?;
        Ok(())
    }

    /// Removes the first occurrence of `child_id`. Returns whether one was found.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn unlink(&self, parent_id: &str, child_id: &str) -> StoreResult<bool> {
        Ok(self
            .client
            .remove_from_list(&self.key(parent_id), 1, child_id)
            .await?
            > 0)
    }

    /// Children at positions `start..=end` in stored order. Negative positions
    /// count from the end, so `range(p, 0, -1)` returns everything.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn range(&self, parent_id: &str, start: i64, end: i64) -> StoreResult<Vec<String>> {
        self.client.list_range(&self.key(parent_id), start, end).await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn len(&self, parent_id: &str) -> StoreResult<usize> {
        self.client.list_len(&self.key(parent_id)).await
    }

    /// Drops the parent's whole list.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn clear(&self, parent_id: &str) -> StoreResult<()> {
        self.client.delete(&[self.key(parent_id)]).await?;
        Ok(())
    }

    /// Queued form of [`link`](Self::link).
    #[must_use]
    pub fn link_op(&self, parent_id: &str, child_id: &str) -> WriteOp {
        WriteOp::PushFront {
            key: self.key(parent_id),
            value: child_id.to_string(),
        }
    }

    /// Queued form of [`unlink`](Self::unlink).
    #[must_use]
    pub fn unlink_op(&self, parent_id: &str, child_id: &str) -> WriteOp {
        WriteOp::RemoveFromList {
            key: self.key(parent_id),
            count: 1,
            value: child_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;

    fn make_index() -> RelationshipIndex {
        RelationshipIndex::new(Arc::new(MemoryStore::new()), "customer", "orders")
    }

    #[tokio::test]
    async fn link_is_most_recent_first() {
        let index = make_index();
        index.link("C1", "O1").await.unwrap();
        index.link("C1", "O2").await.unwrap();
        index.link("C1", "O3").await.unwrap();

        assert_eq!(index.range("C1", 0, -1).await.unwrap(), vec!["O3", "O2", "O1"]);
        assert_eq!(index.range("C1", 0, 1).await.unwrap(), vec!["O3", "O2"]);
        assert_eq!(index.len("C1").await.unwrap(), 3);
        assert_eq!(index.key("C1"), "customer:C1:orders");
    }

    #[tokio::test]
    async fn duplicates_are_kept_and_unlink_removes_one() {
        let index = make_index();
        index.link("C1", "O1").await.unwrap();
        index.link("C1", "O2").await.unwrap();
        index.link("C1", "O1").await.unwrap();

        assert!(index.unlink("C1", "O1").await.unwrap());
        assert_eq!(index.range("C1", 0, -1).await.unwrap(), vec!["O2", "O1"]);

        assert!(!index.unlink("C1", "O9").await.unwrap());
    }

    #[tokio::test]
    async fn parents_are_independent() {
        let index = make_index();
        index.link("C1", "O1").await.unwrap();
        index.link("C2", "O2").await.unwrap();

        index.clear("C1").await.unwrap();
        assert!(index.range("C1", 0, -1).await.unwrap().is_empty());
        assert_eq!(index.range("C2", 0, -1).await.unwrap(), vec!["O2"]);
    }
}

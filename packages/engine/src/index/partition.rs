//! Membership sets: existence, cardinality, sampling, and categorical grouping.

use std::sync::Arc;

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreResult;

/// Named unordered sets of entity ids.
///
/// Serves both "every order" style sets and mutually exclusive categorical
/// partitions such as `order:status:{status}`. Moving an entity between
/// exclusive partitions goes through
/// [`EntityIndex::change_category`](crate::consistency::EntityIndex::change_category).
#[derive(Clone)]
pub struct PartitionIndex {
    client: Arc<dyn StoreClient>,
}

impl PartitionIndex {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self { client }
    }

    /// Returns `true` if `id` was not already a member.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn add(&self, set: &str, id: &str) -> StoreResult<bool> {
        self.client.set_add(set, id).await
    }

    /// Returns `true` if `id` was a member.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn remove(&self, set: &str, id: &str) -> StoreResult<bool> {
        self.client.set_remove(set, id).await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn contains(&self, set: &str, id: &str) -> StoreResult<bool> {
        self.client.set_contains(set, id).await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn count(&self, set: &str) -> StoreResult<usize> {
        self.client.set_len(set).await
    }

    /// Up to `n` distinct members, in no particular order.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn sample(&self, set: &str, n: usize) -> StoreResult<Vec<String>> {
        self.client.set_sample(set, n).await
    }

    /// Every member, sorted for stable output.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn members(&self, set: &str) -> StoreResult<Vec<String>> {
        let mut members = self.client.set_members(set).await?;
        members.sort();
        Ok(members)
    }

    #[must_use]
    pub fn add_op(&self, set: &str, id: &str) -> WriteOp {
        WriteOp::SetAdd {
            key: set.to_string(),
            member: id.to_string(),
        }
    }

    #[must_use]
    pub fn remove_op(&self, set: &str, id: &str) -> WriteOp {
        WriteOp::SetRemove {
            key: set.to_string(),
            member: id.to_string(),
        }
    }
}

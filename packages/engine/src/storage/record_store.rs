//! Per-type record store.
//!
//! [`RecordStore`] gives CRUD over the field-maps of one entity type. Writes
//! merge, reads of absent records return empty maps, and no field is ever
//! validated: numeric parsing is the caller's concern.

use std::sync::Arc;

use kvdex_core::keys::record_key;
use kvdex_core::Fields;

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreResult;

/// CRUD over records of a single entity type.
#[derive(Clone)]
pub struct RecordStore {
    kind: String,
    client: Arc<dyn StoreClient>,
}

impl RecordStore {
    /// Creates a record store for entities of type `kind` (the key prefix).
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>, kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            client,
        }
    }

    /// Entity type this store manages.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Store key of the record for `id`.
    #[must_use]
    pub fn key(&self, id: &str) -> String {
        record_key(&self.kind, id)
    }

    // --- Core CRUD ---

    /// Creates the record or merges `fields` into it. Fields not mentioned are preserved.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn put(&self, id: &str, fields: &Fields) -> StoreResult<()> {
        self.client.set_fields(&self.key(id), fields).await
    }

    /// All fields of the record; empty when it does not exist.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(&self, id: &str) -> StoreResult<Fields> {
        self.client.get_fields(&self.key(id)).await
    }

    /// A single field, or `None` when the record or field is absent.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get_field(&self, id: &str, name: &str) -> StoreResult<Option<String>> {
        self.client.get_field(&self.key(id), name).await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn exists(&self, id: &str) -> StoreResult<bool> {
        self.client.exists(&self.key(id)).await
    }

    /// Removes the whole field-map. Returns whether it existed.
    ///
    /// Only the record itself is removed; cascading to indexes is the job of
    /// [`EntityIndex::delete`](crate::consistency::EntityIndex::delete).
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.client.delete(&[self.key(id)]).await? > 0)
    }

    // --- Batch operations ---

    /// Fetches several records, skipping ids whose record is absent.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<(String, Fields)>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let fields = self.get(id).await?;
            if !fields.is_empty() {
                results.push((id.clone(), fields));
            }
        }
        Ok(results)
    }

    /// Queued form of [`put`](Self::put).
    #[must_use]
    pub fn put_op(&self, id: &str, fields: Fields) -> WriteOp {
        WriteOp::SetFields {
            key: self.key(id),
            fields,
        }
    }

    /// Queued form of [`delete`](Self::delete).
    #[must_use]
    pub fn delete_op(&self, id: &str) -> WriteOp {
        WriteOp::Delete { key: self.key(id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;

    fn make_store() -> RecordStore {
        RecordStore::new(Arc::new(MemoryStore::new()), "order")
    }

    #[tokio::test]
    async fn put_then_get_round_trip() {
        let store = make_store();
        store
            .put("O1", &Fields::new().with("customer_id", "C1").with("status", "created"))
            .await
            .unwrap();

        let fields = store.get("O1").await.unwrap();
        assert_eq!(fields.get("customer_id"), Some("C1"));
        assert_eq!(fields.get("status"), Some("created"));
        assert!(store.exists("O1").await.unwrap());
        assert_eq!(store.key("O1"), "order:O1");
    }

    #[tokio::test]
    async fn put_merges_instead_of_replacing() {
        let store = make_store();
        store.put("O1", &Fields::new().with("status", "created")).await.unwrap();
        store.put("O1", &Fields::new().with("freight_value", 8.5)).await.unwrap();

        let fields = store.get("O1").await.unwrap();
        assert_eq!(fields.get("status"), Some("created"));
        assert_eq!(fields.parse::<f64>("freight_value"), Some(8.5));
    }

    #[tokio::test]
    async fn absent_record_reads_empty() {
        let store = make_store();
        assert!(store.get("missing").await.unwrap().is_empty());
        assert!(store.get_field("missing", "status").await.unwrap().is_none());
        assert!(!store.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_whole_record() {
        let store = make_store();
        store.put("O1", &Fields::new().with("status", "created")).await.unwrap();

        assert!(store.delete("O1").await.unwrap());
        assert!(store.get("O1").await.unwrap().is_empty());
        assert!(!store.exists("O1").await.unwrap());
    }

    #[tokio::test]
    async fn get_many_skips_dangling_ids() {
        let store = make_store();
        store.put("a", &Fields::new().with("x", 1)).await.unwrap();
        store.put("b", &Fields::new().with("x", 2)).await.unwrap();

        let found = store
            .get_many(&["a".to_string(), "gone".to_string(), "b".to_string()])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn ops_target_record_key() {
        let store = make_store();
        assert_eq!(store.put_op("O1", Fields::new()).key(), "order:O1");
        assert_eq!(store.delete_op("O1"), WriteOp::Delete { key: "order:O1".to_string() });
    }
}

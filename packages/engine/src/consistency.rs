//! Schema-driven index maintenance for compound writes.
//!
//! An [`EntitySchema`] declares every index an entity type participates in:
//! its all-set, categorical partitions, parent relationship lists, rankings
//! keyed by its id, tag memberships, mirrored scored links, and
//! sub-collections it owns. [`EntityIndex`] uses that declaration to keep
//! records and indexes coherent:
//!
//! - **create** is an upsert against the current record: index entries for
//!   categorical or parent values that changed are removed, then the record,
//!   relationships, partitions and the all-set are written as one ordered batch;
//! - **change_category** removes from the old partition, sets the field, and
//!   adds to the new partition. Between the first and last step an observer
//!   may see the entity in neither partition. That window is accepted; there
//!   is no locking;
//! - **delete** reads a [`Snapshot`] of the record and its tag and link
//!   collections, removes every index entry derivable from it, drops owned
//!   sub-collections, and deletes the record last.
//!
//! Readers tolerate drift: [`EntityIndex::resolve`] skips ids whose record is
//! gone instead of failing.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvdex_core::keys::{all_key, category_key, field_partition_key, owned_key};
use kvdex_core::{Fields, RankOrder, ScoredEntry};

use crate::client::{StoreClient, WriteOp};
use crate::error::StoreError;
use crate::index::{PartitionIndex, RankingIndex, RelationshipIndex};
use crate::storage::RecordStore;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// How a categorical field maps to partition set names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionRule {
    /// `{kind}:{field}:{value}`, e.g. `order:status:shipped`.
    ByField { field: String },
    /// `{category}:{value}:{group}`, e.g. `state:SP:customers`.
    ByCategory {
        field: String,
        category: String,
        group: String,
    },
}

impl PartitionRule {
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::ByField { field } | Self::ByCategory { field, .. } => field,
        }
    }

    /// Set name holding entities of `kind` whose field equals `value`.
    #[must_use]
    pub fn key(&self, kind: &str, value: &str) -> String {
        match self {
            Self::ByField { field } => field_partition_key(kind, field, value),
            Self::ByCategory {
                category, group, ..
            } => category_key(category, value, group),
        }
    }
}

/// A field holding the id of a parent whose relationship list contains this entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRule {
    pub field: String,
    pub parent_kind: String,
    pub relation: String,
}

/// Non-exclusive membership in any number of tag sets.
///
/// The entity's own set `{kind}:{id}:{relation}` lists its tags and
/// `{category}:{tag}:{group}` lists the entities carrying `tag`, e.g.
/// `movie:M1:genres` and `genre:drama:movies`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRule {
    pub relation: String,
    pub category: String,
    pub group: String,
}

impl TagRule {
    #[must_use]
    pub fn key(&self, tag: &str) -> String {
        category_key(&self.category, tag, &self.group)
    }
}

/// Per-entity ranked sets mirrored on a peer type, e.g. `user:U1:ratings`
/// scoring movies and `movie:M1:ratings` scoring users with the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLinkRule {
    pub relation: String,
    pub peer_kind: String,
    pub peer_relation: String,
}

impl ScoredLinkRule {
    /// The peer's mirrored ranked set.
    #[must_use]
    pub fn peer_key(&self, peer: &str) -> String {
        owned_key(&self.peer_kind, peer, &self.peer_relation)
    }
}

/// Every index an entity type participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    kind: String,
    partitions: Vec<PartitionRule>,
    parents: Vec<ParentRule>,
    rankings: Vec<String>,
    tags: Vec<TagRule>,
    scored_links: Vec<ScoredLinkRule>,
    owned: Vec<String>,
}

impl EntitySchema {
    /// Schema for `kind` with only its all-set.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            partitions: Vec::new(),
            parents: Vec::new(),
            rankings: Vec::new(),
            tags: Vec::new(),
            scored_links: Vec::new(),
            owned: Vec::new(),
        }
    }

    /// Partitions by `field` as `{kind}:{field}:{value}`.
    #[must_use]
    pub fn partition_by_field(mut self, field: impl Into<String>) -> Self {
        self.partitions.push(PartitionRule::ByField {
            field: field.into(),
        });
        self
    }

    /// Partitions by `field` as `{category}:{value}:{group}`.
    #[must_use]
    pub fn partition_by_category(
        mut self,
        field: impl Into<String>,
        category: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        self.partitions.push(PartitionRule::ByCategory {
            field: field.into(),
            category: category.into(),
            group: group.into(),
        });
        self
    }

    /// Links the entity into `{parent_kind}:{parent}:{relation}` where `parent` is read from `field`.
    #[must_use]
    pub fn child_of(
        mut self,
        field: impl Into<String>,
        parent_kind: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        self.parents.push(ParentRule {
            field: field.into(),
            parent_kind: parent_kind.into(),
            relation: relation.into(),
        });
        self
    }

    /// A ranking whose members are ids of this type.
    #[must_use]
    pub fn ranked_in(mut self, ranking: impl Into<String>) -> Self {
        self.rankings.push(ranking.into());
        self
    }

    /// Tags under `{kind}:{id}:{relation}`, indexed back as `{category}:{tag}:{group}`.
    #[must_use]
    pub fn tagged(
        mut self,
        relation: impl Into<String>,
        category: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        self.tags.push(TagRule {
            relation: relation.into(),
            category: category.into(),
            group: group.into(),
        });
        self
    }

    /// Scores peers in `{kind}:{id}:{relation}`, mirrored in
    /// `{peer_kind}:{peer}:{peer_relation}`.
    #[must_use]
    pub fn scored_link(
        mut self,
        relation: impl Into<String>,
        peer_kind: impl Into<String>,
        peer_relation: impl Into<String>,
    ) -> Self {
        self.scored_links.push(ScoredLinkRule {
            relation: relation.into(),
            peer_kind: peer_kind.into(),
            peer_relation: peer_relation.into(),
        });
        self
    }

    /// A sub-collection `{kind}:{id}:{relation}` that dies with the entity.
    #[must_use]
    pub fn owns(mut self, relation: impl Into<String>) -> Self {
        self.owned.push(relation.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn all_key(&self) -> String {
        all_key(&self.kind)
    }

    #[must_use]
    pub fn partition_rule(&self, field: &str) -> Option<&PartitionRule> {
        self.partitions.iter().find(|rule| rule.field() == field)
    }

    /// Partition set holding entities whose `field` equals `value`.
    #[must_use]
    pub fn partition_key(&self, field: &str, value: &str) -> Option<String> {
        self.partition_rule(field).map(|rule| rule.key(&self.kind, value))
    }

    #[must_use]
    pub fn tag_rule(&self, relation: &str) -> Option<&TagRule> {
        self.tags.iter().find(|rule| rule.relation == relation)
    }

    #[must_use]
    pub fn scored_link_rule(&self, relation: &str) -> Option<&ScoredLinkRule> {
        self.scored_links.iter().find(|rule| rule.relation == relation)
    }

    #[must_use]
    pub fn owned_key(&self, id: &str, relation: &str) -> String {
        owned_key(&self.kind, id, relation)
    }

    #[must_use]
    pub fn rankings(&self) -> &[String] {
        &self.rankings
    }

    /// The subset of `fields` that places the entity in a partition or a
    /// parent list, which is all an upsert needs to know about the old record.
    #[must_use]
    pub fn indexed_fields(&self, fields: &Fields) -> Fields {
        fields
            .iter()
            .filter(|(name, _)| self.partition_rule(name).is_some() || self.parent_rule(name).is_some())
            .collect()
    }

    fn parent_rule(&self, field: &str) -> Option<&ParentRule> {
        self.parents.iter().find(|rule| rule.field == field)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("{kind} {id} does not exist")]
    NotFound { kind: String, id: String },
    #[error("{kind} has no partition on field `{field}`")]
    NotCategorical { kind: String, field: String },
    #[error("{kind} has no tag or scored-link relation `{relation}`")]
    UnknownRelation { kind: String, relation: String },
    #[error("{kind} record needs an id and at least one field")]
    EmptyRecord { kind: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EntityResult<T> = Result<T, EntityError>;

/// Result of a categorical transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChange {
    pub field: String,
    /// Previous value; `None` if the field was unset.
    pub old: Option<String>,
    pub new: String,
}

impl CategoryChange {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.old.as_deref() == Some(self.new.as_str())
    }
}

/// Current state of one entity: everything a delete has to undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub fields: Fields,
    /// Tag relation to the tags held.
    pub tags: BTreeMap<String, Vec<String>>,
    /// Scored-link relation to the linked peer ids.
    pub peers: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// EntityIndex
// ---------------------------------------------------------------------------

/// Records of one entity type together with every index derived from them.
#[derive(Clone)]
pub struct EntityIndex {
    schema: Arc<EntitySchema>,
    client: Arc<dyn StoreClient>,
    records: RecordStore,
    partitions: PartitionIndex,
    rankings: RankingIndex,
}

impl EntityIndex {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>, schema: EntitySchema) -> Self {
        Self {
            records: RecordStore::new(Arc::clone(&client), schema.kind()),
            partitions: PartitionIndex::new(Arc::clone(&client)),
            rankings: RankingIndex::new(Arc::clone(&client)),
            schema: Arc::new(schema),
            client,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    #[must_use]
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    fn relationship(&self, rule: &ParentRule) -> RelationshipIndex {
        RelationshipIndex::new(Arc::clone(&self.client), &rule.parent_kind, &rule.relation)
    }

    /// Writes for creating or replacing `id`, given the `previous` record
    /// (empty for a new entity), in protocol order: record, relationships,
    /// partitions, all-set.
    ///
    /// A parent or categorical value that differs from `previous` is
    /// unlinked from its old list or removed from its old partition first.
    /// Relationship links are preceded by an unlink so replaying the same
    /// create leaves one link, not two.
    #[must_use]
    pub fn upsert_ops(&self, id: &str, fields: &Fields, previous: &Fields) -> Vec<WriteOp> {
        let kind = &self.schema.kind;
        let mut ops = vec![self.records.put_op(id, fields.clone())];
        for rule in &self.schema.parents {
            let Some(parent) = fields.get(&rule.field) else {
                continue;
            };
            let relationship = self.relationship(rule);
            if let Some(old) = previous.get(&rule.field).filter(|old| !old.is_empty() && *old != parent) {
                ops.push(relationship.unlink_op(old, id));
            }
            if !parent.is_empty() {
                ops.push(relationship.unlink_op(parent, id));
                ops.push(relationship.link_op(parent, id));
            }
        }
        for rule in &self.schema.partitions {
            let Some(value) = fields.get(rule.field()) else {
                continue;
            };
            if let Some(old) = previous.get(rule.field()).filter(|old| !old.is_empty() && *old != value) {
                ops.push(self.partitions.remove_op(&rule.key(kind, old), id));
            }
            if !value.is_empty() {
                ops.push(self.partitions.add_op(&rule.key(kind, value), id));
            }
        }
        ops.push(self.partitions.add_op(&self.schema.all_key(), id));
        ops
    }

    /// Creates the record and all of its index entries in one batch.
    ///
    /// An existing record is replaced field by field; partitions and parent
    /// lists follow the new values.
    ///
    /// # Errors
    ///
    /// [`EntityError::EmptyRecord`] for an empty id or field map; store failures.
    pub async fn create(&self, id: &str, fields: &Fields) -> EntityResult<()> {
        if id.is_empty() || fields.is_empty() {
            return Err(EntityError::EmptyRecord {
                kind: self.schema.kind.clone(),
            });
        }
        let previous = self.records.get(id).await?;
        self.client
            .execute(self.upsert_ops(id, fields, &previous))
            .await?;
        tracing::debug!(kind = %self.schema.kind, id, replaced = !previous.is_empty(), "entity created");
        Ok(())
    }

    /// Moves `id` to the partition for `new`, reading the current value first.
    ///
    /// # Errors
    ///
    /// [`EntityError::NotCategorical`] if `field` has no partition rule,
    /// [`EntityError::NotFound`] if the record is absent; store failures.
    pub async fn change_category(&self, id: &str, field: &str, new: &str) -> EntityResult<CategoryChange> {
        self.require_rule(field)?;
        let current = self.records.get(id).await?;
        if current.is_empty() {
            return Err(self.not_found(id));
        }
        let old = current.get(field).map(str::to_string);
        self.transition(id, field, old.as_deref(), new).await
    }

    /// Remove from `partition(old)`, set the field, add to `partition(new)`.
    /// Callers have already checked that the record exists.
    async fn transition(
        &self,
        id: &str,
        field: &str,
        old: Option<&str>,
        new: &str,
    ) -> EntityResult<CategoryChange> {
        let rule = self.require_rule(field)?;
        let kind = &self.schema.kind;
        if let Some(old) = old.filter(|old| !old.is_empty() && *old != new) {
            self.partitions.remove(&rule.key(kind, old), id).await?;
        }
        self.records.put(id, &Fields::new().with(field, new)).await?;
        if !new.is_empty() {
            self.partitions.add(&rule.key(kind, new), id).await?;
        }

        tracing::debug!(kind = %kind, id, field, old = ?old, new, "category changed");
        Ok(CategoryChange {
            field: field.to_string(),
            old: old.map(str::to_string),
            new: new.to_string(),
        })
    }

    /// Merges `fields` into an existing record.
    ///
    /// Categorical fields go through [`change_category`](Self::change_category)
    /// and parent fields move the relationship link; everything else is a
    /// plain merge. Returns the categorical changes applied.
    ///
    /// # Errors
    ///
    /// [`EntityError::NotFound`] if the record is absent; store failures.
    pub async fn update(&self, id: &str, fields: &Fields) -> EntityResult<Vec<CategoryChange>> {
        let current = self.records.get(id).await?;
        if current.is_empty() {
            return Err(self.not_found(id));
        }

        let mut plain = Fields::new();
        let mut changes = Vec::new();
        for (name, value) in fields.iter() {
            if self.schema.partition_rule(name).is_some() {
                changes.push(self.transition(id, name, current.get(name), value).await?);
                continue;
            }
            if let Some(rule) = self.schema.parent_rule(name) {
                let relationship = self.relationship(rule);
                match current.get(name) {
                    Some(old) if old == value => {}
                    Some(old) => {
                        relationship.unlink(old, id).await?;
                        relationship.link(value, id).await?;
                    }
                    None => relationship.link(value, id).await?,
                }
            }
            plain.insert(name, value);
        }
        if !plain.is_empty() {
            self.records.put(id, &plain).await?;
        }
        Ok(changes)
    }

    // --- Tags ---

    /// Writes adding `tags` to `id` in both directions. Blank tags are ignored.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`] if `relation` is not a tag relation.
    pub fn tag_ops<S: AsRef<str>>(&self, id: &str, relation: &str, tags: &[S]) -> EntityResult<Vec<WriteOp>> {
        let rule = self.require_tag_rule(relation)?;
        let own = self.schema.owned_key(id, relation);
        Ok(tags
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|tag| !tag.is_empty())
            .flat_map(|tag| {
                [
                    self.partitions.add_op(&own, tag),
                    self.partitions.add_op(&rule.key(tag), id),
                ]
            })
            .collect())
    }

    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures.
    pub async fn tag<S: AsRef<str>>(&self, id: &str, relation: &str, tags: &[S]) -> EntityResult<()> {
        let ops = self.tag_ops(id, relation, tags)?;
        self.client.execute(ops).await?;
        Ok(())
    }

    /// Removes one tag in both directions. Returns whether `id` carried it.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures.
    pub async fn untag(&self, id: &str, relation: &str, tag: &str) -> EntityResult<bool> {
        let rule = self.require_tag_rule(relation)?;
        let removed = self
            .partitions
            .remove(&self.schema.owned_key(id, relation), tag)
            .await?;
        self.partitions.remove(&rule.key(tag), id).await?;
        Ok(removed)
    }

    /// Tags of `id`, sorted.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures.
    pub async fn tags(&self, id: &str, relation: &str) -> EntityResult<Vec<String>> {
        self.require_tag_rule(relation)?;
        let mut tags = self
            .partitions
            .members(&self.schema.owned_key(id, relation))
            .await?;
        tags.sort_unstable();
        Ok(tags)
    }

    /// Ids carrying `tag`, sorted.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures.
    pub async fn tagged_with(&self, relation: &str, tag: &str) -> EntityResult<Vec<String>> {
        let rule = self.require_tag_rule(relation)?;
        let mut ids = self.partitions.members(&rule.key(tag)).await?;
        ids.sort_unstable();
        Ok(ids)
    }

    // --- Scored links ---

    /// Writes scoring `peer` from `id` and `id` from `peer` with the same value.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`] if `relation` is not a scored link.
    pub fn score_link_ops(&self, id: &str, relation: &str, peer: &str, score: f64) -> EntityResult<Vec<WriteOp>> {
        let rule = self.require_scored_link(relation)?;
        Ok(vec![
            self.rankings
                .set_score_op(&self.schema.owned_key(id, relation), peer, score),
            self.rankings.set_score_op(&rule.peer_key(peer), id, score),
        ])
    }

    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures, including a NaN score.
    pub async fn score_link(&self, id: &str, relation: &str, peer: &str, score: f64) -> EntityResult<()> {
        let ops = self.score_link_ops(id, relation, peer, score)?;
        self.client.execute(ops).await?;
        Ok(())
    }

    /// Drops the link in both directions. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures.
    pub async fn remove_link(&self, id: &str, relation: &str, peer: &str) -> EntityResult<bool> {
        let rule = self.require_scored_link(relation)?;
        let removed = self
            .rankings
            .remove_entry(&self.schema.owned_key(id, relation), peer)
            .await?;
        self.rankings.remove_entry(&rule.peer_key(peer), id).await?;
        Ok(removed)
    }

    /// Every peer linked from `id`, by score in `order`.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownRelation`]; store failures.
    pub async fn links(&self, id: &str, relation: &str, order: RankOrder) -> EntityResult<Vec<ScoredEntry>> {
        self.require_scored_link(relation)?;
        Ok(self
            .rankings
            .rank_range(&self.schema.owned_key(id, relation), 0, -1, order)
            .await?)
    }

    // --- Delete ---

    /// Reads the record of `id` with its tag and scored-link collections.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn snapshot(&self, id: &str) -> EntityResult<Snapshot> {
        let mut snapshot = Snapshot {
            fields: self.records.get(id).await?,
            ..Snapshot::default()
        };
        for rule in &self.schema.tags {
            let tags = self
                .partitions
                .members(&self.schema.owned_key(id, &rule.relation))
                .await?;
            snapshot.tags.insert(rule.relation.clone(), tags);
        }
        for rule in &self.schema.scored_links {
            let peers = self
                .rankings
                .rank_range(&self.schema.owned_key(id, &rule.relation), 0, -1, RankOrder::Ascending)
                .await?;
            snapshot
                .peers
                .insert(rule.relation.clone(), peers.into_iter().map(|entry| entry.id).collect());
        }
        Ok(snapshot)
    }

    /// Writes for deleting an entity in state `snapshot`: index entries
    /// first, owned sub-collections next, the record last.
    #[must_use]
    pub fn delete_ops(&self, id: &str, snapshot: &Snapshot) -> Vec<WriteOp> {
        let fields = &snapshot.fields;
        let mut ops = Vec::new();
        for rule in &self.schema.parents {
            if let Some(parent) = fields.get(&rule.field).filter(|p| !p.is_empty()) {
                ops.push(self.relationship(rule).unlink_op(parent, id));
            }
        }
        for rule in &self.schema.partitions {
            if let Some(value) = fields.get(rule.field()).filter(|v| !v.is_empty()) {
                ops.push(self.partitions.remove_op(&rule.key(&self.schema.kind, value), id));
            }
        }
        ops.push(self.partitions.remove_op(&self.schema.all_key(), id));
        for ranking in &self.schema.rankings {
            ops.push(self.rankings.remove_op(ranking, id));
        }
        for rule in &self.schema.tags {
            for tag in snapshot.tags.get(&rule.relation).into_iter().flatten() {
                ops.push(self.partitions.remove_op(&rule.key(tag), id));
            }
            ops.push(WriteOp::Delete {
                key: self.schema.owned_key(id, &rule.relation),
            });
        }
        for rule in &self.schema.scored_links {
            for peer in snapshot.peers.get(&rule.relation).into_iter().flatten() {
                ops.push(self.rankings.remove_op(&rule.peer_key(peer), id));
            }
            ops.push(WriteOp::Delete {
                key: self.schema.owned_key(id, &rule.relation),
            });
        }
        for relation in &self.schema.owned {
            ops.push(WriteOp::Delete {
                key: self.schema.owned_key(id, relation),
            });
        }
        ops.push(self.records.delete_op(id));
        ops
    }

    /// Cascading delete. Returns whether the record existed.
    ///
    /// Entries that do not depend on field values (all-set, rankings, tags,
    /// scored links, owned collections) are cleared even when the record is
    /// already gone.
    ///
    /// # Errors
    ///
    /// Propagates store failures; a partial delete is repaired by calling again.
    pub async fn delete(&self, id: &str) -> EntityResult<bool> {
        let snapshot = self.snapshot(id).await?;
        let existed = !snapshot.fields.is_empty();
        self.client.execute(self.delete_ops(id, &snapshot)).await?;
        tracing::debug!(kind = %self.schema.kind, id, existed, "entity deleted");
        Ok(existed)
    }

    // --- Read ---

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(&self, id: &str) -> EntityResult<Fields> {
        Ok(self.records.get(id).await?)
    }

    /// Records for `ids`, skipping dangling ids.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn resolve(&self, ids: &[String]) -> EntityResult<Vec<(String, Fields)>> {
        Ok(self.records.get_many(ids).await?)
    }

    /// Live members of the partition for `field == value`.
    ///
    /// # Errors
    ///
    /// [`EntityError::NotCategorical`] if `field` has no partition rule; store failures.
    pub async fn in_category(&self, field: &str, value: &str) -> EntityResult<Vec<String>> {
        let rule = self.require_rule(field)?;
        Ok(self.partitions.members(&rule.key(&self.schema.kind, value)).await?)
    }

    /// Size of the partition for `field == value`.
    ///
    /// # Errors
    ///
    /// [`EntityError::NotCategorical`] if `field` has no partition rule; store failures.
    pub async fn count_in_category(&self, field: &str, value: &str) -> EntityResult<usize> {
        let rule = self.require_rule(field)?;
        Ok(self.partitions.count(&rule.key(&self.schema.kind, value)).await?)
    }

    /// Size of the all-set.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn count(&self) -> EntityResult<usize> {
        Ok(self.partitions.count(&self.schema.all_key()).await?)
    }

    /// Up to `n` random live ids.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn sample(&self, n: usize) -> EntityResult<Vec<String>> {
        Ok(self.partitions.sample(&self.schema.all_key(), n).await?)
    }

    fn require_rule(&self, field: &str) -> EntityResult<&PartitionRule> {
        self.schema
            .partition_rule(field)
            .ok_or_else(|| EntityError::NotCategorical {
                kind: self.schema.kind.clone(),
                field: field.to_string(),
            })
    }

    fn require_tag_rule(&self, relation: &str) -> EntityResult<&TagRule> {
        self.schema
            .tag_rule(relation)
            .ok_or_else(|| self.unknown_relation(relation))
    }

    fn require_scored_link(&self, relation: &str) -> EntityResult<&ScoredLinkRule> {
        self.schema
            .scored_link_rule(relation)
            .ok_or_else(|| self.unknown_relation(relation))
    }

    fn unknown_relation(&self, relation: &str) -> EntityError {
        EntityError::UnknownRelation {
            kind: self.schema.kind.clone(),
            relation: relation.to_string(),
        }
    }

    fn not_found(&self, id: &str) -> EntityError {
        EntityError::NotFound {
            kind: self.schema.kind.clone(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;

    fn order_schema() -> EntitySchema {
        EntitySchema::new("order")
            .partition_by_field("status")
            .child_of("customer_id", "customer", "orders")
            .ranked_in("review:scores")
            .owns("items")
    }

    fn setup() -> (Arc<MemoryStore>, EntityIndex) {
        let store = Arc::new(MemoryStore::new());
        let index = EntityIndex::new(store.clone(), order_schema());
        (store, index)
    }

    fn order(customer: &str, status: &str) -> Fields {
        Fields::new().with("customer_id", customer).with("status", status)
    }

    #[test]
    fn partition_rules_name_sets() {
        let customers = EntitySchema::new("customer").partition_by_category("state", "state", "customers");
        assert_eq!(customers.partition_key("state", "SP").as_deref(), Some("state:SP:customers"));
        assert_eq!(
            order_schema().partition_key("status", "created").as_deref(),
            Some("order:status:created")
        );
        assert!(order_schema().partition_key("price", "1").is_none());
    }

    #[tokio::test]
    async fn create_writes_record_and_every_index() {
        let (store, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();

        assert_eq!(index.get("O1").await.unwrap().get("status"), Some("created"));
        assert!(store.set_contains("order:all", "O1").await.unwrap());
        assert!(store.set_contains("order:status:created", "O1").await.unwrap());
        assert_eq!(store.list_range("customer:C1:orders", 0, -1).await.unwrap(), vec!["O1"]);
    }

    #[tokio::test]
    async fn repeated_create_does_not_duplicate_links() {
        let (store, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();
        index.create("O1", &order("C1", "created")).await.unwrap();

        assert_eq!(store.list_len("customer:C1:orders").await.unwrap(), 1);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_rejects_empty_records() {
        let (_, index) = setup();
        assert!(matches!(
            index.create("O1", &Fields::new()).await,
            Err(EntityError::EmptyRecord { .. })
        ));
    }

    #[tokio::test]
    async fn change_category_moves_between_partitions() {
        let (_, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();

        let change = index.change_category("O1", "status", "shipped").await.unwrap();
        assert_eq!(change.old.as_deref(), Some("created"));
        assert_eq!(change.new, "shipped");

        assert_eq!(index.count_in_category("status", "created").await.unwrap(), 0);
        assert_eq!(index.in_category("status", "shipped").await.unwrap(), vec!["O1"]);
        assert_eq!(index.get("O1").await.unwrap().get("status"), Some("shipped"));
    }

    #[tokio::test]
    async fn change_category_errors() {
        let (_, index) = setup();
        assert!(matches!(
            index.change_category("nope", "status", "shipped").await,
            Err(EntityError::NotFound { .. })
        ));
        index.create("O1", &order("C1", "created")).await.unwrap();
        assert!(matches!(
            index.change_category("O1", "customer_id", "C2").await,
            Err(EntityError::NotCategorical { .. })
        ));
    }

    #[tokio::test]
    async fn same_value_transition_keeps_membership() {
        let (_, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();
        let change = index.change_category("O1", "status", "created").await.unwrap();
        assert!(change.is_noop());
        assert_eq!(index.count_in_category("status", "created").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_routes_categorical_and_parent_fields() {
        let (store, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();

        let changes = index
            .update(
                "O1",
                &Fields::new()
                    .with("status", "delivered")
                    .with("customer_id", "C2")
                    .with("freight_value", 9.5),
            )
            .await
            .unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(index.count_in_category("status", "created").await.unwrap(), 0);
        assert_eq!(index.count_in_category("status", "delivered").await.unwrap(), 1);
        assert!(store.list_range("customer:C1:orders", 0, -1).await.unwrap().is_empty());
        assert_eq!(store.list_range("customer:C2:orders", 0, -1).await.unwrap(), vec!["O1"]);

        let record = index.get("O1").await.unwrap();
        assert_eq!(record.get("customer_id"), Some("C2"));
        assert_eq!(record.parse::<f64>("freight_value"), Some(9.5));
    }

    #[tokio::test]
    async fn delete_cascades_everywhere() {
        let (store, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();
        index.create("O2", &order("C1", "created")).await.unwrap();
        store.ranked_add("review:scores", "O1", 5.0).await.unwrap();
        store.push_back("order:O1:items", "P1").await.unwrap();

        assert!(index.delete("O1").await.unwrap());

        assert!(index.get("O1").await.unwrap().is_empty());
        assert!(!store.set_contains("order:all", "O1").await.unwrap());
        assert!(!store.set_contains("order:status:created", "O1").await.unwrap());
        assert_eq!(store.list_range("customer:C1:orders", 0, -1).await.unwrap(), vec!["O2"]);
        assert!(store.ranked_score("review:scores", "O1").await.unwrap().is_none());
        assert!(!store.exists("order:O1:items").await.unwrap());

        assert!(!index.delete("O1").await.unwrap());
    }

    #[tokio::test]
    async fn resolve_skips_dangling_ids() {
        let (store, index) = setup();
        index.create("O1", &order("C1", "created")).await.unwrap();
        // Drift: index entry without a record.
        store.set_add("order:status:created", "ghost").await.unwrap();

        let ids = index.in_category("status", "created").await.unwrap();
        let resolved = index.resolve(&ids).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].0, "O1");
    }

    #[tokio::test]
    async fn recreate_with_new_values_moves_indexes() {
        let (store, index) = setup();
        index.create("O9", &order("C1", "created")).await.unwrap();
        index.create("O9", &order("C2", "delivered")).await.unwrap();

        assert_eq!(index.count_in_category("status", "created").await.unwrap(), 0);
        assert_eq!(index.in_category("status", "delivered").await.unwrap(), vec!["O9"]);
        assert!(store.list_range("customer:C1:orders", 0, -1).await.unwrap().is_empty());
        assert_eq!(store.list_range("customer:C2:orders", 0, -1).await.unwrap(), vec!["O9"]);

        assert!(index.delete("O9").await.unwrap());
        for set in ["order:all", "order:status:created", "order:status:delivered"] {
            assert!(!store.set_contains(set, "O9").await.unwrap(), "{set} still holds O9");
        }
        assert!(store.list_range("customer:C2:orders", 0, -1).await.unwrap().is_empty());
    }

    #[test]
    fn upsert_ops_only_unlinks_changed_values() {
        let (_, index) = setup();
        let same = index.upsert_ops("O1", &order("C1", "created"), &order("C1", "created"));
        assert!(!same
            .iter()
            .any(|op| matches!(op, WriteOp::SetRemove { .. })));

        let moved = index.upsert_ops("O1", &order("C2", "shipped"), &order("C1", "created"));
        assert!(moved.contains(&WriteOp::SetRemove {
            key: "order:status:created".into(),
            member: "O1".into(),
        }));
        assert!(moved.contains(&WriteOp::RemoveFromList {
            key: "customer:C1:orders".into(),
            count: 1,
            value: "O1".into(),
        }));
    }

    #[tokio::test]
    async fn change_category_on_missing_id_writes_nothing() {
        let (store, index) = setup();
        assert!(matches!(
            index.change_category("ghost", "status", "shipped").await,
            Err(EntityError::NotFound { .. })
        ));
        assert!(index.get("ghost").await.unwrap().is_empty());
        assert!(!store.set_contains("order:status:shipped", "ghost").await.unwrap());
        assert_eq!(store.key_count(), 0);
    }

    fn movie_schema() -> EntitySchema {
        EntitySchema::new("movie")
            .tagged("genres", "genre", "movies")
            .scored_link("ratings", "user", "ratings")
    }

    #[tokio::test]
    async fn tags_are_indexed_both_ways() {
        let store = Arc::new(MemoryStore::new());
        let movies = EntityIndex::new(store.clone(), movie_schema());
        movies.create("M1", &Fields::new().with("title", "Heat")).await.unwrap();
        movies.create("M2", &Fields::new().with("title", "Up")).await.unwrap();
        movies.tag("M1", "genres", &["drama", "crime", ""]).await.unwrap();
        movies.tag("M2", "genres", &["drama"]).await.unwrap();

        assert_eq!(movies.tags("M1", "genres").await.unwrap(), vec!["crime", "drama"]);
        assert_eq!(movies.tagged_with("genres", "drama").await.unwrap(), vec!["M1", "M2"]);

        assert!(movies.untag("M1", "genres", "crime").await.unwrap());
        assert!(!movies.untag("M1", "genres", "crime").await.unwrap());
        assert!(movies.tagged_with("genres", "crime").await.unwrap().is_empty());

        assert!(matches!(
            movies.tag("M1", "moods", &["dark"]).await,
            Err(EntityError::UnknownRelation { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_tags_from_both_sides() {
        let store = Arc::new(MemoryStore::new());
        let movies = EntityIndex::new(store.clone(), movie_schema());
        movies.create("M1", &Fields::new().with("title", "Heat")).await.unwrap();
        movies.create("M2", &Fields::new().with("title", "Up")).await.unwrap();
        movies.tag("M1", "genres", &["drama", "crime"]).await.unwrap();
        movies.tag("M2", "genres", &["drama"]).await.unwrap();

        movies.delete("M1").await.unwrap();

        assert_eq!(movies.tagged_with("genres", "drama").await.unwrap(), vec!["M2"]);
        assert!(movies.tagged_with("genres", "crime").await.unwrap().is_empty());
        assert!(!store.exists("movie:M1:genres").await.unwrap());
    }

    #[tokio::test]
    async fn scored_links_mirror_and_cascade_from_either_side() {
        let store = Arc::new(MemoryStore::new());
        let users = EntityIndex::new(
            store.clone(),
            EntitySchema::new("user").scored_link("ratings", "movie", "ratings"),
        );
        let movies = EntityIndex::new(store.clone(), movie_schema());
        users.create("U1", &Fields::new().with("name", "ana")).await.unwrap();
        users.create("U2", &Fields::new().with("name", "bo")).await.unwrap();
        movies.create("M1", &Fields::new().with("title", "Heat")).await.unwrap();
        movies.create("M2", &Fields::new().with("title", "Up")).await.unwrap();

        users.score_link("U1", "ratings", "M1", 4.0).await.unwrap();
        users.score_link("U1", "ratings", "M2", 2.0).await.unwrap();
        users.score_link("U2", "ratings", "M1", 5.0).await.unwrap();

        let rated: Vec<_> = users
            .links("U1", "ratings", RankOrder::Descending)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| (entry.id, entry.score))
            .collect();
        assert_eq!(rated, vec![("M1".to_string(), 4.0), ("M2".to_string(), 2.0)]);
        assert_eq!(store.ranked_score("movie:M1:ratings", "U2").await.unwrap(), Some(5.0));

        users.delete("U1").await.unwrap();
        assert!(store.ranked_score("movie:M1:ratings", "U1").await.unwrap().is_none());
        assert!(store.ranked_score("movie:M2:ratings", "U1").await.unwrap().is_none());
        assert!(!store.exists("user:U1:ratings").await.unwrap());

        movies.delete("M1").await.unwrap();
        assert!(store.ranked_score("user:U2:ratings", "M1").await.unwrap().is_none());
        assert!(!store.exists("movie:M1:ratings").await.unwrap());

        users.score_link("U2", "ratings", "M2", 3.0).await.unwrap();
        assert!(users.remove_link("U2", "ratings", "M2").await.unwrap());
        assert!(store.ranked_score("movie:M2:ratings", "U2").await.unwrap().is_none());
    }
}

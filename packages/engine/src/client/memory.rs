//! In-process [`StoreClient`] implementation backed by [`DashMap`].
//!
//! Holds every key in one concurrent map and reproduces the observable
//! behavior of a single-node key-value service: typed keys, empty
//! collections disappearing, per-command atomicity, and an availability
//! switch for exercising the store-unavailable path.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kvdex_core::{Fields, RankOrder, ScoredEntry};
use parking_lot::RwLock;
use rand::Rng;

use super::ranked::{normalize_range, RankedSet};
use super::StoreClient;
use crate::error::{StoreError, StoreResult};

/// A stored value. One key holds exactly one kind.
#[derive(Debug, Clone)]
enum Slot {
    Scalar(String),
    Record(Fields),
    List(VecDeque<String>),
    Set(HashSet<String>),
    Ranked(RankedSet),
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Ranked(_) => "ranked set",
        }
    }
}

/// Typed view over a [`Slot`] variant so reads and writes can be written once.
trait Collection: Default {
    const KIND: &'static str;

    fn view(slot: &Slot) -> Option<&Self>;
    fn view_mut(slot: &mut Slot) -> Option<&mut Self>;
    fn into_slot(self) -> Slot;
    /// Whether the key should be dropped after a write.
    fn is_vacant(&self) -> bool;
}

macro_rules! collection {
    ($ty:ty, $variant:ident, $kind:literal, $vacant:expr) => {
        impl Collection for $ty {
            const KIND: &'static str = $kind;

            fn view(slot: &Slot) -> Option<&Self> {
                match slot {
                    Slot::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn view_mut(slot: &mut Slot) -> Option<&mut Self> {
                match slot {
                    Slot::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_slot(self) -> Slot {
                Slot::$variant(self)
            }

            fn is_vacant(&self) -> bool {
                let vacant: fn(&Self) -> bool = $vacant;
                vacant(self)
            }
        }
    };
}

collection!(String, Scalar, "scalar", |_| false);
collection!(Fields, Record, "record", Fields::is_empty);
collection!(VecDeque<String>, List, "list", VecDeque::is_empty);
collection!(HashSet<String>, Set, "set", HashSet::is_empty);
collection!(RankedSet, Ranked, "ranked set", RankedSet::is_empty);

fn wrong_type(key: &str, expected: &'static str, actual: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        actual,
    }
}

/// In-memory key-value store.
///
/// Cheap to share behind `Arc<dyn StoreClient>`; all methods take `&self`.
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    outage: RwLock<Option<String>>,
}

impl MemoryStore {
    /// Creates a new, empty, reachable store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            outage: RwLock::new(None),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn disconnect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%reason, "memory store marked unavailable");
        *self.outage.write() = Some(reason);
    }

    /// Restores availability after [`disconnect`](Self::disconnect).
    pub fn reconnect(&self) {
        *self.outage.write() = None;
    }

    /// Number of live keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Sorted snapshot of every live key starting with `prefix`.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn check(&self) -> StoreResult<()> {
        match &*self.outage.read() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn read<C: Collection, T>(&self, key: &str, f: impl FnOnce(&C) -> T) -> StoreResult<Option<T>> {
        self.check()?;
        let Some(slot) = self.entries.get(key) else {
            return Ok(None);
        };
        match C::view(slot.value()) {
            Some(collection) => Ok(Some(f(collection))),
            None => Err(wrong_type(key, C::KIND, slot.value().kind())),
        }
    }

    /// Mutates the collection at `key`, creating it when `create` is set and
    /// removing it if the write leaves it empty.
    ///
    /// Returns `None` only when the key is absent and `create` is false.
    fn write<C: Collection, T>(
        &self,
        key: &str,
        create: bool,
        f: impl FnOnce(&mut C) -> T,
    ) -> StoreResult<Option<T>> {
        self.check()?;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let actual = occupied.get().kind();
                let Some(collection) = C::view_mut(occupied.get_mut()) else {
                    return Err(wrong_type(key, C::KIND, actual));
                };
                let out = f(collection);
                if collection.is_vacant() {
                    occupied.remove();
                }
                Ok(Some(out))
            }
            Entry::Vacant(vacant) => {
                if !create {
                    return Ok(None);
                }
                let mut collection = C::default();
                let out = f(&mut collection);
                if !collection.is_vacant() {
                    vacant.insert(collection.into_slot());
                }
                Ok(Some(out))
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    // --- Keys and scalars ---

    async fn delete(&self, keys: &[String]) -> StoreResult<usize> {
        self.check()?;
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        Ok(self.entries.contains_key(key))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.read::<String, _>(key, Clone::clone)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.entries
            .insert(key.to_string(), Slot::Scalar(value.to_string()));
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let result = self.write::<String, _>(key, true, |value| {
            let current = if value.is_empty() {
                0
            } else {
                value.parse::<i64>().ok()?
            };
            let next = current.checked_add(delta)?;
            *value = next.to_string();
            Some(next)
        })?;
        result.flatten().ok_or_else(|| StoreError::NotAnInteger {
            key: key.to_string(),
        })
    }

    // --- Records ---

    async fn set_fields(&self, key: &str, fields: &Fields) -> StoreResult<()> {
        self.write::<Fields, _>(key, true, |record| record.merge(fields))?;
        Ok(())
    }

    async fn get_field(&self, key: &str, name: &str) -> StoreResult<Option<String>> {
        Ok(self
            .read::<Fields, _>(key, |record| record.get(name).map(str::to_string))?
            .flatten())
    }

    async fn get_fields(&self, key: &str) -> StoreResult<Fields> {
        Ok(self.read::<Fields, _>(key, Clone::clone)?.unwrap_or_default())
    }

    // --- Lists ---

    async fn push_front(&self, key: &str, value: &str) -> StoreResult<usize> {
        Ok(self
            .write::<VecDeque<String>, _>(key, true, |list| {
                list.push_front(value.to_string());
                list.len()
            })?
            .unwrap_or_default())
    }

    async fn push_back(&self, key: &str, value: &str) -> StoreResult<usize> {
        Ok(self
            .write::<VecDeque<String>, _>(key, true, |list| {
                list.push_back(value.to_string());
                list.len()
            })?
            .unwrap_or_default())
    }

    async fn remove_from_list(&self, key: &str, count: usize, value: &str) -> StoreResult<usize> {
        Ok(self
            .write::<VecDeque<String>, _>(key, false, |list| {
                let mut removed = 0_usize;
                list.retain(|item| {
                    if item == value && (count == 0 || removed < count) {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
                removed
            })?
            .unwrap_or_default())
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        Ok(self
            .read::<VecDeque<String>, _>(key, |list| {
                match normalize_range(start, stop, list.len()) {
                    Some((start, stop)) => list.range(start..=stop).cloned().collect(),
                    None => Vec::new(),
                }
            })?
            .unwrap_or_default())
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .read::<VecDeque<String>, _>(key, VecDeque::len)?
            .unwrap_or_default())
    }

    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        self.write::<VecDeque<String>, _>(key, false, |list| {
            match normalize_range(start, stop, list.len()) {
                Some((start, stop)) => {
                    list.truncate(stop + 1);
                    list.drain(..start);
                }
                None => list.clear(),
            }
        })?;
        Ok(())
    }

    // --- Sets ---

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .write::<HashSet<String>, _>(key, true, |set| set.insert(member.to_string()))?
            .unwrap_or_default())
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .write::<HashSet<String>, _>(key, false, |set| set.remove(member))?
            .unwrap_or_default())
    }

    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .read::<HashSet<String>, _>(key, |set| set.contains(member))?
            .unwrap_or_default())
    }

    async fn set_len(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .read::<HashSet<String>, _>(key, HashSet::len)?
            .unwrap_or_default())
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .read::<HashSet<String>, _>(key, |set| set.iter().cloned().collect())?
            .unwrap_or_default())
    }

    async fn set_sample(&self, key: &str, count: usize) -> StoreResult<Vec<String>> {
        if count == 0 {
            self.check()?;
            return Ok(Vec::new());
        }
        Ok(self
            .read::<HashSet<String>, _>(key, |set| {
                let mut rng = rand::rng();
                let mut reservoir: Vec<String> = Vec::with_capacity(count.min(set.len()));
                for (i, member) in set.iter().enumerate() {
                    if i < count {
                        reservoir.push(member.clone());
                    } else {
                        // Replace an existing sample with probability count / (i + 1)
                        let j = rng.random_range(0..=i);
                        if j < count {
                            reservoir[j] = member.clone();
                        }
                    }
                }
                reservoir
            })?
            .unwrap_or_default())
    }

    // --- Ranked sets ---

    async fn ranked_add(&self, key: &str, member: &str, score: f64) -> StoreResult<bool> {
        if score.is_nan() {
            return Err(StoreError::NotANumber {
                key: key.to_string(),
                member: member.to_string(),
            });
        }
        Ok(self
            .write::<RankedSet, _>(key, true, |ranked| ranked.insert(member, score))?
            .unwrap_or_default())
    }

    async fn ranked_incr(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        let result = self.write::<RankedSet, _>(key, true, |ranked| {
            let next = ranked.score(member).unwrap_or(0.0) + delta;
            if next.is_nan() {
                return None;
            }
            ranked.insert(member, next);
            Some(next)
        })?;
        result.flatten().ok_or_else(|| StoreError::NotANumber {
            key: key.to_string(),
            member: member.to_string(),
        })
    }

    async fn ranked_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .write::<RankedSet, _>(key, false, |ranked| ranked.remove(member))?
            .unwrap_or_default())
    }

    async fn ranked_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        order: RankOrder,
    ) -> StoreResult<Vec<ScoredEntry>> {
        Ok(self
            .read::<RankedSet, _>(key, |ranked| ranked.range_by_rank(start, stop, order))?
            .unwrap_or_default())
    }

    async fn ranked_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ScoredEntry>> {
        Ok(self
            .read::<RankedSet, _>(key, |ranked| ranked.range_by_score(min, max, offset, limit))?
            .unwrap_or_default())
    }

    async fn ranked_rank(
        &self,
        key: &str,
        member: &str,
        order: RankOrder,
    ) -> StoreResult<Option<u64>> {
        Ok(self
            .read::<RankedSet, _>(key, |ranked| ranked.rank(member, order))?
            .flatten())
    }

    async fn ranked_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        Ok(self
            .read::<RankedSet, _>(key, |ranked| ranked.score(member))?
            .flatten())
    }

    async fn ranked_len(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .read::<RankedSet, _>(key, RankedSet::len)?
            .unwrap_or_default())
    }

    async fn ranked_remove_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<usize> {
        Ok(self
            .write::<RankedSet, _>(key, false, |ranked| ranked.remove_by_score(min, max))?
            .unwrap_or_default())
    }
}

//! In-memory aggregates built while rows stream past.
//!
//! Rankings such as "average temperature per sensor" or "units sold per
//! product" cannot be written row by row without increments, which would
//! double count on a re-import. Handlers fold rows into these accumulators
//! instead and publish the totals once, with overwrite semantics, from
//! [`RowHandler::finish`](super::RowHandler::finish).
//!
//! Every `finalize` drains the accumulator and returns entries sorted by key.

use ahash::AHashMap;

/// Running mean per id.
#[derive(Debug, Clone, Default)]
pub struct Averages {
    sums: AHashMap<String, (f64, u64)>,
}

impl Averages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, value: f64) {
        let slot = self.sums.entry(id.to_string()).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }

    /// Current mean for `id` together with its sample count.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<(f64, u64)> {
        self.sums.get(id).map(|&(sum, count)| (mean(sum, count), count))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Means of ids with at least `min_count` samples.
    pub fn finalize(&mut self, min_count: u64) -> Vec<(String, f64)> {
        let mut means: Vec<(String, f64)> = std::mem::take(&mut self.sums)
            .into_iter()
            .filter(|(_, (_, count))| *count >= min_count.max(1))
            .map(|(id, (sum, count))| (id, mean(sum, count)))
            .collect();
        means.sort_by(|a, b| a.0.cmp(&b.0));
        means
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, count: u64) -> f64 {
    sum / count as f64
}

/// Running total per key.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    totals: AHashMap<String, f64>,
}

impl Tally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, amount: f64) {
        *self.totals.entry(key.to_string()).or_insert(0.0) += amount;
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.totals.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn finalize(&mut self) -> Vec<(String, f64)> {
        let mut totals: Vec<(String, f64)> = std::mem::take(&mut self.totals).into_iter().collect();
        totals.sort_by(|a, b| a.0.cmp(&b.0));
        totals
    }
}

/// Most recent value per id, ordered by a caller-supplied timestamp.
#[derive(Debug, Clone)]
pub struct Latest<T> {
    values: AHashMap<String, (f64, T)>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            values: AHashMap::new(),
        }
    }
}

impl<T> Latest<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `value` unless `id` already has one with a later timestamp.
    /// On equal timestamps the newer offer wins.
    pub fn offer(&mut self, id: &str, timestamp: f64, value: T) {
        match self.values.get_mut(id) {
            Some(current) if current.0 > timestamp => {}
            Some(current) => *current = (timestamp, value),
            None => {
                self.values.insert(id.to_string(), (timestamp, value));
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.values.get(id).map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn finalize(&mut self) -> Vec<(String, T)> {
        let mut latest: Vec<(String, T)> = std::mem::take(&mut self.values)
            .into_iter()
            .map(|(id, (_, value))| (id, value))
            .collect();
        latest.sort_by(|a, b| a.0.cmp(&b.0));
        latest
    }
}

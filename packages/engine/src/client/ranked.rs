//! Score-ordered set used by [`MemoryStore`](super::MemoryStore).
//!
//! Keeps a `member → score` map for point lookups alongside a `BTreeSet`
//! ordered by `(score, member)` for rank and score-range scans. Ties on score
//! fall back to byte-wise member order, which makes every read deterministic.

use std::collections::{BTreeSet, HashMap};

use kvdex_core::{RankOrder, ScoredEntry};
use ordered_float::OrderedFloat;

#[derive(Debug, Clone, Default)]
pub(crate) struct RankedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<(OrderedFloat<f64>, String)>,
}

fn to_entry((score, member): &(OrderedFloat<f64>, String)) -> ScoredEntry {
    ScoredEntry::new(member.clone(), score.0)
}

/// Resolves an inclusive `start..=stop` range with negative (from-the-end)
/// indices against a collection of length `len`.
///
/// Returns `None` when the range selects nothing.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

impl RankedSet {
    /// Inserts or overwrites `member`. Returns `true` if it was not present.
    pub(crate) fn insert(&mut self, member: &str, score: f64) -> bool {
        let is_new = match self.scores.insert(member.to_string(), score) {
            Some(old) => {
                self.ordered.remove(&(OrderedFloat(old), member.to_string()));
                false
            }
            None => true,
        };
        self.ordered.insert((OrderedFloat(score), member.to_string()));
        is_new
    }

    pub(crate) fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(OrderedFloat(score), member.to_string()));
                true
            }
            None => false,
        }
    }

    pub(crate) fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.scores.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub(crate) fn rank(&self, member: &str, order: RankOrder) -> Option<u64> {
        let score = *self.scores.get(member)?;
        let ascending = self
            .ordered
            .range(..(OrderedFloat(score), member.to_string()))
            .count();
        let rank = if order.is_descending() {
            self.len() - 1 - ascending
        } else {
            ascending
        };
        u64::try_from(rank).ok()
    }

    pub(crate) fn range_by_rank(&self, start: i64, stop: i64, order: RankOrder) -> Vec<ScoredEntry> {
        let Some((start, stop)) = normalize_range(start, stop, self.len()) else {
            return Vec::new();
        };
        let take = stop - start + 1;
        if order.is_descending() {
            self.ordered.iter().rev().skip(start).take(take).map(to_entry).collect()
        } else {
            self.ordered.iter().skip(start).take(take).map(to_entry).collect()
        }
    }

    pub(crate) fn range_by_score(
        &self,
        min: f64,
        max: f64,
        offset: usize,
        limit: Option<usize>,
    ) -> Vec<ScoredEntry> {
        if min.is_nan() || max.is_nan() || min > max {
            return Vec::new();
        }
        self.ordered
            .range((OrderedFloat(min), String::new())..)
            .take_while(|(score, _)| score.0 <= max)
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(to_entry)
            .collect()
    }

    pub(crate) fn remove_by_score(&mut self, min: f64, max: f64) -> usize {
        let doomed: Vec<String> = self
            .range_by_score(min, max, 0, None)
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        for member in &doomed {
            self.remove(member);
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ids(entries: &[ScoredEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn normalize_range_handles_negative_and_out_of_bounds() {
        assert_eq!(normalize_range(0, -1, 5), Some((0, 4)));
        assert_eq!(normalize_range(-2, -1, 5), Some((3, 4)));
        assert_eq!(normalize_range(1, 100, 5), Some((1, 4)));
        assert_eq!(normalize_range(-100, 1, 5), Some((0, 1)));
        assert_eq!(normalize_range(3, 1, 5), None);
        assert_eq!(normalize_range(5, 9, 5), None);
        assert_eq!(normalize_range(0, -1, 0), None);
        assert_eq!(normalize_range(0, -6, 5), None);
    }

    #[test]
    fn overwrite_moves_member_to_new_position() {
        let mut set = RankedSet::default();
        assert!(set.insert("a", 1.0));
        assert!(set.insert("b", 2.0));
        assert!(!set.insert("a", 3.0));

        assert_eq!(set.len(), 2);
        assert_eq!(ids(&set.range_by_rank(0, -1, RankOrder::Ascending)), vec!["b", "a"]);
        assert_eq!(set.score("a"), Some(3.0));
    }

    #[test]
    fn ties_are_ordered_by_member() {
        let mut set = RankedSet::default();
        set.insert("c", 1.0);
        set.insert("a", 1.0);
        set.insert("b", 1.0);

        assert_eq!(ids(&set.range_by_rank(0, -1, RankOrder::Ascending)), vec!["a", "b", "c"]);
        assert_eq!(ids(&set.range_by_rank(0, -1, RankOrder::Descending)), vec!["c", "b", "a"]);
        assert_eq!(set.rank("a", RankOrder::Ascending), Some(0));
        assert_eq!(set.rank("a", RankOrder::Descending), Some(2));
    }

    #[test]
    fn score_range_is_inclusive_with_offset_and_limit() {
        let mut set = RankedSet::default();
        for (member, score) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)] {
            set.insert(member, score);
        }

        assert_eq!(ids(&set.range_by_score(2.0, 4.0, 0, None)), vec!["b", "c", "d"]);
        assert_eq!(ids(&set.range_by_score(2.0, 4.0, 1, Some(1))), vec!["c"]);
        assert!(set.range_by_score(4.0, 2.0, 0, None).is_empty());
        assert!(set.range_by_score(f64::NAN, 2.0, 0, None).is_empty());
        assert_eq!(ids(&set.range_by_score(f64::NEG_INFINITY, f64::INFINITY, 0, Some(2))), vec!["a", "b"]);
    }

    #[test]
    fn remove_by_score_drops_only_matching_entries() {
        let mut set = RankedSet::default();
        for (member, score) in [("a", 10.0), ("b", 20.0), ("c", 30.0)] {
            set.insert(member, score);
        }

        assert_eq!(set.remove_by_score(f64::NEG_INFINITY, 20.0), 2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.score("c"), Some(30.0));
        assert!(set.rank("a", RankOrder::Ascending).is_none());
    }

    proptest! {
        #[test]
        fn descending_prefix_holds_the_highest_scores(
            scores in proptest::collection::hash_map("[a-f]{1,3}", -1000i32..1000, 0..40),
            k in 1usize..10,
        ) {
            let mut set = RankedSet::default();
            for (member, score) in &scores {
                set.insert(member, f64::from(*score));
            }

            let mut expected: Vec<(f64, String)> = scores
                .iter()
                .map(|(m, s)| (f64::from(*s), m.clone()))
                .collect();
            expected.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
            expected.truncate(k);

            let stop = i64::try_from(k).unwrap() - 1;
            let top = set.range_by_rank(0, stop, RankOrder::Descending);
            let got: Vec<(f64, String)> = top.iter().map(|e| (e.score, e.id.clone())).collect();
            prop_assert_eq!(&got, &expected);
            prop_assert_eq!(top, set.range_by_rank(0, stop, RankOrder::Descending));
        }

        #[test]
        fn score_range_respects_bounds_and_order(
            scores in proptest::collection::hash_map("[a-z]{1,4}", -50i32..50, 0..60),
            min in -60i32..60,
            span in 0i32..40,
            limit in 0usize..20,
        ) {
            let mut set = RankedSet::default();
            for (member, score) in &scores {
                set.insert(member, f64::from(*score));
            }
            let (min, max) = (f64::from(min), f64::from(min + span));

            let got = set.range_by_score(min, max, 0, Some(limit));
            prop_assert!(got.len() <= limit);
            prop_assert!(got.iter().all(|e| e.score >= min && e.score <= max));
            prop_assert!(got.windows(2).all(|w| w[0].score <= w[1].score));

            let in_bounds = scores.values().filter(|s| f64::from(**s) >= min && f64::from(**s) <= max).count();
            prop_assert_eq!(got.len(), in_bounds.min(limit));
        }
    }
}

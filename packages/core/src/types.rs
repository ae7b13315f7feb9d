use serde::{Deserialize, Serialize};

/// One entry of a ranked collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    /// Identifier (or encoded event payload, in time-series mode).
    pub id: String,
    /// Numeric score the collection is ordered by.
    pub score: f64,
}

impl ScoredEntry {
    #[must_use]
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Direction in which a ranked collection is read.
///
/// Ascending order is by score, then by identifier. Descending order is the
/// exact reverse, so ties come out in reverse identifier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankOrder {
    #[default]
    Ascending,
    Descending,
}

impl RankOrder {
    #[must_use]
    pub fn is_descending(self) -> bool {
        matches!(self, Self::Descending)
    }
}

//! Secondary index structures layered on the store's collection types.
//!
//! - [`RelationshipIndex`]: parent → ordered child ids (lists)
//! - [`PartitionIndex`]: named membership sets (sets)
//! - [`RankingIndex`]: id → score leaderboards (ranked sets)
//! - [`TimeSeries`]: one ranked entry per event, typed payload, epoch score
//!
//! Each structure offers immediate async operations and `*_op` builders that
//! produce [`WriteOp`](crate::client::WriteOp)s for batched loading.

pub mod partition;
pub mod ranking;
pub mod relationship;
pub mod timeseries;

pub use partition::PartitionIndex;
pub use ranking::RankingIndex;
pub use relationship::RelationshipIndex;
pub use timeseries::TimeSeries;

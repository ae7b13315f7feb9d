//! Record storage over a [`StoreClient`](crate::client::StoreClient).
//!
//! A record is a field-map addressed by `{type}:{id}`. [`RecordStore`] is the
//! only component that reads or writes record keys; index maintenance lives
//! in [`index`](crate::index) and [`consistency`](crate::consistency).

pub mod record_store;

pub use record_store::RecordStore;

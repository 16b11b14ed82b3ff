//! Shared item collection and the pure functions that derive views from it.
//!
//! [`AggregationStore`] is the only owner of mutable item state. The
//! functions in [`filter`] are pure and dialect-agnostic; the store applies
//! them under its lock and hands out snapshots.

pub mod filter;
mod store;
mod view;

pub use filter::{
    dedupe_by_channel, filter_by_link, filter_by_search, filter_by_time, filter_by_time_at,
    sort_by_direction, Dedup,
};
pub use store::AggregationStore;
pub use view::{FeedView, UniqueView};

//! Cache contracts and reference implementations
//!
//! Short-lived snapshots (availability, rating projection, per-user claim
//! lists) and the per-job lease marker live here. Everything except the
//! lease marker is rebuildable from the durable store.

pub mod snapshot_cache;

pub use snapshot_cache::{InMemoryCache, SnapshotCache};

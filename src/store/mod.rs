//! Durable store contracts and reference implementations
//!
//! The durable store is the single source of truth: row-tracked statistics
//! reads, append-only ledger inserts, and one atomic commit per request.

pub mod rating_store;

pub use rating_store::{InMemoryRatingStore, RatingCommit, RatingStore};

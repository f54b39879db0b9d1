//! Scriptorium - Elo rating and job-claim coordination service
//!
//! This crate tracks skill ratings for transcription QA workers across
//! pairwise and three-way comparison resolutions, and coordinates exclusive
//! job claiming with lease-based mutual exclusion, eligibility gating, and
//! availability bookkeeping.

pub mod cache;
pub mod claim;
pub mod config;
pub mod error;
pub mod rating;
pub mod relay;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{EloServiceError, Result};
pub use types::*;

// Re-export key components
pub use cache::SnapshotCache;
pub use claim::ClaimCoordinator;
pub use rating::RatingEngine;
pub use relay::NotificationRelay;
pub use store::RatingStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

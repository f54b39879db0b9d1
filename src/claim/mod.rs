//! Job-claim coordination: eligibility gating plus lease-based mutual
//! exclusion over the snapshot cache

pub mod coordinator;

pub use coordinator::{ClaimCoordinator, ClaimPhase};

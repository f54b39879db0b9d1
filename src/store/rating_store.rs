//! Rating store interface and in-memory implementation
//!
//! This module defines the durable-store contract consumed by the rating
//! engine and the claim coordinator, plus an in-memory implementation used
//! by tests and local development wiring.

use crate::error::EloServiceError;
use crate::types::{
    ClaimStatus, JobClaim, JobCompletionEntry, JobId, RatingHistoryEntry, RatingStats, UserId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Everything one request writes, applied atomically
///
/// Statistics rows replace the previous row for their user; history,
/// completion, and claim rows are append-only.
#[derive(Debug, Clone, Default)]
pub struct RatingCommit {
    pub stats: Vec<RatingStats>,
    pub history: Vec<RatingHistoryEntry>,
    pub completions: Vec<JobCompletionEntry>,
    pub claims: Vec<JobClaim>,
}

impl RatingCommit {
    /// A commit carrying only a durable job claim
    pub fn claim_only(claim: JobClaim) -> Self {
        Self {
            claims: vec![claim],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
            && self.history.is_empty()
            && self.completions.is_empty()
            && self.claims.is_empty()
    }
}

/// Trait for durable rating storage operations
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Get one user's statistics row
    async fn get_stats(&self, user_id: &UserId) -> crate::error::Result<Option<RatingStats>>;

    /// Get statistics rows for multiple users (absent users are omitted)
    async fn get_stats_many(
        &self,
        user_ids: &[UserId],
    ) -> crate::error::Result<HashMap<UserId, RatingStats>>;

    /// Create a seeded statistics row at registration
    async fn create_stats(&self, stats: RatingStats) -> crate::error::Result<()>;

    /// Load one user's rating ledger ordered by `changed_at` ascending
    async fn load_history(&self, user_id: &UserId)
        -> crate::error::Result<Vec<RatingHistoryEntry>>;

    /// Load the rating ledger for multiple users in one scan
    async fn load_history_many(
        &self,
        user_ids: &[UserId],
    ) -> crate::error::Result<Vec<RatingHistoryEntry>>;

    /// Load one user's job completion ledger ordered by `completed_at` ascending
    async fn load_completions(
        &self,
        user_id: &UserId,
    ) -> crate::error::Result<Vec<JobCompletionEntry>>;

    /// Find the active durable claim for a job, if any
    async fn find_active_claim(&self, job_id: &JobId) -> crate::error::Result<Option<JobClaim>>;

    /// Apply a commit atomically (all-or-nothing)
    async fn commit(&self, commit: RatingCommit) -> crate::error::Result<()>;
}

#[derive(Debug, Default)]
struct StoreState {
    stats: HashMap<UserId, RatingStats>,
    history: Vec<RatingHistoryEntry>,
    completions: Vec<JobCompletionEntry>,
    claims: Vec<JobClaim>,
}

/// In-memory rating store
///
/// A single mutex over all four tables makes `commit` naturally atomic, the
/// same serialization point a relational store provides with row-tracked
/// transactions.
#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    state: Mutex<StoreState>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> crate::error::Result<std::sync::MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| {
            EloServiceError::InternalError {
                message: "Failed to acquire store lock".to_string(),
            }
            .into()
        })
    }

    /// Number of durable claims held (for tests and debugging)
    pub fn claim_count(&self) -> usize {
        self.state.lock().map(|s| s.claims.len()).unwrap_or(0)
    }

    /// Snapshot of all durable claims (for tests and debugging)
    pub fn claims(&self) -> Vec<JobClaim> {
        self.state.lock().map(|s| s.claims.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn get_stats(&self, user_id: &UserId) -> crate::error::Result<Option<RatingStats>> {
        let state = self.lock()?;
        Ok(state.stats.get(user_id).cloned())
    }

    async fn get_stats_many(
        &self,
        user_ids: &[UserId],
    ) -> crate::error::Result<HashMap<UserId, RatingStats>> {
        let state = self.lock()?;
        let mut result = HashMap::new();
        for user_id in user_ids {
            if let Some(stats) = state.stats.get(user_id) {
                result.insert(user_id.clone(), stats.clone());
            }
        }
        Ok(result)
    }

    async fn create_stats(&self, stats: RatingStats) -> crate::error::Result<()> {
        let mut state = self.lock()?;
        if state.stats.contains_key(&stats.user_id) {
            return Err(EloServiceError::conflict(format!(
                "rating stats already exist for user {}",
                stats.user_id
            ))
            .into());
        }
        state.stats.insert(stats.user_id.clone(), stats);
        Ok(())
    }

    async fn load_history(
        &self,
        user_id: &UserId,
    ) -> crate::error::Result<Vec<RatingHistoryEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<RatingHistoryEntry> = state
            .history
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.changed_at);
        Ok(entries)
    }

    async fn load_history_many(
        &self,
        user_ids: &[UserId],
    ) -> crate::error::Result<Vec<RatingHistoryEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<RatingHistoryEntry> = state
            .history
            .iter()
            .filter(|e| user_ids.contains(&e.user_id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.changed_at);
        Ok(entries)
    }

    async fn load_completions(
        &self,
        user_id: &UserId,
    ) -> crate::error::Result<Vec<JobCompletionEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<JobCompletionEntry> = state
            .completions
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.completed_at);
        Ok(entries)
    }

    async fn find_active_claim(&self, job_id: &JobId) -> crate::error::Result<Option<JobClaim>> {
        let state = self.lock()?;
        Ok(state
            .claims
            .iter()
            .find(|c| &c.job_id == job_id && c.status == ClaimStatus::Active)
            .cloned())
    }

    async fn commit(&self, commit: RatingCommit) -> crate::error::Result<()> {
        let mut state = self.lock()?;

        // Everything lands under the one lock, so a failed validation above
        // this point leaves no partial writes behind.
        for stats in commit.stats {
            state.stats.insert(stats.user_id.clone(), stats);
        }
        state.history.extend(commit.history);
        state.completions.extend(commit.completions);
        state.claims.extend(commit.claims);

        Ok(())
    }
}

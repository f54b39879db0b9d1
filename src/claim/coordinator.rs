//! Claim coordinator
//!
//! One `claim_job` call runs the full pipeline: duplicate check, rating
//! read-through, availability and eligibility gates, then the short-lived
//! per-job lease. Every eligibility check happens before the lease attempt
//! so rejected callers never hold the marker. The durable `JobClaim` row is
//! written while the lease is held; the lease is released immediately
//! after, leaving the book-out window as the lasting reservation.

use crate::cache::SnapshotCache;
use crate::config::{CacheTtlConfig, ClaimConfig};
use crate::error::{EloServiceError, Result};
use crate::rating::RatingEngine;
use crate::relay::{AvailabilityUpdatedNotice, JobClaimedNotice, NotificationRelay};
use crate::store::{RatingCommit, RatingStore};
use crate::types::{
    AvailabilitySnapshot, AvailabilityStatus, ClaimOutcome, ClaimRequest, ClaimStatus, JobClaim,
    JobId, TieBreakerClaim, UserId,
};
use crate::utils::{current_timestamp, generate_claim_id};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phases a claim attempt moves through, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPhase {
    Unclaimed,
    Validated,
    LockAcquired,
    Committed,
    LockReleased,
    Rejected,
}

/// The claim coordinator
pub struct ClaimCoordinator {
    store: Arc<dyn RatingStore>,
    cache: Arc<dyn SnapshotCache>,
    relay: Arc<dyn NotificationRelay>,
    rating: Arc<RatingEngine>,
    config: ClaimConfig,
    ttl: CacheTtlConfig,
}

impl ClaimCoordinator {
    pub fn new(
        store: Arc<dyn RatingStore>,
        cache: Arc<dyn SnapshotCache>,
        relay: Arc<dyn NotificationRelay>,
        rating: Arc<RatingEngine>,
        config: ClaimConfig,
        ttl: CacheTtlConfig,
    ) -> Self {
        Self {
            store,
            cache,
            relay,
            rating,
            config,
            ttl,
        }
    }

    fn rejected(user_id: &UserId, job_id: &JobId, reason: String) -> anyhow::Error {
        debug!(
            phase = ?ClaimPhase::Rejected,
            user_id = %user_id,
            job_id = %job_id,
            %reason,
            "Claim attempt rejected"
        );
        EloServiceError::conflict(reason).into()
    }

    /// Attempt to claim a job for a worker
    pub async fn claim_job(
        &self,
        user_id: &UserId,
        request: ClaimRequest,
    ) -> Result<ClaimOutcome> {
        let job_id = request.job_id.clone();
        debug!(
            phase = ?ClaimPhase::Unclaimed,
            user_id = %user_id,
            job_id = %job_id,
            "Claim attempt started"
        );

        // Duplicate claim by the same caller.
        let held = self.cache.get_claims(user_id).await?;
        if held.contains(&job_id) {
            return Err(Self::rejected(
                user_id,
                &job_id,
                format!("user {} already claimed job {}", user_id, job_id),
            ));
        }

        // Rating read-through; an unknown user surfaces NotFound here.
        let rating = match self.cache.get_rating(user_id).await? {
            Some(snapshot) => snapshot,
            None => {
                self.rating
                    .rebuild_snapshot(user_id, self.config.trend_window_days)
                    .await?
            }
        };

        let availability = match self.cache.get_availability(user_id).await? {
            Some(snapshot) if snapshot.status == AvailabilityStatus::Available => snapshot,
            Some(snapshot) => {
                return Err(Self::rejected(
                    user_id,
                    &job_id,
                    format!("user {} is not available (status {})", user_id, snapshot.status),
                ));
            }
            None => {
                return Err(Self::rejected(
                    user_id,
                    &job_id,
                    format!("no availability declared for user {}", user_id),
                ));
            }
        };
        if !availability.has_capacity() {
            return Err(Self::rejected(
                user_id,
                &job_id,
                format!(
                    "user {} is at capacity ({}/{})",
                    user_id, availability.current_workload, availability.max_concurrent_jobs
                ),
            ));
        }

        if request.excluded_user_ids.contains(user_id) {
            return Err(Self::rejected(
                user_id,
                &job_id,
                format!("user {} is excluded from job {}", user_id, job_id),
            ));
        }
        if let Some(min_elo) = request.min_elo {
            if rating.current_elo < min_elo {
                return Err(Self::rejected(
                    user_id,
                    &job_id,
                    format!(
                        "user {} rating {} is below the job minimum {}",
                        user_id, rating.current_elo, min_elo
                    ),
                ));
            }
        }

        debug!(phase = ?ClaimPhase::Validated, user_id = %user_id, job_id = %job_id, "Eligibility checks passed");

        // The lease is the sole cross-worker mutual exclusion; a crashed
        // holder self-heals when the marker expires.
        if !self
            .cache
            .acquire_lease(&job_id, user_id, self.ttl.lease())
            .await?
        {
            return Err(Self::rejected(
                user_id,
                &job_id,
                format!("job {} is already claimed", job_id),
            ));
        }
        debug!(phase = ?ClaimPhase::LockAcquired, user_id = %user_id, job_id = %job_id, "Lease acquired");

        // A finished claim outlives its lease; the durable row is what
        // blocks a second worker after release.
        match self.store.find_active_claim(&job_id).await {
            Ok(Some(existing)) => {
                self.release_lease_quietly(&job_id).await;
                return Err(Self::rejected(
                    user_id,
                    &job_id,
                    format!("job {} is already claimed by user {}", job_id, existing.user_id),
                ));
            }
            Ok(None) => {}
            Err(e) => {
                self.release_lease_quietly(&job_id).await;
                return Err(e);
            }
        }

        let now = current_timestamp();
        let claim = JobClaim {
            id: generate_claim_id(),
            user_id: user_id.clone(),
            job_id: job_id.clone(),
            claimed_at: now,
            book_out_expires_at: now + self.config.book_out_window(),
            status: ClaimStatus::Active,
        };
        if let Err(e) = self.store.commit(RatingCommit::claim_only(claim.clone())).await {
            self.release_lease_quietly(&job_id).await;
            return Err(e);
        }
        debug!(phase = ?ClaimPhase::Committed, user_id = %user_id, job_id = %job_id, "Durable claim written");

        // Cache bookkeeping after the durable row exists. Failures here
        // are logged only; the durable claim already holds.
        //
        // The workload write is read-modify-write: the cache contract has
        // no atomic increment, so two overlapping claims by one worker on
        // different jobs can lose an increment and briefly overshoot the
        // ceiling. The snapshot self-corrects at TTL expiry.
        let mut updated = availability;
        updated.current_workload += 1;
        updated.last_update = now;
        if let Err(e) = self
            .cache
            .set_availability(user_id, updated.clone(), self.ttl.availability())
            .await
        {
            warn!(user_id = %user_id, "Failed to update cached workload: {}", e);
        }
        if let Err(e) = self
            .cache
            .add_claim(user_id, &job_id, self.ttl.claim_list())
            .await
        {
            warn!(user_id = %user_id, job_id = %job_id, "Failed to update cached claim list: {}", e);
        }

        self.release_lease_quietly(&job_id).await;
        debug!(phase = ?ClaimPhase::LockReleased, user_id = %user_id, job_id = %job_id, "Lease released");

        info!(
            user_id = %user_id,
            job_id = %job_id,
            claim_id = %claim.id,
            book_out_expires_at = %claim.book_out_expires_at,
            "Job claimed"
        );

        let notice = JobClaimedNotice {
            user_id: user_id.clone(),
            job_id: job_id.clone(),
            claim_id: claim.id,
            book_out_expires_at: claim.book_out_expires_at,
        };
        if let Err(e) = self.relay.job_claimed(notice).await {
            warn!(job_id = %job_id, "Job-claimed dispatch failed after commit: {}", e);
        }

        let book_out_expires_at = claim.book_out_expires_at;
        Ok(ClaimOutcome {
            claim,
            availability: updated,
            rating,
            book_out_expires_at,
        })
    }

    /// Claim the original job on behalf of a tiebreaker candidate
    ///
    /// The exclusion list names the original transcribers; the flag reports
    /// whether the caller was among them before the pipeline rejects.
    pub async fn validate_tiebreaker_claim(
        &self,
        user_id: &UserId,
        original_job_id: &JobId,
        excluded_user_ids: Vec<UserId>,
        min_elo: Option<i32>,
    ) -> Result<TieBreakerClaim> {
        let caller_excluded = excluded_user_ids.contains(user_id);
        let request = ClaimRequest {
            job_id: original_job_id.clone(),
            excluded_user_ids,
            min_elo,
        };
        let outcome = self.claim_job(user_id, request).await?;
        Ok(TieBreakerClaim {
            caller_excluded,
            outcome,
        })
    }

    /// Patch a worker's availability snapshot
    ///
    /// The cached workload survives status changes; the concurrency ceiling
    /// falls back to the configured default when never declared.
    pub async fn update_availability(
        &self,
        user_id: &UserId,
        status: AvailabilityStatus,
        max_concurrent_jobs: Option<u32>,
    ) -> Result<AvailabilitySnapshot> {
        let existing = self.cache.get_availability(user_id).await?;
        let snapshot = AvailabilitySnapshot {
            status,
            max_concurrent_jobs: max_concurrent_jobs
                .or(existing.as_ref().map(|s| s.max_concurrent_jobs))
                .unwrap_or(self.config.default_max_concurrent_jobs),
            current_workload: existing.map(|s| s.current_workload).unwrap_or(0),
            last_update: current_timestamp(),
        };
        self.cache
            .set_availability(user_id, snapshot.clone(), self.ttl.availability())
            .await?;

        let notice = AvailabilityUpdatedNotice {
            user_id: user_id.clone(),
            status: snapshot.status,
            max_concurrent_jobs: snapshot.max_concurrent_jobs,
            current_workload: snapshot.current_workload,
        };
        if let Err(e) = self.relay.availability_updated(notice).await {
            warn!(user_id = %user_id, "Availability-updated dispatch failed: {}", e);
        }

        Ok(snapshot)
    }

    /// Availability snapshots for many workers; absent workers are omitted
    pub async fn get_availability_bulk(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, AvailabilitySnapshot>> {
        self.cache.get_availability_many(user_ids).await
    }

    async fn release_lease_quietly(&self, job_id: &JobId) {
        if let Err(e) = self.cache.release_lease(job_id).await {
            warn!(job_id = %job_id, "Failed to release claim lease: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::RatingConfig;
    use crate::error::error_kind;
    use crate::relay::MockRelay;
    use crate::store::InMemoryRatingStore;

    struct Harness {
        store: Arc<InMemoryRatingStore>,
        cache: Arc<InMemoryCache>,
        relay: Arc<MockRelay>,
        engine: Arc<RatingEngine>,
        coordinator: ClaimCoordinator,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryRatingStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let relay = Arc::new(MockRelay::new());
        let engine = Arc::new(RatingEngine::new(
            store.clone(),
            cache.clone(),
            relay.clone(),
            RatingConfig::default(),
            CacheTtlConfig::default(),
        ));
        let coordinator = ClaimCoordinator::new(
            store.clone(),
            cache.clone(),
            relay.clone(),
            engine.clone(),
            ClaimConfig::default(),
            CacheTtlConfig::default(),
        );
        Harness {
            store,
            cache,
            relay,
            engine,
            coordinator,
        }
    }

    async fn ready_worker(h: &Harness, user: &str) {
        h.engine.register_user(&user.to_string()).await.unwrap();
        h.coordinator
            .update_availability(&user.to_string(), AvailabilityStatus::Available, Some(3))
            .await
            .unwrap();
    }

    fn assert_conflict(err: &anyhow::Error) {
        assert!(matches!(
            error_kind(err),
            Some(EloServiceError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_successful_claim() {
        let h = harness();
        ready_worker(&h, "u1").await;

        let outcome = h
            .coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap();

        assert_eq!(outcome.claim.user_id, "u1");
        assert_eq!(outcome.claim.job_id, "job-1");
        assert_eq!(outcome.claim.status, ClaimStatus::Active);
        assert_eq!(outcome.availability.current_workload, 1);
        assert_eq!(outcome.rating.current_elo, 1200);
        assert_eq!(outcome.book_out_expires_at, outcome.claim.book_out_expires_at);

        // Durable row present, claim list updated, lease no longer held.
        assert_eq!(h.store.claim_count(), 1);
        assert_eq!(
            h.cache.get_claims(&"u1".to_string()).await.unwrap(),
            vec!["job-1".to_string()]
        );
        assert!(h.cache.get_lease(&"job-1".to_string()).await.unwrap().is_none());
        assert_eq!(h.relay.count_of("job_claimed"), 1);
    }

    #[tokio::test]
    async fn test_duplicate_claim_by_same_user_rejected() {
        let h = harness();
        ready_worker(&h, "u1").await;

        h.coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap();
        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap_err();
        assert_conflict(&err);
        assert_eq!(h.store.claim_count(), 1);
    }

    #[tokio::test]
    async fn test_claim_by_second_user_rejected_after_release() {
        let h = harness();
        ready_worker(&h, "u1").await;
        ready_worker(&h, "u2").await;

        h.coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap();

        // u1's lease is long gone, but the durable claim still blocks u2.
        let err = h
            .coordinator
            .claim_job(&"u2".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap_err();
        assert_conflict(&err);
        assert_eq!(h.store.claim_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let h = harness();
        let err = h
            .coordinator
            .claim_job(&"ghost".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(EloServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unavailable_worker_rejected() {
        let h = harness();
        h.engine.register_user(&"u1".to_string()).await.unwrap();

        // No availability declared at all.
        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap_err();
        assert_conflict(&err);

        h.coordinator
            .update_availability(&"u1".to_string(), AvailabilityStatus::Busy, Some(3))
            .await
            .unwrap();
        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap_err();
        assert_conflict(&err);
    }

    #[tokio::test]
    async fn test_worker_at_capacity_rejected() {
        let h = harness();
        h.engine.register_user(&"u1".to_string()).await.unwrap();
        h.coordinator
            .update_availability(&"u1".to_string(), AvailabilityStatus::Available, Some(2))
            .await
            .unwrap();

        h.coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap();
        h.coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-2"))
            .await
            .unwrap();

        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-3"))
            .await
            .unwrap_err();
        assert_conflict(&err);
        assert_eq!(h.store.claim_count(), 2);
    }

    #[tokio::test]
    async fn test_excluded_user_rejected() {
        let h = harness();
        ready_worker(&h, "u1").await;

        let mut request = ClaimRequest::new("job-1");
        request.excluded_user_ids = vec!["u1".to_string()];
        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), request)
            .await
            .unwrap_err();
        assert_conflict(&err);
    }

    #[tokio::test]
    async fn test_min_elo_gate() {
        let h = harness();
        ready_worker(&h, "u1").await;

        let mut request = ClaimRequest::new("job-1");
        request.min_elo = Some(1300);
        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), request)
            .await
            .unwrap_err();
        assert_conflict(&err);

        // Exactly at the bar passes.
        let mut request = ClaimRequest::new("job-1");
        request.min_elo = Some(1200);
        h.coordinator
            .claim_job(&"u1".to_string(), request)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_held_lease_rejects_and_is_not_consumed_by_failed_checks() {
        let h = harness();
        ready_worker(&h, "u1").await;
        ready_worker(&h, "u2").await;

        h.cache
            .acquire_lease(
                &"job-1".to_string(),
                &"u2".to_string(),
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        let err = h
            .coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap_err();
        assert_conflict(&err);
        assert_eq!(h.store.claim_count(), 0);

        // A rejection before the lease step leaves a free job unleased.
        let mut request = ClaimRequest::new("job-2");
        request.min_elo = Some(9000);
        h.coordinator
            .claim_job(&"u1".to_string(), request)
            .await
            .unwrap_err();
        assert!(h.cache.get_lease(&"job-2".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_exactly_one_wins() {
        let h = harness();
        ready_worker(&h, "u1").await;
        ready_worker(&h, "u2").await;

        let u1 = "u1".to_string();
        let u2 = "u2".to_string();
        let first = h
            .coordinator
            .claim_job(&u1, ClaimRequest::new("job-1"));
        let second = h
            .coordinator
            .claim_job(&u2, ClaimRequest::new("job-1"));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(
            a.is_ok() as usize + b.is_ok() as usize,
            1,
            "exactly one claim should win"
        );
        assert_eq!(h.store.claim_count(), 1);
        assert_eq!(h.relay.count_of("job_claimed"), 1);
    }

    #[tokio::test]
    async fn test_tiebreaker_claim_excludes_originals() {
        let h = harness();
        ready_worker(&h, "o1").await;
        ready_worker(&h, "tb").await;

        // An original transcriber cannot take its own tie-break.
        let err = h
            .coordinator
            .validate_tiebreaker_claim(
                &"o1".to_string(),
                &"job-1".to_string(),
                vec!["o1".to_string(), "o2".to_string()],
                None,
            )
            .await
            .unwrap_err();
        assert_conflict(&err);

        let claim = h
            .coordinator
            .validate_tiebreaker_claim(
                &"tb".to_string(),
                &"job-1".to_string(),
                vec!["o1".to_string(), "o2".to_string()],
                None,
            )
            .await
            .unwrap();
        assert!(!claim.caller_excluded);
        assert_eq!(claim.outcome.claim.user_id, "tb");
    }

    #[tokio::test]
    async fn test_update_availability_preserves_workload() {
        let h = harness();
        ready_worker(&h, "u1").await;

        h.coordinator
            .claim_job(&"u1".to_string(), ClaimRequest::new("job-1"))
            .await
            .unwrap();

        let snapshot = h
            .coordinator
            .update_availability(&"u1".to_string(), AvailabilityStatus::Busy, None)
            .await
            .unwrap();
        assert_eq!(snapshot.status, AvailabilityStatus::Busy);
        assert_eq!(snapshot.current_workload, 1);
        assert_eq!(snapshot.max_concurrent_jobs, 3);

        // Every patch emits an availability event.
        assert_eq!(h.relay.count_of("availability_updated"), 2);
    }

    #[tokio::test]
    async fn test_update_availability_defaults_ceiling() {
        let h = harness();
        let snapshot = h
            .coordinator
            .update_availability(&"u1".to_string(), AvailabilityStatus::Available, None)
            .await
            .unwrap();
        assert_eq!(
            snapshot.max_concurrent_jobs,
            ClaimConfig::default().default_max_concurrent_jobs
        );
    }

    #[tokio::test]
    async fn test_get_availability_bulk_omits_unknown() {
        let h = harness();
        ready_worker(&h, "u1").await;

        let found = h
            .coordinator
            .get_availability_bulk(&["u1".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("u1"));
    }
}

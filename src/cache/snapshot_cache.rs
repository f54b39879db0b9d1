//! Snapshot cache interface and in-memory implementation
//!
//! The cache stores opaque short-lived snapshots keyed by user or job;
//! schema ownership belongs to the engine and the coordinator, not the
//! store. The per-job lease marker is the sole mutual-exclusion mechanism
//! for in-flight claim attempts.

use crate::error::EloServiceError;
use crate::types::{AvailabilitySnapshot, JobId, RatingSnapshot, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Trait for snapshot cache operations
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Get a worker's availability snapshot
    async fn get_availability(
        &self,
        user_id: &UserId,
    ) -> crate::error::Result<Option<AvailabilitySnapshot>>;

    /// Store a worker's availability snapshot
    async fn set_availability(
        &self,
        user_id: &UserId,
        snapshot: AvailabilitySnapshot,
        ttl: Duration,
    ) -> crate::error::Result<()>;

    /// Bulk fan-out/gather of availability snapshots (absent users omitted)
    async fn get_availability_many(
        &self,
        user_ids: &[UserId],
    ) -> crate::error::Result<HashMap<UserId, AvailabilitySnapshot>>;

    /// Get a user's rating snapshot
    async fn get_rating(&self, user_id: &UserId)
        -> crate::error::Result<Option<RatingSnapshot>>;

    /// Store a user's rating snapshot
    async fn set_rating(
        &self,
        user_id: &UserId,
        snapshot: RatingSnapshot,
        ttl: Duration,
    ) -> crate::error::Result<()>;

    /// Get the user's cached claim-id list (empty when absent or expired)
    async fn get_claims(&self, user_id: &UserId) -> crate::error::Result<Vec<JobId>>;

    /// Append a job id to the user's claim list
    async fn add_claim(
        &self,
        user_id: &UserId,
        job_id: &JobId,
        ttl: Duration,
    ) -> crate::error::Result<()>;

    /// Remove a job id from the user's claim list
    async fn remove_claim(&self, user_id: &UserId, job_id: &JobId) -> crate::error::Result<()>;

    /// Write the per-job lease marker only if absent; true means acquired
    async fn acquire_lease(
        &self,
        job_id: &JobId,
        holder: &UserId,
        ttl: Duration,
    ) -> crate::error::Result<bool>;

    /// Delete the per-job lease marker
    async fn release_lease(&self, job_id: &JobId) -> crate::error::Result<()>;

    /// Current lease holder, if any
    async fn get_lease(&self, job_id: &JobId) -> crate::error::Result<Option<UserId>>;
}

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    deadline: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            deadline: Instant::now() + ttl,
        }
    }

    fn live(&self) -> bool {
        Instant::now() < self.deadline
    }
}

/// In-memory snapshot cache with lazy per-entry expiry
///
/// Expired entries are treated as absent on read and overwritten on write;
/// nothing sweeps them eagerly.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    availability: RwLock<HashMap<UserId, Expiring<AvailabilitySnapshot>>>,
    ratings: RwLock<HashMap<UserId, Expiring<RatingSnapshot>>>,
    claim_lists: RwLock<HashMap<UserId, Expiring<Vec<JobId>>>>,
    leases: RwLock<HashMap<JobId, Expiring<UserId>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error() -> anyhow::Error {
        EloServiceError::InternalError {
            message: "Failed to acquire cache lock".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl SnapshotCache for InMemoryCache {
    async fn get_availability(
        &self,
        user_id: &UserId,
    ) -> crate::error::Result<Option<AvailabilitySnapshot>> {
        let map = self.availability.read().map_err(|_| Self::lock_error())?;
        Ok(map
            .get(user_id)
            .filter(|e| e.live())
            .map(|e| e.value.clone()))
    }

    async fn set_availability(
        &self,
        user_id: &UserId,
        snapshot: AvailabilitySnapshot,
        ttl: Duration,
    ) -> crate::error::Result<()> {
        let mut map = self.availability.write().map_err(|_| Self::lock_error())?;
        map.insert(user_id.clone(), Expiring::new(snapshot, ttl));
        Ok(())
    }

    async fn get_availability_many(
        &self,
        user_ids: &[UserId],
    ) -> crate::error::Result<HashMap<UserId, AvailabilitySnapshot>> {
        let map = self.availability.read().map_err(|_| Self::lock_error())?;
        let mut result = HashMap::new();
        for user_id in user_ids {
            if let Some(entry) = map.get(user_id).filter(|e| e.live()) {
                result.insert(user_id.clone(), entry.value.clone());
            }
        }
        Ok(result)
    }

    async fn get_rating(
        &self,
        user_id: &UserId,
    ) -> crate::error::Result<Option<RatingSnapshot>> {
        let map = self.ratings.read().map_err(|_| Self::lock_error())?;
        Ok(map
            .get(user_id)
            .filter(|e| e.live())
            .map(|e| e.value.clone()))
    }

    async fn set_rating(
        &self,
        user_id: &UserId,
        snapshot: RatingSnapshot,
        ttl: Duration,
    ) -> crate::error::Result<()> {
        let mut map = self.ratings.write().map_err(|_| Self::lock_error())?;
        map.insert(user_id.clone(), Expiring::new(snapshot, ttl));
        Ok(())
    }

    async fn get_claims(&self, user_id: &UserId) -> crate::error::Result<Vec<JobId>> {
        let map = self.claim_lists.read().map_err(|_| Self::lock_error())?;
        Ok(map
            .get(user_id)
            .filter(|e| e.live())
            .map(|e| e.value.clone())
            .unwrap_or_default())
    }

    async fn add_claim(
        &self,
        user_id: &UserId,
        job_id: &JobId,
        ttl: Duration,
    ) -> crate::error::Result<()> {
        let mut map = self.claim_lists.write().map_err(|_| Self::lock_error())?;
        match map.get_mut(user_id).filter(|e| e.live()) {
            Some(entry) => {
                if !entry.value.contains(job_id) {
                    entry.value.push(job_id.clone());
                }
            }
            None => {
                map.insert(user_id.clone(), Expiring::new(vec![job_id.clone()], ttl));
            }
        }
        Ok(())
    }

    async fn remove_claim(&self, user_id: &UserId, job_id: &JobId) -> crate::error::Result<()> {
        let mut map = self.claim_lists.write().map_err(|_| Self::lock_error())?;
        if let Some(entry) = map.get_mut(user_id) {
            entry.value.retain(|id| id != job_id);
        }
        Ok(())
    }

    async fn acquire_lease(
        &self,
        job_id: &JobId,
        holder: &UserId,
        ttl: Duration,
    ) -> crate::error::Result<bool> {
        let mut map = self.leases.write().map_err(|_| Self::lock_error())?;
        if map.get(job_id).map(|e| e.live()).unwrap_or(false) {
            return Ok(false);
        }
        map.insert(job_id.clone(), Expiring::new(holder.clone(), ttl));
        Ok(true)
    }

    async fn release_lease(&self, job_id: &JobId) -> crate::error::Result<()> {
        let mut map = self.leases.write().map_err(|_| Self::lock_error())?;
        map.remove(job_id);
        Ok(())
    }

    async fn get_lease(&self, job_id: &JobId) -> crate::error::Result<Option<UserId>> {
        let map = self.leases.read().map_err(|_| Self::lock_error())?;
        Ok(map
            .get(job_id)
            .filter(|e| e.live())
            .map(|e| e.value.clone()))
    }
}

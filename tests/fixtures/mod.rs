//! Test fixtures for integration testing

use scriptorium::cache::InMemoryCache;
use scriptorium::claim::ClaimCoordinator;
use scriptorium::config::{CacheTtlConfig, ClaimConfig, RatingConfig};
use scriptorium::rating::RatingEngine;
use scriptorium::relay::MockRelay;
use scriptorium::store::InMemoryRatingStore;
use scriptorium::types::{
    AvailabilityStatus, Outcome, RatingChange, UpdateMetadata,
};
use std::sync::Arc;

/// A complete in-memory system: store, cache, mock relay, engine, coordinator
pub struct TestSystem {
    pub store: Arc<InMemoryRatingStore>,
    pub cache: Arc<InMemoryCache>,
    pub relay: Arc<MockRelay>,
    pub engine: Arc<RatingEngine>,
    pub coordinator: ClaimCoordinator,
}

/// Build a system with default configuration
pub fn create_test_system() -> TestSystem {
    create_test_system_with_ttl(Arc::new(InMemoryRatingStore::new()), CacheTtlConfig::default())
}

/// Build a system over an existing store (cold cache) with custom TTLs
pub fn create_test_system_with_ttl(
    store: Arc<InMemoryRatingStore>,
    ttl: CacheTtlConfig,
) -> TestSystem {
    let cache = Arc::new(InMemoryCache::new());
    let relay = Arc::new(MockRelay::new());
    let engine = Arc::new(RatingEngine::new(
        store.clone(),
        cache.clone(),
        relay.clone(),
        RatingConfig::default(),
        ttl.clone(),
    ));
    let coordinator = ClaimCoordinator::new(
        store.clone(),
        cache.clone(),
        relay.clone(),
        engine.clone(),
        ClaimConfig::default(),
        ttl,
    );
    TestSystem {
        store,
        cache,
        relay,
        engine,
        coordinator,
    }
}

/// Register a user and declare it available with the given ceiling
pub async fn register_available_worker(system: &TestSystem, user: &str, max_jobs: u32) {
    system
        .engine
        .register_user(&user.to_string())
        .await
        .unwrap();
    system
        .coordinator
        .update_availability(
            &user.to_string(),
            AvailabilityStatus::Available,
            Some(max_jobs),
        )
        .await
        .unwrap();
}

pub fn pairwise_change(user: &str, old_elo: i32, delta: i32, outcome: Outcome) -> RatingChange {
    RatingChange {
        user_id: user.to_string(),
        old_elo,
        opponent_elo: 1200,
        delta,
        outcome,
    }
}

pub fn update_metadata(comparison_id: &str, job_id: &str) -> UpdateMetadata {
    UpdateMetadata {
        comparison_id: comparison_id.to_string(),
        job_id: job_id.to_string(),
    }
}

//! Rating engine: applies upstream-decided rating changes atomically
//!
//! The engine never computes Elo deltas itself. Upstream QA resolution
//! decides them; the engine validates, applies, persists one atomic commit,
//! then refreshes snapshots and dispatches notices best-effort.

use crate::cache::SnapshotCache;
use crate::config::{CacheTtlConfig, RatingConfig};
use crate::error::{EloServiceError, Result};
use crate::rating::history;
use crate::relay::{EloUpdatedNotice, NotificationRelay, UserEloUpdate};
use crate::store::{RatingCommit, RatingStore};
use crate::types::{
    reasons, AppliedChange, ComparisonRole, ComparisonType, JobCompletionEntry, RatingChange,
    RatingHistoryEntry, RatingSnapshot, RatingStats, RatingHistoryReport, ThreeWayChange,
    ThreeWayResolution, UpdateMetadata, UserId, UserNotification,
};
use crate::utils::{current_timestamp, generate_update_id, signed_delta};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Trend window baked into cached rating snapshots
const SNAPSHOT_TREND_WINDOW_DAYS: u32 = 7;

/// A change with its ledger reason and the delta actually applied
struct PreparedChange {
    change: RatingChange,
    reason: &'static str,
    effective_delta: i32,
}

/// Build a cache-resident rating snapshot from durable state
pub fn build_snapshot(
    stats: &RatingStats,
    entries: &[RatingHistoryEntry],
    last_job_completed: Option<DateTime<Utc>>,
    window_days: u32,
    now: DateTime<Utc>,
) -> RatingSnapshot {
    RatingSnapshot {
        current_elo: stats.current_elo,
        peak_elo: stats.peak_elo,
        games_played: stats.games_played,
        recent_trend: history::trend(entries, window_days, now),
        last_job_completed,
    }
}

/// The rating engine
pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
    cache: Arc<dyn SnapshotCache>,
    relay: Arc<dyn NotificationRelay>,
    config: RatingConfig,
    ttl: CacheTtlConfig,
}

impl RatingEngine {
    pub fn new(
        store: Arc<dyn RatingStore>,
        cache: Arc<dyn SnapshotCache>,
        relay: Arc<dyn NotificationRelay>,
        config: RatingConfig,
        ttl: CacheTtlConfig,
    ) -> Self {
        Self {
            store,
            cache,
            relay,
            config,
            ttl,
        }
    }

    /// Seed a statistics row for a new transcriber
    ///
    /// Duplicate registration is a Conflict; the seeded snapshot is cached
    /// immediately so the first claim attempt skips the rebuild.
    pub async fn register_user(&self, user_id: &UserId) -> Result<RatingStats> {
        let stats = RatingStats::seeded(user_id.clone(), self.config.seed_rating);
        self.store.create_stats(stats.clone()).await?;

        info!(
            user_id = %user_id,
            seed_rating = self.config.seed_rating,
            "Registered user with seeded rating"
        );

        let snapshot = build_snapshot(
            &stats,
            &[],
            None,
            SNAPSHOT_TREND_WINDOW_DAYS,
            current_timestamp(),
        );
        if let Err(e) = self
            .cache
            .set_rating(user_id, snapshot, self.ttl.rating())
            .await
        {
            warn!(user_id = %user_id, "Failed to cache seeded rating snapshot: {}", e);
        }

        Ok(stats)
    }

    /// Apply pairwise rating changes (one or two participants) atomically
    pub async fn apply_pairwise_update(
        &self,
        changes: Vec<RatingChange>,
        metadata: UpdateMetadata,
    ) -> Result<Vec<AppliedChange>> {
        if changes.is_empty() || changes.len() > 2 {
            return Err(EloServiceError::validation(format!(
                "pairwise update takes 1 or 2 changes, got {}",
                changes.len()
            ))
            .into());
        }

        let prepared = changes
            .into_iter()
            .map(|change| PreparedChange {
                effective_delta: change.delta,
                reason: reasons::PAIRWISE_COMPARISON,
                change,
            })
            .collect();

        self.apply_changes(prepared, &metadata, ComparisonType::Pairwise)
            .await
    }

    /// Resolve a three-way tie-break: two original transcribers plus the
    /// tiebreaker, applied as one atomic commit
    ///
    /// Original transcribers flagged with a minority outcome absorb the
    /// tiebreaker's delta on top of their own; the tiebreaker can receive
    /// the flat configured bonus.
    pub async fn resolve_three_way(
        &self,
        changes: Vec<ThreeWayChange>,
        metadata: UpdateMetadata,
    ) -> Result<ThreeWayResolution> {
        let roles: HashSet<ComparisonRole> = changes.iter().map(|c| c.role).collect();
        let expected: HashSet<ComparisonRole> = [
            ComparisonRole::OriginalTranscriber1,
            ComparisonRole::OriginalTranscriber2,
            ComparisonRole::TiebreakerTranscriber,
        ]
        .into_iter()
        .collect();
        if changes.len() != 3 || roles != expected {
            return Err(EloServiceError::validation(
                "three-way resolution requires exactly one change per role",
            )
            .into());
        }

        let tiebreaker_delta = changes
            .iter()
            .find(|c| c.role == ComparisonRole::TiebreakerTranscriber)
            .map(|c| c.change.delta)
            .unwrap_or(0);

        let prepared = changes
            .into_iter()
            .map(|c| match c.role {
                ComparisonRole::TiebreakerTranscriber => {
                    let (reason, bonus) = if c.award_bonus {
                        (reasons::TIEBREAKER_BONUS, self.config.tiebreaker_bonus)
                    } else {
                        (reasons::THREE_WAY_RESOLUTION, 0)
                    };
                    PreparedChange {
                        effective_delta: c.change.delta + bonus,
                        reason,
                        change: c.change,
                    }
                }
                _ => {
                    let absorbed = if c.minority_outcome { tiebreaker_delta } else { 0 };
                    PreparedChange {
                        effective_delta: c.change.delta + absorbed,
                        reason: reasons::THREE_WAY_RESOLUTION,
                        change: c.change,
                    }
                }
            })
            .collect();

        let applied = self
            .apply_changes(prepared, &metadata, ComparisonType::ThreeWay)
            .await?;

        let notifications = applied
            .iter()
            .map(|a| UserNotification {
                user_id: a.user_id.clone(),
                message: format!(
                    "Your transcription rating changed by {} ({} to {}) after a tie-break review",
                    signed_delta(a.delta),
                    a.old_elo,
                    a.new_elo
                ),
            })
            .collect();

        Ok(ThreeWayResolution {
            changes: applied,
            notifications,
        })
    }

    /// Full rating ledger plus derived statistics for one user
    pub async fn get_history(&self, user_id: &UserId) -> Result<RatingHistoryReport> {
        let stats = self.store.get_stats(user_id).await?.ok_or_else(|| {
            EloServiceError::not_found(format!("rating stats for user {}", user_id))
        })?;
        let entries = self.store.load_history(user_id).await?;
        let now = current_timestamp();

        let initial_elo = entries
            .first()
            .map(|e| e.old_elo)
            .unwrap_or(self.config.seed_rating);

        Ok(RatingHistoryReport {
            current_elo: stats.current_elo,
            peak_elo: stats.peak_elo,
            initial_elo,
            games_played: stats.games_played,
            trend_7d: history::trend(&entries, 7, now),
            trend_30d: history::trend(&entries, 30, now),
            win_rate: history::win_rate(&entries, None, now),
            average_opponent_elo: history::average_opponent_elo(&entries, None, now),
            entries,
        })
    }

    /// Trend strings for many users from a single ledger scan
    ///
    /// Users with no ledger entries get the zero-trend string.
    pub async fn bulk_trend(
        &self,
        user_ids: &[UserId],
        window_days: u32,
    ) -> Result<HashMap<UserId, String>> {
        let entries = self.store.load_history_many(user_ids).await?;
        let now = current_timestamp();

        let mut by_user: HashMap<UserId, Vec<RatingHistoryEntry>> = HashMap::new();
        for entry in entries {
            by_user.entry(entry.user_id.clone()).or_default().push(entry);
        }

        let mut result = HashMap::new();
        for user_id in user_ids {
            let trend = match by_user.get(user_id) {
                Some(user_entries) => history::trend(user_entries, window_days, now),
                None => format!("0_over_{}_days", window_days),
            };
            result.insert(user_id.clone(), trend);
        }
        Ok(result)
    }

    /// Newest-first slice of the completion ledger
    pub async fn get_recent_activity(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<JobCompletionEntry>> {
        let mut completions = self.store.load_completions(user_id).await?;
        completions.reverse();
        completions.truncate(limit);
        Ok(completions)
    }

    /// Rebuild and cache one user's rating snapshot from durable state
    ///
    /// Used by the read-through path on cache miss. Unknown user is
    /// NotFound; a cache write failure is logged and the fresh snapshot is
    /// still returned.
    pub async fn rebuild_snapshot(
        &self,
        user_id: &UserId,
        window_days: u32,
    ) -> Result<RatingSnapshot> {
        let stats = self.store.get_stats(user_id).await?.ok_or_else(|| {
            EloServiceError::not_found(format!("rating stats for user {}", user_id))
        })?;
        let entries = self.store.load_history(user_id).await?;
        let last_completed = self
            .store
            .load_completions(user_id)
            .await?
            .last()
            .map(|c| c.completed_at);

        let snapshot = build_snapshot(&stats, &entries, last_completed, window_days, current_timestamp());
        if let Err(e) = self
            .cache
            .set_rating(user_id, snapshot.clone(), self.ttl.rating())
            .await
        {
            warn!(user_id = %user_id, "Failed to cache rebuilt rating snapshot: {}", e);
        }
        Ok(snapshot)
    }

    /// Validate, apply, and commit a batch of prepared changes, then run
    /// the post-commit snapshot refresh and notice dispatch
    async fn apply_changes(
        &self,
        prepared: Vec<PreparedChange>,
        metadata: &UpdateMetadata,
        comparison_type: ComparisonType,
    ) -> Result<Vec<AppliedChange>> {
        let user_ids: Vec<UserId> = prepared.iter().map(|p| p.change.user_id.clone()).collect();

        let mut seen = HashSet::new();
        for user_id in &user_ids {
            if !seen.insert(user_id) {
                return Err(EloServiceError::validation(format!(
                    "duplicate user {} in update batch",
                    user_id
                ))
                .into());
            }
        }

        // All validation happens against a single stats read, before any
        // row is written.
        let stats_by_user = self.store.get_stats_many(&user_ids).await?;
        for user_id in &user_ids {
            if !stats_by_user.contains_key(user_id) {
                return Err(EloServiceError::validation(format!(
                    "no rating stats for user {}",
                    user_id
                ))
                .into());
            }
        }
        for p in &prepared {
            let current = stats_by_user[&p.change.user_id].current_elo;
            if p.change.old_elo != current {
                return Err(EloServiceError::conflict(format!(
                    "stale rating for user {}: expected {}, found {}",
                    p.change.user_id, p.change.old_elo, current
                ))
                .into());
            }
        }

        let now = current_timestamp();
        let mut commit = RatingCommit::default();
        let mut applied = Vec::with_capacity(prepared.len());

        for p in &prepared {
            let mut stats = stats_by_user[&p.change.user_id].clone();
            // K-factor tier comes from the game count before this game.
            let k_factor = self.config.k_factor_for(stats.games_played);
            let new_elo = stats.current_elo + p.effective_delta;

            commit.history.push(RatingHistoryEntry {
                user_id: p.change.user_id.clone(),
                old_elo: stats.current_elo,
                new_elo,
                opponent_elo: p.change.opponent_elo,
                reason: p.reason.to_string(),
                comparison_id: metadata.comparison_id.clone(),
                job_id: metadata.job_id.clone(),
                outcome: p.change.outcome,
                comparison_type,
                k_factor_used: k_factor,
                changed_at: now,
            });
            commit.completions.push(JobCompletionEntry {
                user_id: p.change.user_id.clone(),
                job_id: metadata.job_id.clone(),
                outcome: p.change.outcome,
                elo_change: p.effective_delta,
                comparison_id: metadata.comparison_id.clone(),
                completed_at: now,
            });

            applied.push(AppliedChange {
                user_id: p.change.user_id.clone(),
                old_elo: stats.current_elo,
                new_elo,
                delta: p.effective_delta,
                k_factor_used: k_factor,
            });

            stats.current_elo = new_elo;
            stats.peak_elo = stats.peak_elo.max(new_elo);
            stats.games_played += 1;
            stats.total_jobs += 1;
            stats.last_calculated = now;
            stats.updated_at = now;
            commit.stats.push(stats);
        }

        self.store.commit(commit).await?;

        info!(
            comparison_id = %metadata.comparison_id,
            job_id = %metadata.job_id,
            users = applied.len(),
            "Committed rating update"
        );

        self.refresh_snapshots(&applied, now).await;
        self.dispatch_elo_updated(&applied, metadata).await;

        Ok(applied)
    }

    /// Post-commit snapshot refresh; cache failures are logged only
    async fn refresh_snapshots(&self, applied: &[AppliedChange], now: DateTime<Utc>) {
        for change in applied {
            match self.store.get_stats(&change.user_id).await {
                Ok(Some(stats)) => {
                    let entries = match self.store.load_history(&change.user_id).await {
                        Ok(entries) => entries,
                        Err(e) => {
                            warn!(user_id = %change.user_id, "Snapshot refresh skipped: {}", e);
                            continue;
                        }
                    };
                    let snapshot =
                        build_snapshot(&stats, &entries, Some(now), SNAPSHOT_TREND_WINDOW_DAYS, now);
                    if let Err(e) = self
                        .cache
                        .set_rating(&change.user_id, snapshot, self.ttl.rating())
                        .await
                    {
                        warn!(user_id = %change.user_id, "Failed to cache rating snapshot: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(user_id = %change.user_id, "Snapshot refresh skipped: {}", e);
                }
            }
        }
    }

    /// Best-effort post-commit notice; failures are logged and swallowed
    async fn dispatch_elo_updated(&self, applied: &[AppliedChange], metadata: &UpdateMetadata) {
        let notice = EloUpdatedNotice {
            update_id: generate_update_id(),
            comparison_id: metadata.comparison_id.clone(),
            update_results: applied
                .iter()
                .map(|a| UserEloUpdate {
                    user_id: a.user_id.clone(),
                    new_elo: a.new_elo,
                    change: a.delta,
                })
                .collect(),
        };
        if let Err(e) = self.relay.elo_updated(notice).await {
            warn!(
                comparison_id = %metadata.comparison_id,
                "Elo-updated dispatch failed after commit: {}",
                e
            );
        }
    }
}

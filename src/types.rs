//! Common types used throughout the rating and claim-coordination service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for transcribers (workers)
pub type UserId = String;

/// Unique identifier for jobs
pub type JobId = String;

/// Unique identifier for evaluated comparisons
pub type ComparisonId = String;

/// Unique identifier for durable job claims
pub type ClaimId = Uuid;

/// Outcome of an evaluated comparison for one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Win => write!(f, "win"),
            Outcome::Loss => write!(f, "loss"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

/// Resolution flow the comparison belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    Pairwise,
    ThreeWay,
}

impl std::fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonType::Pairwise => write!(f, "pairwise"),
            ComparisonType::ThreeWay => write!(f, "three_way"),
        }
    }
}

/// Participant role in a three-way tie-break resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonRole {
    OriginalTranscriber1,
    OriginalTranscriber2,
    TiebreakerTranscriber,
}

/// Worker availability states as reported to the claim coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Busy,
    Offline,
}

impl std::fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityStatus::Available => write!(f, "available"),
            AvailabilityStatus::Busy => write!(f, "busy"),
            AvailabilityStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Lifecycle state of a durable job claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    Completed,
    Expired,
}

/// Durable per-user rating statistics (one row per user)
///
/// Invariants: `peak_elo >= current_elo`; `games_played` advances exactly
/// once per resolved comparison per user. Mutated only by the rating engine
/// inside a single commit per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingStats {
    pub user_id: UserId,
    pub current_elo: i32,
    pub peak_elo: i32,
    pub games_played: u32,
    pub total_jobs: u32,
    pub last_calculated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RatingStats {
    /// Create a fresh statistics row seeded at registration
    pub fn seeded(user_id: UserId, seed_rating: i32) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            current_elo: seed_rating,
            peak_elo: seed_rating,
            games_played: 0,
            total_jobs: 0,
            last_calculated: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only rating ledger entry, the canonical source for derived stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingHistoryEntry {
    pub user_id: UserId,
    pub old_elo: i32,
    pub new_elo: i32,
    pub opponent_elo: i32,
    pub reason: String,
    pub comparison_id: ComparisonId,
    pub job_id: JobId,
    pub outcome: Outcome,
    pub comparison_type: ComparisonType,
    pub k_factor_used: u32,
    pub changed_at: DateTime<Utc>,
}

/// Append-only job completion entry for recent-activity aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompletionEntry {
    pub user_id: UserId,
    pub job_id: JobId,
    pub outcome: Outcome,
    pub elo_change: i32,
    pub comparison_id: ComparisonId,
    pub completed_at: DateTime<Utc>,
}

/// Durable record of job ownership, created on a successful claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobClaim {
    pub id: ClaimId,
    pub user_id: UserId,
    pub job_id: JobId,
    pub claimed_at: DateTime<Utc>,
    pub book_out_expires_at: DateTime<Utc>,
    pub status: ClaimStatus,
}

/// Cache-resident availability snapshot for one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub status: AvailabilityStatus,
    pub max_concurrent_jobs: u32,
    pub current_workload: u32,
    pub last_update: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    /// Snapshot for a worker that just declared itself available
    pub fn available(max_concurrent_jobs: u32) -> Self {
        Self {
            status: AvailabilityStatus::Available,
            max_concurrent_jobs,
            current_workload: 0,
            last_update: Utc::now(),
        }
    }

    /// Whether the worker can take on one more job
    pub fn has_capacity(&self) -> bool {
        self.current_workload < self.max_concurrent_jobs
    }
}

/// Cache-resident rating projection, rebuilt from the durable store on miss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub current_elo: i32,
    pub peak_elo: i32,
    pub games_played: u32,
    pub recent_trend: String,
    pub last_job_completed: Option<DateTime<Utc>>,
}

/// One pairwise rating change supplied by an upstream QA decision
///
/// The delta is decided upstream; the engine only applies, persists, and
/// reports it. `old_elo` is the rating the decision was made against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingChange {
    pub user_id: UserId,
    pub old_elo: i32,
    pub opponent_elo: i32,
    pub delta: i32,
    pub outcome: Outcome,
}

/// Metadata tying a batch of changes to its comparison and job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMetadata {
    pub comparison_id: ComparisonId,
    pub job_id: JobId,
}

/// One participant's change in a three-way tie-break resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeWayChange {
    pub role: ComparisonRole,
    pub change: RatingChange,
    /// The participant's outcome marks a minority winner/loser; original
    /// transcribers so flagged also absorb the tiebreaker's delta.
    pub minority_outcome: bool,
    /// Award the flat tiebreaker bonus on top of the delta
    pub award_bonus: bool,
}

/// A rating change as actually applied and committed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedChange {
    pub user_id: UserId,
    pub old_elo: i32,
    pub new_elo: i32,
    pub delta: i32,
    pub k_factor_used: u32,
}

/// User-facing message generated after a three-way resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotification {
    pub user_id: UserId,
    pub message: String,
}

/// Result of a three-way resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeWayResolution {
    pub changes: Vec<AppliedChange>,
    pub notifications: Vec<UserNotification>,
}

/// Ordered rating ledger plus derived statistics for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingHistoryReport {
    pub entries: Vec<RatingHistoryEntry>,
    pub current_elo: i32,
    pub peak_elo: i32,
    /// `old_elo` of the earliest ledger entry, or the seed rating if none
    pub initial_elo: i32,
    pub games_played: u32,
    pub trend_7d: String,
    pub trend_30d: String,
    pub win_rate: f64,
    pub average_opponent_elo: f64,
}

/// Inbound request to claim a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub job_id: JobId,
    #[serde(default)]
    pub excluded_user_ids: Vec<UserId>,
    #[serde(default)]
    pub min_elo: Option<i32>,
}

impl ClaimRequest {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            excluded_user_ids: Vec::new(),
            min_elo: None,
        }
    }
}

/// Confirmation returned after a successful claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub claim: JobClaim,
    pub availability: AvailabilitySnapshot,
    pub rating: RatingSnapshot,
    pub book_out_expires_at: DateTime<Utc>,
}

/// Tiebreaker claim validation result
///
/// Delegates to the regular claim pipeline but additionally reports whether
/// the caller appeared in the exclusion set of the original comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieBreakerClaim {
    pub caller_excluded: bool,
    pub outcome: ClaimOutcome,
}

/// History entry reasons recorded by the engine
pub mod reasons {
    pub const PAIRWISE_COMPARISON: &str = "pairwise_comparison";
    pub const THREE_WAY_RESOLUTION: &str = "three_way_resolution";
    pub const TIEBREAKER_BONUS: &str = "tiebreaker_bonus";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_stats_invariant() {
        let stats = RatingStats::seeded("u1".to_string(), 1200);
        assert_eq!(stats.current_elo, 1200);
        assert_eq!(stats.peak_elo, 1200);
        assert_eq!(stats.games_played, 0);
        assert!(stats.peak_elo >= stats.current_elo);
    }

    #[test]
    fn test_availability_capacity() {
        let mut snapshot = AvailabilitySnapshot::available(3);
        assert!(snapshot.has_capacity());
        snapshot.current_workload = 3;
        assert!(!snapshot.has_capacity());
    }

    #[test]
    fn test_outcome_serde_names() {
        assert_eq!(serde_json::to_string(&Outcome::Win).unwrap(), "\"win\"");
        assert_eq!(
            serde_json::to_string(&ComparisonRole::TiebreakerTranscriber).unwrap(),
            "\"tiebreaker_transcriber\""
        );
        assert_eq!(
            serde_json::to_string(&AvailabilityStatus::Available).unwrap(),
            "\"available\""
        );
    }

    #[test]
    fn test_claim_request_defaults() {
        let request: ClaimRequest = serde_json::from_str(r#"{"job_id":"job-1"}"#).unwrap();
        assert!(request.excluded_user_ids.is_empty());
        assert!(request.min_elo.is_none());
    }
}

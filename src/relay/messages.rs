//! Outbound notification payloads and wire formats

use crate::error::{EloServiceError, Result};
use crate::types::{AvailabilityStatus, ClaimId, ComparisonId, JobId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic exchange carrying every outbound event
pub const RATINGS_EVENTS_EXCHANGE: &str = "ratings.events";

/// Routing keys for events
pub const ELO_UPDATED_ROUTING_KEY: &str = "elo.updated";
pub const JOB_CLAIMED_ROUTING_KEY: &str = "job.claimed";
pub const AVAILABILITY_UPDATED_ROUTING_KEY: &str = "availability.updated";

/// One user's applied rating change as reported downstream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEloUpdate {
    pub user_id: UserId,
    pub new_elo: i32,
    pub change: i32,
}

/// Post-commit notice of applied rating changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloUpdatedNotice {
    pub update_id: Uuid,
    pub comparison_id: ComparisonId,
    pub update_results: Vec<UserEloUpdate>,
}

/// Post-commit notice of a successful job claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobClaimedNotice {
    pub user_id: UserId,
    pub job_id: JobId,
    pub claim_id: ClaimId,
    pub book_out_expires_at: DateTime<Utc>,
}

/// Notice of an availability snapshot change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityUpdatedNotice {
    pub user_id: UserId,
    pub status: AvailabilityStatus,
    pub max_concurrent_jobs: u32,
    pub current_workload: u32,
}

/// JSON envelope the workflow engine expects
///
/// Field names are camelCase on the wire for consumer compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEnvelope {
    pub update_id: Uuid,
    pub event_type: String,
    pub event_data: WorkflowEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEventData {
    pub comparison_id: ComparisonId,
    pub users_updated: usize,
    pub update_results: Vec<UserEloUpdate>,
}

impl WorkflowEnvelope {
    /// Build the elo-updated envelope from a notice
    pub fn elo_updated(notice: &EloUpdatedNotice) -> Self {
        Self {
            update_id: notice.update_id,
            event_type: "elo_updated".to_string(),
            event_data: WorkflowEventData {
                comparison_id: notice.comparison_id.clone(),
                users_updated: notice.update_results.len(),
                update_results: notice.update_results.clone(),
            },
        }
    }
}

/// Event-bus envelope with correlation metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub routing_key: String,
}

impl<T> NotificationEnvelope<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    /// Create a new envelope with a fresh correlation id
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            EloServiceError::InternalError {
                message: format!("Failed to serialize notification: {}", e),
            }
            .into()
        })
    }
}

//! HTTP relay toward the external workflow engine

use crate::config::WorkflowSettings;
use crate::error::{EloServiceError, Result};
use crate::relay::messages::WorkflowEnvelope;
use crate::relay::{
    AvailabilityUpdatedNotice, EloUpdatedNotice, JobClaimedNotice, NotificationRelay,
};
use async_trait::async_trait;
use tracing::debug;

/// Posts elo-updated envelopes to the configured workflow endpoint
///
/// The response body is acknowledgement-or-null and is never surfaced to
/// the caller; only transport failures and non-2xx statuses become errors,
/// and those are swallowed upstream by the dispatch path.
pub struct WorkflowNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WorkflowNotifier {
    pub fn new(settings: &WorkflowSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| EloServiceError::InternalError {
                message: format!("Failed to build workflow HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

#[async_trait]
impl NotificationRelay for WorkflowNotifier {
    async fn elo_updated(&self, notice: EloUpdatedNotice) -> Result<()> {
        let envelope = WorkflowEnvelope::elo_updated(&notice);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| EloServiceError::TransientExternal {
                message: format!("Workflow notification transport failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(EloServiceError::TransientExternal {
                message: format!(
                    "Workflow endpoint returned {} for update {}",
                    response.status(),
                    notice.update_id
                ),
            }
            .into());
        }

        debug!(
            "Workflow engine acknowledged update {} ({} users)",
            notice.update_id,
            notice.update_results.len()
        );
        Ok(())
    }

    // The workflow engine only consumes rating updates; claim and
    // availability notices ride the event bus.
    async fn job_claimed(&self, _notice: JobClaimedNotice) -> Result<()> {
        Ok(())
    }

    async fn availability_updated(&self, _notice: AvailabilityUpdatedNotice) -> Result<()> {
        Ok(())
    }
}

//! Best-effort post-commit notification dispatch
//!
//! Everything in this module runs strictly after the durable commit.
//! Failures are logged and swallowed by the callers; nothing here can roll
//! back or block a committed rating change or claim.

pub mod amqp;
pub mod events;
pub mod messages;
pub mod workflow;

pub use events::AmqpEventRelay;
pub use messages::{
    AvailabilityUpdatedNotice, EloUpdatedNotice, JobClaimedNotice, UserEloUpdate,
};
pub use workflow::WorkflowNotifier;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Trait for dispatching post-commit notifications
#[async_trait]
pub trait NotificationRelay: Send + Sync {
    /// Dispatch an elo-updated notice
    async fn elo_updated(&self, notice: EloUpdatedNotice) -> Result<()>;

    /// Dispatch a job-claimed notice
    async fn job_claimed(&self, notice: JobClaimedNotice) -> Result<()>;

    /// Dispatch an availability-updated notice
    async fn availability_updated(&self, notice: AvailabilityUpdatedNotice) -> Result<()>;
}

/// Fans an elo-updated notice out to the workflow engine and the event bus
///
/// Per-sink failures are logged and never propagated, so one dead sink
/// cannot starve the other.
pub struct CompositeRelay {
    workflow: Arc<dyn NotificationRelay>,
    events: Arc<dyn NotificationRelay>,
}

impl CompositeRelay {
    pub fn new(workflow: Arc<dyn NotificationRelay>, events: Arc<dyn NotificationRelay>) -> Self {
        Self { workflow, events }
    }
}

#[async_trait]
impl NotificationRelay for CompositeRelay {
    async fn elo_updated(&self, notice: EloUpdatedNotice) -> Result<()> {
        if let Err(e) = self.workflow.elo_updated(notice.clone()).await {
            warn!("Workflow elo-updated dispatch failed: {}", e);
        }
        if let Err(e) = self.events.elo_updated(notice).await {
            warn!("Event-bus elo-updated dispatch failed: {}", e);
        }
        Ok(())
    }

    async fn job_claimed(&self, notice: JobClaimedNotice) -> Result<()> {
        if let Err(e) = self.events.job_claimed(notice).await {
            warn!("Event-bus job-claimed dispatch failed: {}", e);
        }
        Ok(())
    }

    async fn availability_updated(&self, notice: AvailabilityUpdatedNotice) -> Result<()> {
        if let Err(e) = self.events.availability_updated(notice).await {
            warn!("Event-bus availability-updated dispatch failed: {}", e);
        }
        Ok(())
    }
}

/// Mock relay for testing
#[derive(Debug, Default)]
pub struct MockRelay {
    notices: std::sync::Mutex<Vec<String>>,
    elo_notices: std::sync::Mutex<Vec<EloUpdatedNotice>>,
    fail_all: std::sync::atomic::AtomicBool,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every dispatch return a transient error
    pub fn fail_all(&self) {
        self.fail_all
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Kinds of notices dispatched, in order (for testing)
    pub fn dispatched(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Count notices of one kind (for testing)
    pub fn count_of(&self, kind: &str) -> usize {
        self.dispatched().iter().filter(|n| n == &kind).count()
    }

    /// Captured elo-updated notices (for testing)
    pub fn elo_notices(&self) -> Vec<EloUpdatedNotice> {
        self.elo_notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    fn record(&self, kind: &str) -> Result<()> {
        if self.fail_all.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::EloServiceError::TransientExternal {
                message: format!("mock relay failing {} dispatch", kind),
            }
            .into());
        }
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(kind.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRelay for MockRelay {
    async fn elo_updated(&self, notice: EloUpdatedNotice) -> Result<()> {
        self.record("elo_updated")?;
        if let Ok(mut notices) = self.elo_notices.lock() {
            notices.push(notice);
        }
        Ok(())
    }

    async fn job_claimed(&self, _notice: JobClaimedNotice) -> Result<()> {
        self.record("job_claimed")
    }

    async fn availability_updated(&self, _notice: AvailabilityUpdatedNotice) -> Result<()> {
        self.record("availability_updated")
    }
}

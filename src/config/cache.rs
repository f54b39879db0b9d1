//! Cache TTL configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time-to-live settings for every cache-resident snapshot kind
///
/// The lease TTL is the sole mutual-exclusion mechanism for claim attempts;
/// a crashed holder self-heals when the marker expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    /// Availability snapshot TTL in seconds
    pub availability_secs: u64,
    /// Rating snapshot TTL in seconds
    pub rating_secs: u64,
    /// Per-user claim-id list TTL in seconds
    pub claim_list_secs: u64,
    /// Per-job lease marker TTL in seconds
    pub lease_secs: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            availability_secs: 6 * 60 * 60,
            rating_secs: 60 * 60,
            claim_list_secs: 8 * 60 * 60,
            lease_secs: 30,
        }
    }
}

impl CacheTtlConfig {
    pub fn availability(&self) -> Duration {
        Duration::from_secs(self.availability_secs)
    }

    pub fn rating(&self) -> Duration {
        Duration::from_secs(self.rating_secs)
    }

    pub fn claim_list(&self) -> Duration {
        Duration::from_secs(self.claim_list_secs)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}

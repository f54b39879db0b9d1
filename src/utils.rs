//! Utility functions for the rating and claim-coordination service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique claim ID
pub fn generate_claim_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique update ID for workflow notifications
pub fn generate_update_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Signed-magnitude rendering used in user-facing rating messages
pub fn signed_delta(delta: i32) -> String {
    if delta < 0 {
        delta.to_string()
    } else {
        format!("+{}", delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        assert_ne!(generate_claim_id(), generate_claim_id());
        assert_ne!(generate_update_id(), generate_update_id());
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(5), "+5");
        assert_eq!(signed_delta(0), "+0");
        assert_eq!(signed_delta(-12), "-12");
        assert_eq!(signed_delta(i32::MIN), i32::MIN.to_string());
    }
}

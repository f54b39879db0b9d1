//! Pure derivations over the rating ledger
//!
//! Every statistic here is computed from `RatingHistoryEntry` slices alone,
//! so the same code serves live requests, cache rebuilds, and bulk scans.

use crate::types::{Outcome, RatingHistoryEntry};
use chrono::{DateTime, Duration, Utc};

/// Entries whose `changed_at` falls inside the trailing window
fn in_window<'a>(
    entries: &'a [RatingHistoryEntry],
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<&'a RatingHistoryEntry> {
    let cutoff = now - Duration::days(window_days as i64);
    entries.iter().filter(|e| e.changed_at >= cutoff).collect()
}

/// Trend string over a trailing window
///
/// Convention: `diff = newest.new_elo - oldest-in-window.old_elo`. The
/// format is fixed for consumer compatibility: `{+|-}{N}_over_{D}_days`,
/// and `0_over_{D}_days` (no sign) when the window holds no entries.
pub fn trend(entries: &[RatingHistoryEntry], window_days: u32, now: DateTime<Utc>) -> String {
    let windowed = in_window(entries, window_days, now);
    if windowed.is_empty() {
        return format!("0_over_{}_days", window_days);
    }

    let mut oldest = windowed[0];
    let mut newest = windowed[0];
    for &entry in &windowed {
        if entry.changed_at < oldest.changed_at {
            oldest = entry;
        }
        if entry.changed_at >= newest.changed_at {
            newest = entry;
        }
    }

    let diff = newest.new_elo - oldest.old_elo;
    let sign = if diff < 0 { '-' } else { '+' };
    format!("{}{}_over_{}_days", sign, diff.abs(), window_days)
}

/// Percentage of wins over the ledger, optionally windowed; 0 when empty
pub fn win_rate(
    entries: &[RatingHistoryEntry],
    window_days: Option<u32>,
    now: DateTime<Utc>,
) -> f64 {
    let considered: Vec<&RatingHistoryEntry> = match window_days {
        Some(days) => in_window(entries, days, now),
        None => entries.iter().collect(),
    };
    if considered.is_empty() {
        return 0.0;
    }

    let wins = considered
        .iter()
        .filter(|e| e.outcome == Outcome::Win)
        .count();
    100.0 * wins as f64 / considered.len() as f64
}

/// Mean opponent rating over the ledger, optionally windowed; 0 when empty
pub fn average_opponent_elo(
    entries: &[RatingHistoryEntry],
    window_days: Option<u32>,
    now: DateTime<Utc>,
) -> f64 {
    let considered: Vec<&RatingHistoryEntry> = match window_days {
        Some(days) => in_window(entries, days, now),
        None => entries.iter().collect(),
    };
    if considered.is_empty() {
        return 0.0;
    }

    let total: i64 = considered.iter().map(|e| e.opponent_elo as i64).sum();
    total as f64 / considered.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComparisonType, Outcome};
    use proptest::prelude::*;

    fn entry(
        old_elo: i32,
        new_elo: i32,
        opponent_elo: i32,
        outcome: Outcome,
        age: Duration,
        now: DateTime<Utc>,
    ) -> RatingHistoryEntry {
        RatingHistoryEntry {
            user_id: "u1".to_string(),
            old_elo,
            new_elo,
            opponent_elo,
            reason: crate::types::reasons::PAIRWISE_COMPARISON.to_string(),
            comparison_id: "cmp-1".to_string(),
            job_id: "job-1".to_string(),
            outcome,
            comparison_type: ComparisonType::Pairwise,
            k_factor_used: 32,
            changed_at: now - age,
        }
    }

    #[test]
    fn test_trend_empty_window() {
        let now = Utc::now();
        assert_eq!(trend(&[], 7, now), "0_over_7_days");
        assert_eq!(trend(&[], 30, now), "0_over_30_days");

        // Entries strictly older than the window also yield the zero string.
        let old = entry(1000, 1010, 1000, Outcome::Win, Duration::days(10), now);
        assert_eq!(trend(&[old], 7, now), "0_over_7_days");
    }

    #[test]
    fn test_trend_positive() {
        let now = Utc::now();
        let entries = vec![
            entry(1000, 1000, 990, Outcome::Draw, Duration::days(6), now),
            entry(1000, 1005, 1010, Outcome::Win, Duration::zero(), now),
        ];
        assert_eq!(trend(&entries, 7, now), "+5_over_7_days");
    }

    #[test]
    fn test_trend_negative_and_flat() {
        let now = Utc::now();
        let falling = vec![
            entry(1200, 1190, 1250, Outcome::Loss, Duration::days(2), now),
            entry(1190, 1180, 1240, Outcome::Loss, Duration::days(1), now),
        ];
        assert_eq!(trend(&falling, 30, now), "-20_over_30_days");

        let flat = vec![entry(1200, 1200, 1200, Outcome::Draw, Duration::days(1), now)];
        assert_eq!(trend(&flat, 7, now), "+0_over_7_days");
    }

    #[test]
    fn test_trend_ignores_entries_outside_window() {
        let now = Utc::now();
        let entries = vec![
            entry(900, 1000, 950, Outcome::Win, Duration::days(20), now),
            entry(1000, 1010, 990, Outcome::Win, Duration::days(3), now),
            entry(1010, 1015, 1020, Outcome::Win, Duration::days(1), now),
        ];
        // Only the two recent entries count: 1015 - 1000.
        assert_eq!(trend(&entries, 7, now), "+15_over_7_days");
    }

    #[test]
    fn test_win_rate() {
        let now = Utc::now();
        assert_eq!(win_rate(&[], None, now), 0.0);

        let entries = vec![
            entry(1000, 1010, 1000, Outcome::Win, Duration::days(3), now),
            entry(1010, 1000, 1000, Outcome::Loss, Duration::days(2), now),
            entry(1000, 1010, 1000, Outcome::Win, Duration::days(1), now),
        ];
        assert_eq!(win_rate(&entries, None, now), 200.0 / 3.0);
    }

    #[test]
    fn test_win_rate_windowed() {
        let now = Utc::now();
        let entries = vec![
            entry(1000, 1010, 1000, Outcome::Win, Duration::days(20), now),
            entry(1010, 1000, 1000, Outcome::Loss, Duration::days(1), now),
        ];
        assert_eq!(win_rate(&entries, Some(7), now), 0.0);
        assert_eq!(win_rate(&entries, None, now), 50.0);
    }

    #[test]
    fn test_average_opponent_elo() {
        let now = Utc::now();
        assert_eq!(average_opponent_elo(&[], None, now), 0.0);

        let entries = vec![
            entry(1000, 1010, 1000, Outcome::Win, Duration::days(2), now),
            entry(1010, 1020, 1100, Outcome::Win, Duration::days(1), now),
        ];
        assert_eq!(average_opponent_elo(&entries, None, now), 1050.0);
    }

    proptest! {
        #[test]
        fn prop_win_rate_bounded(outcomes in prop::collection::vec(0u8..3, 0..50)) {
            let now = Utc::now();
            let entries: Vec<RatingHistoryEntry> = outcomes
                .iter()
                .enumerate()
                .map(|(i, o)| {
                    let outcome = match o {
                        0 => Outcome::Win,
                        1 => Outcome::Loss,
                        _ => Outcome::Draw,
                    };
                    entry(1000, 1000, 1000, outcome, Duration::hours(i as i64), now)
                })
                .collect();

            let rate = win_rate(&entries, None, now);
            prop_assert!((0.0..=100.0).contains(&rate));
        }

        #[test]
        fn prop_trend_matches_endpoints(deltas in prop::collection::vec(-50i32..50, 1..20)) {
            let now = Utc::now();
            let mut elo = 1200;
            let mut entries = Vec::new();
            for (i, delta) in deltas.iter().enumerate() {
                let age = Duration::hours((deltas.len() - i) as i64);
                entries.push(entry(elo, elo + delta, 1200, Outcome::Draw, age, now));
                elo += delta;
            }

            let total: i32 = deltas.iter().sum();
            let sign = if total < 0 { '-' } else { '+' };
            let expected = format!("{}{}_over_30_days", sign, total.abs());
            prop_assert_eq!(trend(&entries, 30, now), expected);
        }
    }
}

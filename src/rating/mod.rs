//! Rating engine: applies upstream-decided Elo deltas and derives
//! trend/win-rate statistics from the append-only ledger

pub mod engine;
pub mod history;

pub use engine::{build_snapshot, RatingEngine};
pub use history::{average_opponent_elo, trend, win_rate};

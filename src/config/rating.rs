//! Rating system configuration

use serde::{Deserialize, Serialize};

/// Rating engine knobs
///
/// K-factors are recorded on ledger entries for audit only; the applied
/// delta always comes from the upstream QA decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating assigned to a user at registration
    pub seed_rating: i32,
    /// K-factor recorded below `new_player_games` games
    pub k_new: u32,
    /// K-factor recorded below `established_player_games` games
    pub k_established: u32,
    /// K-factor recorded from `established_player_games` games on
    pub k_expert: u32,
    /// Games played below which a user counts as new
    pub new_player_games: u32,
    /// Games played below which a user counts as established
    pub established_player_games: u32,
    /// Flat bonus a tiebreaker can receive on top of its delta
    pub tiebreaker_bonus: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            seed_rating: 1200,
            k_new: 32,
            k_established: 24,
            k_expert: 16,
            new_player_games: 30,
            established_player_games: 100,
            tiebreaker_bonus: 5,
        }
    }
}

impl RatingConfig {
    /// K-factor tier for a user with the given number of games played
    pub fn k_factor_for(&self, games_played: u32) -> u32 {
        if games_played < self.new_player_games {
            self.k_new
        } else if games_played < self.established_player_games {
            self.k_established
        } else {
            self.k_expert
        }
    }
}

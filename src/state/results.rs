//! End-of-race leaderboard.
//!
//! Players are stable-sorted by lap count ascending and then numbered from
//! the player count downwards, so the fewest laps gets the highest position
//! number and the most laps gets position 1. Equal lap counts keep their
//! player-list order.

use serde::{Deserialize, Serialize};

use crate::session::PlayerRecord;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub position: usize,
    pub player_name: String,
    pub laps: u32,
}

/// Builds the leaderboard from replicated lap counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultsAggregator;

impl ResultsAggregator {
    /// Rank `players`. A lap counter that has not replicated yet counts as
    /// zero laps.
    pub fn rank(players: &[PlayerRecord]) -> Vec<ResultEntry> {
        let mut standings: Vec<(&PlayerRecord, u32)> = players
            .iter()
            .map(|p| {
                let laps = p.laps().unwrap_or_else(|| {
                    tracing::debug!("No lap count replicated yet for {}", p.nick_name);
                    0
                });
                (p, laps)
            })
            .collect();

        // sort_by_key is stable
        standings.sort_by_key(|(_, laps)| *laps);

        let total = standings.len();
        standings
            .into_iter()
            .enumerate()
            .map(|(i, (player, laps))| {
                let entry = ResultEntry {
                    position: total - i,
                    player_name: player.nick_name.clone(),
                    laps,
                };
                tracing::debug!(
                    "{} {} Position: {}",
                    entry.player_name,
                    entry.laps,
                    entry.position
                );
                entry
            })
            .collect()
    }

    /// Leaderboard as JSON for the results panel.
    pub fn to_json(entries: &[ResultEntry]) -> serde_json::Value {
        serde_json::json!({ "results": entries })
    }
}

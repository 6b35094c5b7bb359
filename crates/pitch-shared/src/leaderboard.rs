//! Leaderboard aggregation over score entries.

use crate::game_mode::GameModeKind;
use crate::score_log::ScoreEntry;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Which entries to rank
#[derive(Debug, Clone, Default)]
pub struct LeaderboardQuery {
    /// Only this mode
    pub mode: Option<GameModeKind>,
    /// Only these users (friends view)
    pub users: Option<HashSet<String>>,
    /// Keep each user's best entry only
    pub best_per_user: bool,
    /// Maximum rows, 0 for all
    pub limit: usize,
}

/// One ranked row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub entry: ScoreEntry,
}

/// Rank by score, highest first; ties go to whoever got there first
pub fn rank(entries: &[ScoreEntry], query: &LeaderboardQuery) -> Vec<RankedEntry> {
    let mut selected: Vec<&ScoreEntry> = entries
        .iter()
        .filter(|e| query.mode.map_or(true, |m| e.mode == m))
        .filter(|e| query.users.as_ref().map_or(true, |u| u.contains(&e.user_id)))
        .collect();

    selected.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.achieved_at.cmp(&b.achieved_at))
    });

    if query.best_per_user {
        let mut seen = HashSet::new();
        selected.retain(|&e| seen.insert(e.user_id.as_str()));
    }

    if query.limit > 0 {
        selected.truncate(query.limit);
    }

    selected
        .into_iter()
        .enumerate()
        .map(|(i, e)| RankedEntry {
            rank: i + 1,
            entry: e.clone(),
        })
        .collect()
}

/// Total score per user across all entries, highest first
pub fn totals_by_user(entries: &[ScoreEntry]) -> Vec<(String, u64)> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for e in entries {
        *totals.entry(e.user_id.as_str()).or_insert(0) += e.score;
    }
    let mut totals: Vec<(String, u64)> = totals
        .into_iter()
        .map(|(user, total)| (user.to_string(), total))
        .collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals
}

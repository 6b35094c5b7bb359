//! Score Calculator
//!
//! | Mode          | Formula                                      |
//! |---------------|----------------------------------------------|
//! | rpg           | level * 100 + correct * 10                   |
//! | streak        | streak * 50 + correct * 20                   |
//! | timeAttack    | max(0, time_remaining * 2 + correct * 30)    |
//! | mystery       | correct * 100                                |
//! | voiceOlympics | correct * 50 + streak_count * 20             |

use crate::game_mode::{GameMode, GameModeKind};
use serde::{Deserialize, Serialize};

/// Per-round counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundMetrics {
    pub correct_responses: u32,
    pub streak_count: u32,
    /// Seconds left on the clock
    pub time_remaining: u32,
}

/// Score a round. Deterministic and side-effect free.
pub fn compute_score(
    mode: &GameMode,
    current_level: u32,
    metrics: &RoundMetrics,
    streak: u32,
    time_remaining: u32,
) -> u64 {
    let correct = metrics.correct_responses as u64;
    match mode.kind {
        GameModeKind::Rpg => current_level as u64 * 100 + correct * 10,
        GameModeKind::Streak => streak as u64 * 50 + correct * 20,
        // Unsigned operands keep this at or above zero
        GameModeKind::TimeAttack => time_remaining as u64 * 2 + correct * 30,
        GameModeKind::Mystery => correct * 100,
        GameModeKind::VoiceOlympics => correct * 50 + metrics.streak_count as u64 * 20,
    }
}

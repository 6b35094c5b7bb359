//! Game modes
//!
//! Five static rulesets governing scoring and pacing, plus per-round
//! bookkeeping for whichever mode is being played.

use crate::error::PitchError;
use crate::scoring::RoundMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mode type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameModeKind {
    Rpg,
    Streak,
    TimeAttack,
    Mystery,
    VoiceOlympics,
}

impl GameModeKind {
    pub const ALL: [GameModeKind; 5] = [
        Self::Rpg,
        Self::Streak,
        Self::TimeAttack,
        Self::Mystery,
        Self::VoiceOlympics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpg => "rpg",
            Self::Streak => "streak",
            Self::TimeAttack => "timeAttack",
            Self::Mystery => "mystery",
            Self::VoiceOlympics => "voiceOlympics",
        }
    }
}

impl fmt::Display for GameModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameModeKind {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PitchError::unknown_tag("game mode", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

/// Static per-mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMode {
    pub kind: GameModeKind,
    pub name: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    /// Highest in-mode level (rpg)
    pub max_level: u32,
    /// Streak to reach (streak), correct answers per level (rpg)
    pub streak_goal: u32,
    /// Round length in seconds (timeAttack), 0 when untimed
    pub time_limit_secs: u32,
    /// Correct answers needed to win (timeAttack, mystery, voiceOlympics)
    pub target_correct: u32,
}

/// All game modes
pub const GAME_MODES: &[GameMode] = &[
    GameMode {
        kind: GameModeKind::Rpg,
        name: "Sales Quest",
        description: "Level up through increasingly tough prospects",
        difficulty: Difficulty::Intermediate,
        max_level: 5,
        streak_goal: 2,
        time_limit_secs: 0,
        target_correct: 0,
    },
    GameMode {
        kind: GameModeKind::Streak,
        name: "Hot Streak",
        description: "Chain correct responses without a miss",
        difficulty: Difficulty::Beginner,
        max_level: 1,
        streak_goal: 5,
        time_limit_secs: 0,
        target_correct: 0,
    },
    GameMode {
        kind: GameModeKind::TimeAttack,
        name: "Time Attack",
        description: "Handle as many objections as you can before the clock runs out",
        difficulty: Difficulty::Advanced,
        max_level: 1,
        streak_goal: 0,
        time_limit_secs: 120,
        target_correct: 5,
    },
    GameMode {
        kind: GameModeKind::Mystery,
        name: "Mystery Buyer",
        description: "Uncover what the prospect really needs",
        difficulty: Difficulty::Intermediate,
        max_level: 1,
        streak_goal: 0,
        time_limit_secs: 0,
        target_correct: 3,
    },
    GameMode {
        kind: GameModeKind::VoiceOlympics,
        name: "Voice Olympics",
        description: "Tone, pace and clarity drills",
        difficulty: Difficulty::Advanced,
        max_level: 1,
        streak_goal: 3,
        time_limit_secs: 0,
        target_correct: 4,
    },
];

impl GameMode {
    /// Catalog entry for a kind
    pub fn for_kind(kind: GameModeKind) -> &'static GameMode {
        match GAME_MODES.iter().find(|m| m.kind == kind) {
            Some(mode) => mode,
            None => &GAME_MODES[0],
        }
    }

    pub fn is_timed(&self) -> bool {
        self.time_limit_secs > 0
    }
}

/// Live state of one round in a given mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    pub kind: GameModeKind,
    /// In-mode level (rpg), starts at 1
    pub current_level: u32,
    pub correct_responses: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub time_remaining: u32,
    max_level: u32,
    streak_goal: u32,
    target_correct: u32,
}

impl RoundState {
    pub fn new(mode: &GameMode) -> Self {
        Self {
            kind: mode.kind,
            current_level: 1,
            correct_responses: 0,
            streak: 0,
            best_streak: 0,
            time_remaining: mode.time_limit_secs,
            max_level: mode.max_level.max(1),
            streak_goal: mode.streak_goal,
            target_correct: mode.target_correct,
        }
    }

    /// Record one judged response
    pub fn record_response(&mut self, correct: bool) {
        if !correct {
            self.streak = 0;
            return;
        }

        self.correct_responses = self.correct_responses.saturating_add(1);
        self.streak = self.streak.saturating_add(1);
        self.best_streak = self.best_streak.max(self.streak);

        if self.kind == GameModeKind::Rpg
            && self.streak_goal > 0
            && self.correct_responses % self.streak_goal == 0
            && self.current_level < self.max_level
        {
            self.current_level += 1;
        }
    }

    /// One second of countdown. Returns true when time has just run out.
    pub fn tick(&mut self) -> bool {
        if self.time_remaining == 0 {
            return false;
        }
        self.time_remaining -= 1;
        self.time_remaining == 0
    }

    pub fn is_expired(&self, mode: &GameMode) -> bool {
        mode.is_timed() && self.time_remaining == 0
    }

    pub fn metrics(&self) -> RoundMetrics {
        RoundMetrics {
            correct_responses: self.correct_responses,
            streak_count: self.best_streak,
            time_remaining: self.time_remaining,
        }
    }

    /// Whether the round met its mode's objective
    pub fn is_won(&self) -> bool {
        match self.kind {
            GameModeKind::Rpg => self.current_level >= self.max_level,
            GameModeKind::Streak => self.best_streak >= self.streak_goal,
            GameModeKind::TimeAttack | GameModeKind::Mystery | GameModeKind::VoiceOlympics => {
                self.correct_responses >= self.target_correct
            }
        }
    }
}

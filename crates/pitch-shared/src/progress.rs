//! Player progress state, events and notifications.

use crate::achievements::{self, AchievementSet};
use crate::error::PitchError;
use crate::levels::{title_for_level, LevelTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Round a stat to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// How the coach judged a user turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnCategory {
    Perfect,
    ObjectionHandled,
    ClosingAttempt,
    Generic,
}

impl TurnCategory {
    /// XP awarded for a turn of this category
    pub fn base_xp(&self) -> u64 {
        match self {
            Self::Perfect => 50,
            Self::ObjectionHandled => 30,
            Self::ClosingAttempt => 40,
            Self::Generic => 25,
        }
    }

    /// Non-generic turns count as correct responses
    pub fn is_correct(&self) -> bool {
        !matches!(self, Self::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::ObjectionHandled => "objectionHandled",
            Self::ClosingAttempt => "closingAttempt",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for TurnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnCategory {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perfect" => Ok(Self::Perfect),
            "objectionHandled" => Ok(Self::ObjectionHandled),
            "closingAttempt" => Ok(Self::ClosingAttempt),
            "generic" => Ok(Self::Generic),
            other => Err(PitchError::unknown_tag("turn category", other)),
        }
    }
}

/// Character stats. Each starts at 1.0 and only grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub charisma: f64,
    pub persuasion: f64,
    pub confidence: f64,
}

impl CharacterStats {
    /// Step applied to every stat on level-up
    pub const LEVEL_UP_STEP: f64 = 0.2;
    /// Step applied to a single stat by a turn category
    pub const TURN_STEP: f64 = 0.1;

    pub fn bump_all(&mut self, step: f64) {
        self.charisma = round1(self.charisma + step);
        self.persuasion = round1(self.persuasion + step);
        self.confidence = round1(self.confidence + step);
    }

    pub fn bump_persuasion(&mut self, step: f64) {
        self.persuasion = round1(self.persuasion + step);
    }

    pub fn bump_confidence(&mut self, step: f64) {
        self.confidence = round1(self.confidence + step);
    }

    /// All stats finite and at least the starting value
    pub fn is_valid(&self) -> bool {
        [self.charisma, self.persuasion, self.confidence]
            .iter()
            .all(|v| v.is_finite() && *v >= 1.0)
    }
}

impl Default for CharacterStats {
    fn default() -> Self {
        Self {
            charisma: 1.0,
            persuasion: 1.0,
            confidence: 1.0,
        }
    }
}

/// Per-user gamification state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Total XP
    pub xp: u64,
    /// Current level (derived from XP)
    pub level: u32,
    pub stats: CharacterStats,
    pub achievements: AchievementSet,
    /// Consecutive successful turns
    pub streak: u32,
    /// Streak value before the last successful tick, consumed by the next scored turn
    #[serde(skip)]
    pub pending_streak_milestone: Option<u32>,
    /// Correct responses seen so far
    pub correct_responses: u32,
    pub total_games: u32,
    pub games_won: u32,
    pub highest_streak: u32,
}

impl ProgressSnapshot {
    pub fn new() -> Self {
        Self {
            xp: 0,
            level: 1,
            stats: CharacterStats::default(),
            achievements: AchievementSet::new(),
            streak: 0,
            pending_streak_milestone: None,
            correct_responses: 0,
            total_games: 0,
            games_won: 0,
            highest_streak: 0,
        }
    }

    /// Current title (derived from level)
    pub fn title(&self) -> &'static str {
        title_for_level(self.level)
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.contains(id)
    }

    /// XP left until the next level
    pub fn xp_to_next_level(&self, table: &LevelTable) -> u64 {
        table.xp_to_next(self.level, self.xp)
    }

    /// Progress to next level (0-100)
    pub fn progress_percent(&self, table: &LevelTable) -> u8 {
        (table.progress_to_next(self.level, self.xp) * 100.0) as u8
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// An event the engine applies to a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A user turn judged by the coach
    UserTurnScored { category: TurnCategory },
    /// Resolve pending level-ups without awarding XP
    LevelUpCheck,
    /// A streak step, successful or broken
    StreakTick { success: bool },
}

impl ProgressEvent {
    pub fn scored(category: TurnCategory) -> Self {
        Self::UserTurnScored { category }
    }
}

/// Something the UI should tell the player about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    AchievementUnlocked { id: String },
    LevelUp { level: u32 },
    StreakMilestone { streak: u32, bonus_xp: u64 },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AchievementUnlocked { id } => match achievements::definition(id) {
                Some(def) => f.write_str(&achievements::format_achievement_unlock(def)),
                None => write!(f, "[?] Achievement unlocked: {}", id),
            },
            Self::LevelUp { level } => {
                write!(f, "Level up! Level {} - {}", level, title_for_level(*level))
            }
            Self::StreakMilestone { streak, bonus_xp } => {
                write!(f, "Streak of {}! +{} XP", streak, bonus_xp)
            }
        }
    }
}

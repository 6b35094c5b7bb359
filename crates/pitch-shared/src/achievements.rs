//! Achievement badges for the progress system.
//!
//! The catalog is static. Unlocked achievements live in an ordered set on the
//! player's snapshot; unlocking is idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FIRST_WIN: &str = "first_win";
pub const PERFECT_PITCH: &str = "perfect_pitch";
pub const STREAK_5: &str = "streak_5";
pub const LEVEL_5: &str = "level_5";
pub const VETERAN: &str = "veteran";
pub const CHAMPION: &str = "champion";
pub const STREAK_MASTER: &str = "streak_master";
pub const MAX_LEVEL: &str = "max_level";

/// Static catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    /// Unique identifier
    pub id: &'static str,
    /// Short name
    pub name: &'static str,
    /// What the badge stands for
    pub description: &'static str,
    /// ASCII badge symbol
    pub icon: &'static str,
    /// How to earn it
    pub hint: &'static str,
}

impl AchievementDefinition {
    const fn new(
        id: &'static str,
        icon: &'static str,
        name: &'static str,
        description: &'static str,
        hint: &'static str,
    ) -> Self {
        Self { id, name, description, icon, hint }
    }
}

/// All available achievements, in display order
pub const CATALOG: &[AchievementDefinition] = &[
    AchievementDefinition::new(FIRST_WIN, "[1]", "First Win", "Landed your first correct response", "Give a response the coach approves of"),
    AchievementDefinition::new(PERFECT_PITCH, "(**)", "Perfect Pitch", "Delivered a flawless response", "Earn an \"Excellent response\" from the coach"),
    AchievementDefinition::new(STREAK_5, "<5>", "On a Roll", "Five correct responses in a row", "Keep a streak of 5 going"),
    AchievementDefinition::new(LEVEL_5, "[L5]", "Deal Maker", "Reached level 5", "Earn 700 XP"),
    AchievementDefinition::new(VETERAN, "|10|", "Veteran", "Played 10 practice games", "Finish 10 sessions"),
    AchievementDefinition::new(CHAMPION, "{W}", "Champion", "Won 10 practice games", "Win 10 sessions"),
    AchievementDefinition::new(STREAK_MASTER, "<10>", "Streak Master", "Ten correct responses in a row", "Keep a streak of 10 going"),
    AchievementDefinition::new(MAX_LEVEL, "[*]", "Pitch Perfect", "Reached the final level", "Max out your level"),
];

/// Look up a catalog entry
pub fn definition(id: &str) -> Option<&'static AchievementDefinition> {
    CATALOG.iter().find(|def| def.id == id)
}

/// An unlocked achievement with its unlock time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Ordered set of unlocked achievements.
///
/// Insertion order is display order. Ids never repeat and are never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementSet {
    entries: Vec<UnlockedAchievement>,
}

impl AchievementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unlock `id` at `at`. Returns false if it was already unlocked.
    pub fn unlock(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push(UnlockedAchievement {
            id: id.to_string(),
            unlocked_at: at,
        });
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnlockedAchievement> {
        self.entries.iter()
    }

    /// Most recently unlocked first
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &UnlockedAchievement> {
        self.entries.iter().rev().take(limit)
    }

    /// Union with `other`, keeping our order and each id's earliest unlock
    pub fn merge(&mut self, other: &AchievementSet) {
        for entry in other.iter() {
            match self.entries.iter_mut().find(|a| a.id == entry.id) {
                Some(existing) if entry.unlocked_at < existing.unlocked_at => {
                    existing.unlocked_at = entry.unlocked_at;
                }
                Some(_) => {}
                None => self.entries.push(entry.clone()),
            }
        }
    }

    /// True if any id repeats. Used when validating loaded records.
    pub(crate) fn has_duplicates(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .any(|(i, a)| self.entries[..i].iter().any(|b| b.id == a.id))
    }
}

impl FromIterator<UnlockedAchievement> for AchievementSet {
    fn from_iter<T: IntoIterator<Item = UnlockedAchievement>>(iter: T) -> Self {
        let mut set = AchievementSet::new();
        for entry in iter {
            set.unlock(&entry.id, entry.unlocked_at);
        }
        set
    }
}

/// Format badges for display (ASCII style)
pub fn format_badges(set: &AchievementSet, max_display: usize) -> String {
    if set.is_empty() {
        return String::new();
    }

    let badges: Vec<&str> = set
        .iter()
        .take(max_display)
        .map(|a| definition(&a.id).map(|d| d.icon).unwrap_or("[?]"))
        .collect();
    let badges = badges.join(" ");

    if set.len() > max_display {
        format!("{} +{} more", badges, set.len() - max_display)
    } else {
        badges
    }
}

/// Format a single unlock for notification (ASCII style)
pub fn format_achievement_unlock(def: &AchievementDefinition) -> String {
    format!("{} Achievement unlocked: {} - {}", def.icon, def.name, def.description)
}

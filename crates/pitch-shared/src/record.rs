//! Persisted progress record and merge patches.
//!
//! The record is the per-user document kept by the durable store. Writers
//! never replace it wholesale: they send a `ProgressPatch` whose absent
//! fields leave the stored values untouched. Achievements merge by union.

use crate::achievements::AchievementSet;
use crate::error::{PitchError, Result};
use crate::levels::LevelTable;
use crate::onboarding::{OnboardingProgress, OnboardingStep};
use crate::progress::{CharacterStats, ProgressSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user progress document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub xp: u64,
    pub level: u32,
    pub charisma: f64,
    pub persuasion: f64,
    pub confidence: f64,
    #[serde(default)]
    pub achievements: AchievementSet,
    #[serde(default)]
    pub total_games: u32,
    #[serde(default)]
    pub games_won: u32,
    #[serde(default)]
    pub highest_streak: u32,
    #[serde(default)]
    pub onboarding: OnboardingProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Fresh record with default progress
    pub fn new(at: DateTime<Utc>) -> Self {
        let stats = CharacterStats::default();
        Self {
            xp: 0,
            level: 1,
            charisma: stats.charisma,
            persuasion: stats.persuasion,
            confidence: stats.confidence,
            achievements: AchievementSet::new(),
            total_games: 0,
            games_won: 0,
            highest_streak: 0,
            onboarding: OnboardingProgress::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn stats(&self) -> CharacterStats {
        CharacterStats {
            charisma: self.charisma,
            persuasion: self.persuasion,
            confidence: self.confidence,
        }
    }

    /// Reject records the engine could not have produced
    pub fn validate(&self, table: &LevelTable) -> Result<()> {
        if self.level == 0 || self.level > table.max_level() {
            return Err(PitchError::InvalidRecord(format!(
                "level {} outside 1..={}",
                self.level,
                table.max_level()
            )));
        }
        let expected = table.level_for_xp(self.xp);
        if expected != self.level {
            return Err(PitchError::InvalidRecord(format!(
                "level {} does not match {} xp (expected {})",
                self.level, self.xp, expected
            )));
        }
        if self.xp > table.xp_cap() {
            return Err(PitchError::InvalidRecord(format!(
                "xp {} above cap {}",
                self.xp,
                table.xp_cap()
            )));
        }
        if !self.stats().is_valid() {
            return Err(PitchError::InvalidRecord(format!(
                "character stats out of range: {:?}",
                self.stats()
            )));
        }
        if self.achievements.has_duplicates() {
            return Err(PitchError::InvalidRecord("duplicate achievement ids".to_string()));
        }
        Ok(())
    }

    /// Engine state for a new session
    pub fn to_snapshot(&self, table: &LevelTable) -> Result<ProgressSnapshot> {
        self.validate(table)?;
        Ok(ProgressSnapshot {
            xp: self.xp,
            level: self.level,
            stats: self.stats(),
            achievements: self.achievements.clone(),
            total_games: self.total_games,
            games_won: self.games_won,
            highest_streak: self.highest_streak,
            ..ProgressSnapshot::new()
        })
    }

    /// Merge a patch into the record
    pub fn apply(&mut self, patch: &ProgressPatch, at: DateTime<Utc>) {
        if let Some(xp) = patch.xp {
            self.xp = xp;
        }
        if let Some(level) = patch.level {
            self.level = level;
        }
        if let Some(v) = patch.charisma {
            self.charisma = v;
        }
        if let Some(v) = patch.persuasion {
            self.persuasion = v;
        }
        if let Some(v) = patch.confidence {
            self.confidence = v;
        }
        if let Some(achievements) = &patch.achievements {
            self.achievements.merge(achievements);
        }
        if let Some(v) = patch.total_games {
            self.total_games = v;
        }
        if let Some(v) = patch.games_won {
            self.games_won = v;
        }
        if let Some(v) = patch.highest_streak {
            self.highest_streak = v;
        }
        if let Some(onboarding) = &patch.onboarding {
            self.onboarding.merge(onboarding);
        }
        self.updated_at = at;
    }
}

/// Partial update for a progress record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charisma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persuasion: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<AchievementSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_games: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games_won: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding: Option<OnboardingProgress>,
}

impl ProgressPatch {
    /// Fields a conversational turn can change
    pub fn progress(snapshot: &ProgressSnapshot) -> Self {
        Self {
            xp: Some(snapshot.xp),
            level: Some(snapshot.level),
            charisma: Some(snapshot.stats.charisma),
            persuasion: Some(snapshot.stats.persuasion),
            confidence: Some(snapshot.stats.confidence),
            achievements: Some(snapshot.achievements.clone()),
            highest_streak: Some(snapshot.highest_streak),
            ..Self::default()
        }
    }

    /// Every persisted field of a snapshot
    pub fn full(snapshot: &ProgressSnapshot) -> Self {
        Self {
            total_games: Some(snapshot.total_games),
            games_won: Some(snapshot.games_won),
            ..Self::progress(snapshot)
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Mark onboarding steps done
    pub fn onboarding(steps: &[OnboardingStep]) -> Self {
        let mut progress = OnboardingProgress::new();
        for step in steps {
            progress.complete(*step);
        }
        Self {
            onboarding: Some(progress),
            ..Self::default()
        }
    }

    /// Fold a later patch into this one. Later values win, achievements and onboarding union.
    pub fn merge(&mut self, later: ProgressPatch) {
        fn take<T>(slot: &mut Option<T>, later: Option<T>) {
            if later.is_some() {
                *slot = later;
            }
        }

        take(&mut self.xp, later.xp);
        take(&mut self.level, later.level);
        take(&mut self.charisma, later.charisma);
        take(&mut self.persuasion, later.persuasion);
        take(&mut self.confidence, later.confidence);
        take(&mut self.total_games, later.total_games);
        take(&mut self.games_won, later.games_won);
        take(&mut self.highest_streak, later.highest_streak);

        if let Some(theirs) = later.achievements {
            self.achievements
                .get_or_insert_with(AchievementSet::new)
                .merge(&theirs);
        }
        if let Some(theirs) = later.onboarding {
            self.onboarding
                .get_or_insert_with(OnboardingProgress::new)
                .merge(&theirs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::{FIRST_WIN, LEVEL_5};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_wire_field_names() {
        let record = ProgressRecord::new(ts(0));
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "xp", "level", "charisma", "persuasion", "confidence", "achievements",
            "totalGames", "gamesWon", "highestStreak", "createdAt", "updatedAt",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_negative_xp_is_rejected_by_deserialization() {
        let json = r#"{"xp":-5,"level":1,"charisma":1.0,"persuasion":1.0,"confidence":1.0,
                       "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<ProgressRecord>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let table = LevelTable::default();
        let mut record = ProgressRecord::new(ts(0));
        assert!(record.validate(&table).is_ok());

        record.xp = 150;
        assert!(record.validate(&table).is_err());
        record.level = 2;
        assert!(record.validate(&table).is_ok());

        record.level = 11;
        assert!(record.validate(&table).is_err());
        record.level = 2;

        record.charisma = 0.4;
        assert!(record.validate(&table).is_err());
        record.charisma = 1.0;

        record.xp = 5000;
        record.level = 10;
        assert!(record.validate(&table).is_err());
    }

    #[test]
    fn test_apply_leaves_untouched_fields() {
        let mut record = ProgressRecord::new(ts(0));
        record.total_games = 4;
        record.games_won = 2;

        let patch = ProgressPatch {
            xp: Some(120),
            level: Some(2),
            ..ProgressPatch::default()
        };
        record.apply(&patch, ts(60));

        assert_eq!(record.xp, 120);
        assert_eq!(record.total_games, 4);
        assert_eq!(record.games_won, 2);
        assert_eq!(record.created_at, ts(0));
        assert_eq!(record.updated_at, ts(60));
    }

    #[test]
    fn test_apply_never_removes_achievements() {
        let mut record = ProgressRecord::new(ts(0));
        record.achievements.unlock(FIRST_WIN, ts(1));

        let mut other = AchievementSet::new();
        other.unlock(LEVEL_5, ts(2));
        let patch = ProgressPatch {
            achievements: Some(other),
            ..ProgressPatch::default()
        };
        record.apply(&patch, ts(3));

        assert!(record.achievements.contains(FIRST_WIN));
        assert!(record.achievements.contains(LEVEL_5));
    }

    #[test]
    fn test_onboarding_patches_accumulate() {
        let mut record = ProgressRecord::new(ts(0));
        record.apply(&ProgressPatch::onboarding(&[OnboardingStep::Profile]), ts(1));
        record.apply(&ProgressPatch::onboarding(&[OnboardingStep::FirstSession]), ts(2));
        assert!(record.onboarding.is_complete(OnboardingStep::Profile));
        assert_eq!(record.onboarding.next_step(), Some(OnboardingStep::ReviewFeedback));
    }

    #[test]
    fn test_patch_merge_later_wins() {
        let mut first = ProgressPatch {
            xp: Some(10),
            games_won: Some(1),
            ..ProgressPatch::default()
        };
        let later = ProgressPatch {
            xp: Some(40),
            level: Some(1),
            ..ProgressPatch::default()
        };
        first.merge(later);
        assert_eq!(first.xp, Some(40));
        assert_eq!(first.level, Some(1));
        assert_eq!(first.games_won, Some(1));
        assert!(!first.is_empty());
        assert!(ProgressPatch::default().is_empty());
    }

    #[test]
    fn test_snapshot_roundtrip_through_record() {
        let table = LevelTable::default();
        let mut snapshot = ProgressSnapshot::new();
        snapshot.xp = 250;
        snapshot.level = 3;
        snapshot.total_games = 2;
        snapshot.streak = 4;
        snapshot.achievements.unlock(FIRST_WIN, ts(0));

        let mut record = ProgressRecord::new(ts(0));
        record.apply(&ProgressPatch::full(&snapshot), ts(5));
        let restored = record.to_snapshot(&table).unwrap();

        assert_eq!(restored.xp, 250);
        assert_eq!(restored.level, 3);
        assert_eq!(restored.total_games, 2);
        // Streaks are per session
        assert_eq!(restored.streak, 0);
        assert!(restored.has_achievement(FIRST_WIN));
    }
}

//! Progress Engine
//!
//! Computes the next `ProgressSnapshot` from the current one plus one event.
//! The engine is pure: time comes in as an argument and notifications are
//! returned, never delivered.
//!
//! ## Scored turn, in order
//!
//! 1. Category XP: perfect +50 (unlocks `perfect_pitch`), objection handled
//!    +30 (persuasion +0.1), closing attempt +40 (confidence +0.1), generic +25
//! 2. Level-up loop: each crossed floor grants a level, +100 XP and +0.2 to
//!    every stat; bonuses may cascade into further level-ups
//! 3. Streak milestone: a pending previous-streak of 5, 10, 15... grants +50 XP,
//!    exactly 5 unlocks `streak_5`
//! 4. First win: first correct response with no games played
//! 5. Cap: XP never passes the final level's floor

use crate::achievements::{
    AchievementSet, CHAMPION, FIRST_WIN, LEVEL_5, MAX_LEVEL, PERFECT_PITCH, STREAK_5,
    STREAK_MASTER, VETERAN,
};
use crate::levels::LevelTable;
use crate::progress::{CharacterStats, Notification, ProgressEvent, ProgressSnapshot, TurnCategory};
use chrono::{DateTime, Utc};

/// XP granted for completing a level
pub const LEVEL_COMPLETE_BONUS: u64 = 100;

/// Streak milestones fire every this many steps
pub const STREAK_MILESTONE_INTERVAL: u32 = 5;

/// XP granted at a streak milestone
pub const STREAK_MILESTONE_BONUS: u64 = 50;

/// Level that unlocks `level_5`
const LEVEL_5_TRIGGER: u32 = 5;

/// Lifetime thresholds for game-result achievements
const VETERAN_GAMES: u32 = 10;
const CHAMPION_WINS: u32 = 10;
const STREAK_MASTER_STREAK: u32 = 10;

/// Result of applying one event
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub snapshot: ProgressSnapshot,
    pub notifications: Vec<Notification>,
}

impl EventOutcome {
    pub fn leveled_up(&self) -> bool {
        self.notifications
            .iter()
            .any(|n| matches!(n, Notification::LevelUp { .. }))
    }

    pub fn unlocked(&self) -> impl Iterator<Item = &str> {
        self.notifications.iter().filter_map(|n| match n {
            Notification::AchievementUnlocked { id } => Some(id.as_str()),
            _ => None,
        })
    }
}

/// The progress rules bound to a level table
#[derive(Debug, Clone, Default)]
pub struct ProgressEngine {
    table: LevelTable,
}

impl ProgressEngine {
    pub fn new(table: LevelTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &LevelTable {
        &self.table
    }

    /// Apply one event at time `at`
    pub fn apply(
        &self,
        snapshot: &ProgressSnapshot,
        event: &ProgressEvent,
        at: DateTime<Utc>,
    ) -> EventOutcome {
        let mut next = snapshot.clone();
        let mut notifications = Vec::new();

        match *event {
            ProgressEvent::UserTurnScored { category } => {
                self.score_turn(&mut next, category, at, &mut notifications);
            }
            ProgressEvent::LevelUpCheck => {
                self.resolve_level_ups(&mut next, at, &mut notifications);
                self.enforce_cap(&mut next);
            }
            ProgressEvent::StreakTick { success } => tick_streak(&mut next, success),
        }

        EventOutcome {
            snapshot: next,
            notifications,
        }
    }

    /// Fold a finished game into the lifetime counters
    pub fn record_game_result(
        &self,
        snapshot: &ProgressSnapshot,
        won: bool,
        at: DateTime<Utc>,
    ) -> EventOutcome {
        let mut next = snapshot.clone();
        let mut notifications = Vec::new();

        next.total_games = next.total_games.saturating_add(1);
        if won {
            next.games_won = next.games_won.saturating_add(1);
        }
        next.highest_streak = next.highest_streak.max(next.streak);

        let achievements = &mut next.achievements;
        if next.total_games >= VETERAN_GAMES {
            unlock(achievements, VETERAN, at, &mut notifications);
        }
        if next.games_won >= CHAMPION_WINS {
            unlock(achievements, CHAMPION, at, &mut notifications);
        }
        if next.highest_streak >= STREAK_MASTER_STREAK {
            unlock(achievements, STREAK_MASTER, at, &mut notifications);
        }
        if next.level >= self.table.max_level() {
            unlock(achievements, MAX_LEVEL, at, &mut notifications);
        }

        EventOutcome {
            snapshot: next,
            notifications,
        }
    }

    fn score_turn(
        &self,
        next: &mut ProgressSnapshot,
        category: TurnCategory,
        at: DateTime<Utc>,
        notifications: &mut Vec<Notification>,
    ) {
        next.xp = next.xp.saturating_add(category.base_xp());
        match category {
            TurnCategory::Perfect => {
                unlock(&mut next.achievements, PERFECT_PITCH, at, notifications);
            }
            TurnCategory::ObjectionHandled => next.stats.bump_persuasion(CharacterStats::TURN_STEP),
            TurnCategory::ClosingAttempt => next.stats.bump_confidence(CharacterStats::TURN_STEP),
            TurnCategory::Generic => {}
        }
        if category.is_correct() {
            next.correct_responses = next.correct_responses.saturating_add(1);
        }

        self.resolve_level_ups(next, at, notifications);

        if let Some(previous) = next.pending_streak_milestone.take() {
            if is_milestone(previous) {
                next.xp = next.xp.saturating_add(STREAK_MILESTONE_BONUS);
                notifications.push(Notification::StreakMilestone {
                    streak: previous,
                    bonus_xp: STREAK_MILESTONE_BONUS,
                });
                if previous == STREAK_MILESTONE_INTERVAL {
                    unlock(&mut next.achievements, STREAK_5, at, notifications);
                }
                // The milestone bonus is an XP award like any other
                self.resolve_level_ups(next, at, notifications);
            }
        }

        if next.total_games == 0 && next.correct_responses > 0 {
            unlock(&mut next.achievements, FIRST_WIN, at, notifications);
        }

        self.enforce_cap(next);
    }

    fn resolve_level_ups(
        &self,
        next: &mut ProgressSnapshot,
        at: DateTime<Utc>,
        notifications: &mut Vec<Notification>,
    ) {
        while next.level < self.table.max_level() {
            match self.table.next_floor(next.level) {
                Some(floor) if next.xp >= floor => {}
                _ => break,
            }

            next.level += 1;
            next.xp = next.xp.saturating_add(LEVEL_COMPLETE_BONUS);
            next.stats.bump_all(CharacterStats::LEVEL_UP_STEP);
            notifications.push(Notification::LevelUp { level: next.level });

            if next.level == LEVEL_5_TRIGGER {
                unlock(&mut next.achievements, LEVEL_5, at, notifications);
            }
        }
    }

    fn enforce_cap(&self, next: &mut ProgressSnapshot) {
        if next.level >= self.table.max_level() {
            let cap = self.table.xp_cap();
            if next.xp > cap {
                next.xp = cap;
            }
        }
    }
}

fn is_milestone(streak: u32) -> bool {
    streak > 0 && streak % STREAK_MILESTONE_INTERVAL == 0
}

/// A reached milestone stays pending until a scored turn pays it out, even
/// when further successful ticks arrive first.
fn tick_streak(next: &mut ProgressSnapshot, success: bool) {
    if success {
        if !next.pending_streak_milestone.is_some_and(is_milestone) {
            next.pending_streak_milestone = Some(next.streak);
        }
        next.streak = next.streak.saturating_add(1);
        next.highest_streak = next.highest_streak.max(next.streak);
    } else {
        next.pending_streak_milestone = None;
        next.streak = 0;
    }
}

fn unlock(
    achievements: &mut AchievementSet,
    id: &str,
    at: DateTime<Utc>,
    notifications: &mut Vec<Notification>,
) {
    if achievements.unlock(id, at) {
        notifications.push(Notification::AchievementUnlocked { id: id.to_string() });
    }
}

/// Apply an event with the default level table at the current time
pub fn apply_event(snapshot: &ProgressSnapshot, event: &ProgressEvent) -> EventOutcome {
    ProgressEngine::default().apply(snapshot, event, Utc::now())
}

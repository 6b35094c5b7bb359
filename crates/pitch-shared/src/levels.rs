//! Level System
//!
//! Levels 1-10 driven by a fixed ascending XP threshold table.
//!
//! ## Threshold Table
//!
//! Index 0 is the floor of level 1 (always 0 XP), index n is the floor of
//! level n+1. The default table:
//!
//! | Level | Floor | Title            |
//! |-------|-------|------------------|
//! | 1     | 0     | Cold Caller      |
//! | 2     | 100   | Cold Caller      |
//! | 3     | 200   | Pitch Apprentice |
//! | 4     | 400   | Pitch Apprentice |
//! | 5     | 700   | Deal Maker       |
//! | 6     | 1100  | Deal Maker       |
//! | 7     | 1600  | Closer           |
//! | 8     | 2200  | Closer           |
//! | 9     | 2900  | Rainmaker        |
//! | 10    | 3700  | Pitch Perfect    |

use crate::error::{PitchError, Result};

/// Number of levels; every table carries exactly one floor per level.
pub const LEVEL_COUNT: usize = 10;

/// Default XP floors, one per level.
pub const DEFAULT_THRESHOLDS: [u64; LEVEL_COUNT] = [0, 100, 200, 400, 700, 1100, 1600, 2200, 2900, 3700];

/// Title bands mapping level ranges to titles
pub const TITLE_BANDS: &[(u32, u32, &str)] = &[
    (1, 2, "Cold Caller"),
    (3, 4, "Pitch Apprentice"),
    (5, 6, "Deal Maker"),
    (7, 8, "Closer"),
    (9, 9, "Rainmaker"),
    (10, 10, "Pitch Perfect"),
];

/// Get the title for a level
pub fn title_for_level(level: u32) -> &'static str {
    for &(min, max, title) in TITLE_BANDS {
        if level >= min && level <= max {
            return title;
        }
    }
    "Unknown"
}

/// Ascending XP floors, index-addressed by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<u64>,
}

impl LevelTable {
    /// Build a table from explicit floors.
    ///
    /// Exactly [`LEVEL_COUNT`] floors, the first 0 and the rest strictly
    /// ascending. Only the XP values are configurable.
    pub fn new(thresholds: Vec<u64>) -> Result<Self> {
        if thresholds.len() != LEVEL_COUNT {
            return Err(PitchError::InvalidLevelTable(format!(
                "expected {} floors, got {}",
                LEVEL_COUNT,
                thresholds.len()
            )));
        }

        match thresholds.first() {
            None => return Err(PitchError::InvalidLevelTable("table is empty".to_string())),
            Some(&first) if first != 0 => {
                return Err(PitchError::InvalidLevelTable(format!(
                    "level 1 floor must be 0, got {}",
                    first
                )))
            }
            Some(_) => {}
        }

        if let Some(pos) = thresholds.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PitchError::InvalidLevelTable(format!(
                "floors not ascending at level {}",
                pos + 2
            )));
        }

        Ok(Self { thresholds })
    }

    /// Highest reachable level
    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    /// XP floor of a 1-based level, `None` when out of range
    pub fn floor(&self, level: u32) -> Option<u64> {
        if level == 0 {
            return None;
        }
        self.thresholds.get(level as usize - 1).copied()
    }

    /// XP floor of the level after `level`, `None` at max level
    pub fn next_floor(&self, level: u32) -> Option<u64> {
        self.thresholds.get(level as usize).copied()
    }

    /// XP floor of the final level; XP is capped here
    pub fn xp_cap(&self) -> u64 {
        self.thresholds.last().copied().unwrap_or(0)
    }

    /// Largest level whose floor is <= `xp`
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        self.thresholds.iter().take_while(|&&floor| xp >= floor).count().max(1) as u32
    }

    /// XP still needed to reach the next level (0 at max level)
    pub fn xp_to_next(&self, level: u32, xp: u64) -> u64 {
        match self.next_floor(level) {
            Some(next) => next.saturating_sub(xp),
            None => 0,
        }
    }

    /// Progress to next level as fraction (0.0 - 1.0)
    pub fn progress_to_next(&self, level: u32, xp: u64) -> f64 {
        let (Some(current), Some(next)) = (self.floor(level), self.next_floor(level)) else {
            return 1.0;
        };

        let range = next - current;
        let progress = xp.saturating_sub(current) as f64 / range as f64;
        progress.clamp(0.0, 1.0)
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Execution lives in `commands`.

use clap::{Parser, Subcommand};
use pitch_shared::{GameModeKind, OnboardingStep};
use std::path::PathBuf;

/// PitchPerfect practice engine CLI
#[derive(Parser, Debug)]
#[command(name = "pitchctl")]
#[command(about = "PitchPerfect - sales pitch practice, progress and scores", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides PITCH_DATA_DIR and the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded session (JSONL of session inputs) and apply it to a user's progress
    Replay {
        /// Recorded session file
        file: PathBuf,

        #[arg(long)]
        user: String,

        /// Name shown on leaderboards (defaults to the user id)
        #[arg(long)]
        name: Option<String>,

        /// Game mode (defaults to session.default_mode)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<GameModeKind>,

        /// Print the session report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Practice in the terminal: plain lines are your turns, "coach: ..." lines are the coach
    Practice {
        #[arg(long)]
        user: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, value_parser = parse_mode)]
        mode: Option<GameModeKind>,
    },

    /// Compute a round score without touching any progress
    Score {
        #[arg(long, value_parser = parse_mode)]
        mode: GameModeKind,

        /// In-mode level (rpg)
        #[arg(long, default_value_t = 1)]
        level: u32,

        #[arg(long, default_value_t = 0)]
        correct: u32,

        /// Streak used by streak mode
        #[arg(long, default_value_t = 0)]
        streak: u32,

        /// Streak count used by voiceOlympics
        #[arg(long, default_value_t = 0)]
        streak_count: u32,

        /// Seconds left on the clock (timeAttack)
        #[arg(long, default_value_t = 0)]
        time_remaining: u32,
    },

    /// Show a user's level, XP, stats and badges
    Status {
        #[arg(long)]
        user: String,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// List achievements and which ones a user has
    Achievements {
        #[arg(long)]
        user: String,
    },

    /// Rank recorded scores
    Leaderboard {
        #[arg(long, value_parser = parse_mode)]
        mode: Option<GameModeKind>,

        /// Maximum rows (0 for all)
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Keep only each player's best score
        #[arg(long)]
        best: bool,

        /// Only these user ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        friends: Vec<String>,

        /// Total score per player instead of single rounds
        #[arg(long)]
        totals: bool,
    },

    /// List game modes
    Modes,

    /// Show or update a user's onboarding checklist
    Onboarding {
        #[arg(long)]
        user: String,

        /// Mark a step done
        #[arg(long, value_parser = parse_step)]
        complete: Option<OnboardingStep>,
    },

    /// Print the effective configuration
    Config,
}

fn parse_mode(s: &str) -> Result<GameModeKind, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_step(s: &str) -> Result<OnboardingStep, String> {
    s.parse().map_err(|e| format!("{}", e))
}

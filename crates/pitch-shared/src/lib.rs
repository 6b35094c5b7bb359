//! Shared types and rules for PitchPerfect.
//!
//! Progress engine, score calculator, game modes, turn classification,
//! persisted records and the durable store interface. Nothing in here
//! touches the network or spawns tasks.

pub mod achievements;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod game_mode;
pub mod leaderboard;
pub mod levels;
pub mod onboarding;
pub mod progress;
pub mod record;
pub mod score_log;
pub mod scoring;
pub mod store;
pub mod transcript;

pub use achievements::{AchievementDefinition, AchievementSet, UnlockedAchievement, CATALOG};
pub use classifier::{PhraseClassifier, PhraseRules, TurnClassifier};
pub use engine::{apply_event, EventOutcome, ProgressEngine};
pub use error::PitchError;
pub use feedback::{FeedbackGenerator, FeedbackReport, FeedbackRequest, HeuristicFeedback};
pub use game_mode::{Difficulty, GameMode, GameModeKind, RoundState, GAME_MODES};
pub use levels::LevelTable;
pub use onboarding::{OnboardingProgress, OnboardingStep};
pub use progress::{CharacterStats, Notification, ProgressEvent, ProgressSnapshot, TurnCategory};
pub use record::{ProgressPatch, ProgressRecord};
pub use score_log::{ScoreEntry, ScoreLog};
pub use scoring::{compute_score, RoundMetrics};
pub use store::{FileProgressStore, MemoryProgressStore, ProgressStore};
pub use transcript::{Role, Transcript, TranscriptEvent};

/// Default data directory
pub const DATA_DIR: &str = "/var/lib/pitchperfect";

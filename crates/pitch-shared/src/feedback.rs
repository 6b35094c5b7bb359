//! Performance feedback reports.
//!
//! The feedback service (an LLM in production) returns a structured report
//! that must pass `FeedbackReport::validate` before it is shown or stored.
//! `HeuristicFeedback` builds a report from round metrics alone, for offline
//! use and as a fallback when the service is unavailable.

use crate::error::{PitchError, Result};
use crate::game_mode::{GameMode, GameModeKind};
use crate::scoring::RoundMetrics;
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};

/// Highest allowed score in a report
pub const MAX_REPORT_SCORE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    pub score: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    pub total_score: u8,
    #[serde(default)]
    pub category_scores: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl FeedbackReport {
    /// Check the fixed report schema
    pub fn validate(&self) -> Result<()> {
        if self.total_score > MAX_REPORT_SCORE {
            return Err(PitchError::InvalidReport(format!(
                "total score {} above {}",
                self.total_score, MAX_REPORT_SCORE
            )));
        }
        if let Some(cat) = self.category_scores.iter().find(|c| c.score > MAX_REPORT_SCORE) {
            return Err(PitchError::InvalidReport(format!(
                "category {:?} scored {}",
                cat.name, cat.score
            )));
        }
        if !self.strengths.iter().any(|s| !s.trim().is_empty()) {
            return Err(PitchError::InvalidReport("no strengths listed".to_string()));
        }
        if !self.improvements.iter().any(|s| !s.trim().is_empty()) {
            return Err(PitchError::InvalidReport("no improvement areas listed".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a report from service JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let report: FeedbackReport = serde_json::from_str(json)?;
        report.validate()?;
        Ok(report)
    }
}

/// Everything the feedback service sees about a finished session
#[derive(Debug, Clone)]
pub struct FeedbackRequest<'a> {
    pub transcript: &'a Transcript,
    pub metrics: RoundMetrics,
    pub mode: &'a GameMode,
    pub score: u64,
}

/// Produces a feedback report for a finished session
pub trait FeedbackGenerator: Send + Sync {
    fn generate(&self, request: &FeedbackRequest<'_>) -> Result<FeedbackReport>;
}

/// Metrics-only report builder
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicFeedback;

impl HeuristicFeedback {
    fn percent(part: u32, whole: usize) -> u8 {
        if whole == 0 {
            return 0;
        }
        ((part as f64 / whole as f64) * 100.0).round().min(100.0) as u8
    }
}

impl FeedbackGenerator for HeuristicFeedback {
    fn generate(&self, request: &FeedbackRequest<'_>) -> Result<FeedbackReport> {
        let turns = request.transcript.user_turns();
        let metrics = &request.metrics;

        let accuracy = Self::percent(metrics.correct_responses, turns);
        let consistency = Self::percent(metrics.streak_count, turns);
        let engagement = (turns.min(10) * 10) as u8;

        let total = ((accuracy as u32 * 5 + consistency as u32 * 3 + engagement as u32 * 2) / 10) as u8;

        let mut strengths = Vec::new();
        let mut improvements = Vec::new();

        if accuracy >= 60 {
            strengths.push("Most of your responses landed with the prospect".to_string());
        } else {
            improvements.push("Tie each answer back to the prospect's stated need".to_string());
        }
        if consistency >= 50 {
            strengths.push("You kept momentum across consecutive turns".to_string());
        } else {
            improvements.push("Work on keeping quality steady from turn to turn".to_string());
        }
        if engagement >= 60 {
            strengths.push("You kept the conversation going".to_string());
        } else {
            improvements.push("Stay in the conversation longer before closing".to_string());
        }

        if strengths.is_empty() {
            strengths.push("You showed up and practiced".to_string());
        }
        if improvements.is_empty() {
            improvements.push("Try a harder mode to keep improving".to_string());
        }

        let recommendations = vec![match request.mode.kind {
            GameModeKind::Rpg => "Replay Sales Quest and aim for the final level",
            GameModeKind::Streak => "Practice objection handling to protect your streak",
            GameModeKind::TimeAttack => "Keep answers short to beat the clock",
            GameModeKind::Mystery => "Ask more discovery questions before pitching",
            GameModeKind::VoiceOlympics => "Record yourself and review pace and tone",
        }
        .to_string()];

        let report = FeedbackReport {
            total_score: total.min(MAX_REPORT_SCORE),
            category_scores: vec![
                CategoryScore { name: "Accuracy".to_string(), score: accuracy, comment: String::new() },
                CategoryScore { name: "Consistency".to_string(), score: consistency, comment: String::new() },
                CategoryScore { name: "Engagement".to_string(), score: engagement, comment: String::new() },
            ],
            strengths,
            improvements,
            recommendations,
        };
        report.validate()?;
        Ok(report)
    }
}

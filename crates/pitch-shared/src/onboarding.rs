//! Onboarding checklist for new players.

use crate::error::PitchError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Profile,
    FirstSession,
    ReviewFeedback,
    AddFriend,
    JoinLeaderboard,
}

impl OnboardingStep {
    /// Steps in the order they are offered
    pub const ORDER: [OnboardingStep; 5] = [
        Self::Profile,
        Self::FirstSession,
        Self::ReviewFeedback,
        Self::AddFriend,
        Self::JoinLeaderboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::FirstSession => "first_session",
            Self::ReviewFeedback => "review_feedback",
            Self::AddFriend => "add_friend",
            Self::JoinLeaderboard => "join_leaderboard",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Profile => "Set up your profile",
            Self::FirstSession => "Finish your first practice session",
            Self::ReviewFeedback => "Read your feedback report",
            Self::AddFriend => "Add a friend",
            Self::JoinLeaderboard => "Post a score to the leaderboard",
        }
    }
}

impl FromStr for OnboardingStep {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| PitchError::unknown_tag("onboarding step", s))
    }
}

/// Completed steps, in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    completed: Vec<OnboardingStep>,
}

impl OnboardingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a step done. Returns false if it already was.
    pub fn complete(&mut self, step: OnboardingStep) -> bool {
        if self.is_complete(step) {
            return false;
        }
        self.completed.push(step);
        true
    }

    pub fn is_complete(&self, step: OnboardingStep) -> bool {
        self.completed.contains(&step)
    }

    /// First step in offer order not yet done
    pub fn next_step(&self) -> Option<OnboardingStep> {
        OnboardingStep::ORDER
            .into_iter()
            .find(|step| !self.is_complete(*step))
    }

    pub fn percent_complete(&self) -> u8 {
        (self.completed.len() * 100 / OnboardingStep::ORDER.len()) as u8
    }

    pub fn is_finished(&self) -> bool {
        self.next_step().is_none()
    }

    /// Union with another checklist
    pub fn merge(&mut self, other: &OnboardingProgress) {
        for step in &other.completed {
            self.complete(*step);
        }
    }
}

//! Turn classification
//!
//! The coach embeds feedback phrases in its replies ("Excellent response",
//! "great job handling that objection"...). `PhraseClassifier` maps those
//! phrases onto a `TurnCategory`. Anything behind the `TurnClassifier` trait
//! can replace it, e.g. a structured signal from the feedback service.

use crate::error::{PitchError, Result};
use crate::progress::TurnCategory;
use regex::{Regex, RegexBuilder};

/// Maps coach text to the category of the user turn it judges
pub trait TurnClassifier: Send + Sync {
    fn classify(&self, assistant_text: &str) -> TurnCategory;
}

/// Phrase lists per category, checked in priority order
#[derive(Debug, Clone)]
pub struct PhraseRules {
    pub perfect: Vec<String>,
    pub objection_handled: Vec<String>,
    pub closing_attempt: Vec<String>,
}

impl Default for PhraseRules {
    fn default() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            perfect: owned(&["excellent response", "perfect pitch", "outstanding answer"]),
            objection_handled: owned(&[
                "great job handling",
                "handled that objection",
                "good objection handling",
                "nicely addressed",
            ]),
            closing_attempt: owned(&[
                "strong close",
                "great close",
                "nice closing",
                "good attempt to close",
            ]),
        }
    }
}

/// Case-insensitive phrase matcher
#[derive(Debug, Clone)]
pub struct PhraseClassifier {
    rules: Vec<(TurnCategory, Option<Regex>)>,
}

impl PhraseClassifier {
    /// Classifier with the default phrases
    pub fn new() -> Result<Self> {
        Self::with_rules(&PhraseRules::default())
    }

    pub fn with_rules(rules: &PhraseRules) -> Result<Self> {
        Ok(Self {
            rules: vec![
                (TurnCategory::Perfect, compile(&rules.perfect)?),
                (TurnCategory::ObjectionHandled, compile(&rules.objection_handled)?),
                (TurnCategory::ClosingAttempt, compile(&rules.closing_attempt)?),
            ],
        })
    }
}

fn compile(phrases: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| PitchError::InvalidClassifier(e.to_string()))
}

impl TurnClassifier for PhraseClassifier {
    fn classify(&self, assistant_text: &str) -> TurnCategory {
        self.rules
            .iter()
            .find(|(_, re)| re.as_ref().is_some_and(|re| re.is_match(assistant_text)))
            .map(|(category, _)| *category)
            .unwrap_or(TurnCategory::Generic)
    }
}

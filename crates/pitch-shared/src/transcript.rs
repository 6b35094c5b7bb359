//! Transcript events from the voice session.
//!
//! Only final events are kept. The transcript is capped; events past the cap
//! are counted but not stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum events kept per session transcript
pub const MAX_TRANSCRIPT_EVENTS: usize = 500;

/// Who spoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "you"),
            Self::Assistant => write!(f, "coach"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One transcript event, partial or final
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub role: Role,
    pub text: String,
    #[serde(default = "default_final")]
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

fn default_final() -> bool {
    true
}

impl TranscriptEvent {
    pub fn final_text(role: Role, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            is_final: true,
            timestamp,
        }
    }
}

/// Final transcript lines of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    events: Vec<TranscriptEvent>,
    /// Events dropped because the cap was reached
    #[serde(default)]
    pub dropped: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a final event. Returns false if it was partial or over the cap.
    pub fn push(&mut self, event: TranscriptEvent) -> bool {
        if !event.is_final {
            return false;
        }
        if self.events.len() >= MAX_TRANSCRIPT_EVENTS {
            self.dropped += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn events(&self) -> &[TranscriptEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn user_turns(&self) -> usize {
        self.events.iter().filter(|e| e.role == Role::User).count()
    }

    /// Plain `speaker: text` rendering
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&format!("{}: {}\n", event.role, event.text));
        }
        if self.dropped > 0 {
            out.push_str(&format!("[{} more lines not recorded]\n", self.dropped));
        }
        out
    }
}

//! Error types for PitchPerfect.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PitchError {
    #[error("Unknown {kind} tag: {value}")]
    UnknownTag { kind: &'static str, value: String },

    #[error("Invalid level table: {0}")]
    InvalidLevelTable(String),

    #[error("Invalid progress record: {0}")]
    InvalidRecord(String),

    #[error("Invalid feedback report: {0}")]
    InvalidReport(String),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("Invalid classifier rules: {0}")]
    InvalidClassifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PitchError {
    pub fn unknown_tag(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownTag {
            kind,
            value: value.into(),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            PitchError::UnknownTag { .. } => -32010,
            PitchError::InvalidLevelTable(_) => -32011,
            PitchError::InvalidRecord(_) => -32012,
            PitchError::InvalidReport(_) => -32013,
            PitchError::InvalidUserId(_) => -32014,
            PitchError::InvalidClassifier(_) => -32015,
            PitchError::Io(_) => -32006,
            PitchError::Json(_) => -32700,
        }
    }
}

pub type Result<T> = std::result::Result<T, PitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_message() {
        let err = PitchError::unknown_tag("game mode", "chess");
        assert_eq!(err.to_string(), "Unknown game mode tag: chess");
        assert_eq!(err.code(), -32010);
    }
}

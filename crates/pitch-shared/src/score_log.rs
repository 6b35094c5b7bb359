//! Score log for leaderboards.
//!
//! One record per finished session, appended as JSONL.

use crate::error::Result;
use crate::game_mode::GameModeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Score log file name inside the data dir
pub const SCORE_LOG_FILE: &str = "scores.jsonl";

/// A finished session's score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub user_id: String,
    pub display_name: String,
    pub mode: GameModeKind,
    pub score: u64,
    #[serde(default)]
    pub won: bool,
    pub achieved_at: DateTime<Utc>,
}

/// Append-only score log
pub struct ScoreLog {
    path: PathBuf,
}

impl ScoreLog {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SCORE_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry
    pub fn append(&self, entry: &ScoreEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read all entries, skipping malformed lines
    pub fn read_all(&self) -> Result<Vec<ScoreEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // Malformed lines are skipped for forward compatibility
            if let Ok(entry) = serde_json::from_str(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let log = ScoreLog::new(dir.path());
        assert!(log.read_all().unwrap().is_empty());

        let entry = ScoreEntry {
            user_id: "alice".to_string(),
            display_name: "Alice".to_string(),
            mode: GameModeKind::Mystery,
            score: 300,
            won: true,
            achieved_at: Utc::now(),
        };
        log.append(&entry).unwrap();
        log.append(&entry).unwrap();

        let mut raw = fs::read_to_string(log.path()).unwrap();
        raw.push_str("not json\n");
        fs::write(log.path(), raw).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry);
    }
}

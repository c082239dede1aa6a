// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Rename journal with undo support
//!
//! Append-only JSONL file, one completed rename per line. The journal is an
//! audit trail, not pipeline state: the watch loop works the same with it
//! disabled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::Result;

/// One completed rename
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    /// Raw classifier suggestion the final name was derived from
    pub suggestion: String,
    pub undone: bool,
}

impl HistoryEntry {
    /// Build an entry for a rename that just happened
    pub fn record(original_path: PathBuf, new_path: PathBuf, suggestion: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            original_path,
            new_path,
            suggestion,
            undone: false,
        }
    }
}

/// Journal of renames, backed by a JSONL file
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an entry to the journal
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all entries, oldest first. Unparseable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Get entries that haven't been undone
    pub fn get_undoable(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().filter(|e| !e.undone).collect())
    }

    /// Mark an entry as undone, rewriting the journal
    pub fn mark_undone(&self, id: &str) -> Result<()> {
        let entries = self.read_all()?;

        let file = File::create(&self.path)?;
        let mut writer = std::io::BufWriter::new(file);

        for mut entry in entries {
            if entry.id == id {
                entry.undone = true;
            }
            let json = serde_json::to_string(&entry)?;
            writeln!(writer, "{}", json)?;
        }

        Ok(())
    }

    /// Clear the journal
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(from: &str, to: &str) -> HistoryEntry {
        HistoryEntry::record(
            PathBuf::from(from),
            PathBuf::from(to),
            "a suggestion".to_string(),
        )
    }

    #[test]
    fn append_and_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));

        history.append(&entry("/shots/a.png", "/shots/One.png")).unwrap();
        history.append(&entry("/shots/b.png", "/shots/Two.png")).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].new_path, PathBuf::from("/shots/One.png"));
        assert_eq!(entries[1].new_path, PathBuf::from("/shots/Two.png"));
    }

    #[test]
    fn recent_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));

        for i in 0..5 {
            history
                .append(&entry(&format!("/shots/{i}.png"), &format!("/shots/N{i}.png")))
                .unwrap();
        }

        let recent = history.get_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].new_path, PathBuf::from("/shots/N4.png"));
    }

    #[test]
    fn mark_undone_excludes_from_undoable() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));

        let e = entry("/shots/a.png", "/shots/One.png");
        history.append(&e).unwrap();
        history.mark_undone(&e.id).unwrap();

        assert!(history.get_undoable().unwrap().is_empty());
        assert!(history.read_all().unwrap()[0].undone);
    }

    #[test]
    fn missing_journal_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("none.jsonl"));
        assert!(history.read_all().unwrap().is_empty());
    }
}

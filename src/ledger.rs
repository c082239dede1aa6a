// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Feedback ledger: suppression of self-produced filesystem events
//!
//! A successful rename emits a fresh notification for the new path. Without a
//! record of what the pipeline itself just produced, that notification would
//! be debounced, polled, classified and renamed again, forever. The ledger
//! records produced paths; the pipeline consults it before any other
//! processing and drops at most one matching event per entry.
//!
//! The ledger is owned exclusively by the pipeline task, so no locking is
//! needed here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::trace;

/// Registry of paths the pipeline produced via rename.
///
/// A path has at most one entry; re-marking replaces the timestamp.
#[derive(Debug, Default)]
pub struct FeedbackLedger {
    entries: HashMap<PathBuf, Instant>,
}

impl FeedbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` was just produced by a rename.
    pub fn mark_produced(&mut self, path: PathBuf) {
        self.entries.insert(path, Instant::now());
    }

    /// Check whether an event for `path` is the echo of our own rename.
    ///
    /// Consuming: a `true` result removes the entry, so a later independent
    /// event for the same path is processed normally. An entry older than
    /// `ttl` no longer suppresses anything and is dropped on sight.
    pub fn should_suppress(&mut self, path: &Path, ttl: Duration) -> bool {
        match self.entries.remove(path) {
            Some(inserted_at) if inserted_at.elapsed() <= ttl => true,
            Some(_) => {
                trace!("Stale ledger entry for {:?} ignored", path);
                false
            }
            None => false,
        }
    }

    /// Drop entries that were never consumed within `ttl`.
    pub fn sweep(&mut self, ttl: Duration) {
        self.entries.retain(|_, inserted_at| inserted_at.elapsed() <= ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn backdate(&mut self, path: &Path, age: Duration) {
        if let Some(at) = self.entries.get_mut(path) {
            *at = Instant::now() - age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    #[test]
    fn suppresses_exactly_once() {
        let mut ledger = FeedbackLedger::new();
        let path = PathBuf::from("/shots/meeting_notes.png");

        ledger.mark_produced(path.clone());
        assert!(ledger.should_suppress(&path, TTL));
        assert!(!ledger.should_suppress(&path, TTL));
    }

    #[test]
    fn unknown_path_is_not_suppressed() {
        let mut ledger = FeedbackLedger::new();
        assert!(!ledger.should_suppress(Path::new("/shots/fresh.png"), TTL));
    }

    #[test]
    fn expired_entry_does_not_suppress() {
        let mut ledger = FeedbackLedger::new();
        let path = PathBuf::from("/shots/old.png");

        ledger.mark_produced(path.clone());
        ledger.backdate(&path, TTL + Duration::from_secs(1));
        assert!(!ledger.should_suppress(&path, TTL));
        assert!(ledger.is_empty());
    }

    #[test]
    fn remark_replaces_existing_entry() {
        let mut ledger = FeedbackLedger::new();
        let path = PathBuf::from("/shots/twice.png");

        ledger.mark_produced(path.clone());
        ledger.backdate(&path, TTL + Duration::from_secs(1));
        ledger.mark_produced(path.clone());

        // The fresh timestamp wins over the stale one.
        assert!(ledger.should_suppress(&path, TTL));
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let mut ledger = FeedbackLedger::new();
        let old = PathBuf::from("/shots/old.png");
        let fresh = PathBuf::from("/shots/fresh.png");

        ledger.mark_produced(old.clone());
        ledger.mark_produced(fresh.clone());
        ledger.backdate(&old, TTL + Duration::from_secs(1));
        ledger.sweep(TTL);

        assert_eq!(ledger.len(), 1);
        assert!(ledger.should_suppress(&fresh, TTL));
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! The watch pipeline: one task owning all mutable per-path state
//!
//! Raw notifications, debounce expiries, poll ticks and classifier results
//! all arrive here as messages on a single channel, so the candidate table,
//! the feedback ledger and the in-flight set are never touched from two
//! places at once. Timers are spawned sleeps that post a generation-stamped
//! message back; restarting a path bumps its generation, which silently
//! invalidates every timer the previous cycle left behind.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::classifier::Classifier;
use crate::config::{AppConfig, TuningConfig};
use crate::history::{History, HistoryEntry};
use crate::ledger::FeedbackLedger;
use crate::rename::{self, sanitize_name, target_path, RenameOutcome};
use crate::stability::{AbortReason, PollCycle, PollStep, SizeSample};
use crate::watcher::{is_candidate, AccessScope, DirWatcher, RawEvent, RawEventKind, ScopeGuard};
use crate::{Result, SnapscribeError};

/// Everything the pipeline task reacts to
#[derive(Debug)]
pub enum Msg {
    /// Raw event from the notification stream
    Raw(RawEvent),
    /// A debounce quiet period ran out
    DebounceElapsed { path: PathBuf, generation: u64 },
    /// Time for the next size sample
    PollDue { path: PathBuf, generation: u64 },
    /// The classifier task finished for a file
    Classified { path: PathBuf, result: Result<String> },
    /// Stop the session
    Shutdown,
}

/// Per-path bookkeeping between the first raw event and a terminal outcome
#[derive(Debug)]
struct Candidate {
    /// Stamp carried by this candidate's outstanding timer; a mismatch on
    /// arrival means the timer belonged to a superseded cycle.
    generation: u64,
    state: CandidateState,
}

#[derive(Debug)]
enum CandidateState {
    Debouncing,
    Polling(PollCycle),
}

/// The serialized pipeline core
pub struct Pipeline {
    tx: UnboundedSender<Msg>,
    tuning: TuningConfig,
    max_name_len: usize,
    dry_run: bool,
    classifier: Arc<dyn Classifier>,
    history: Option<History>,
    candidates: HashMap<PathBuf, Candidate>,
    ledger: FeedbackLedger,
    in_flight: HashSet<PathBuf>,
    next_generation: u64,
}

impl Pipeline {
    pub fn new(
        tuning: TuningConfig,
        max_name_len: usize,
        dry_run: bool,
        classifier: Arc<dyn Classifier>,
        history: Option<History>,
        tx: UnboundedSender<Msg>,
    ) -> Self {
        Self {
            tx,
            tuning,
            max_name_len,
            dry_run,
            classifier,
            history,
            candidates: HashMap::new(),
            ledger: FeedbackLedger::new(),
            in_flight: HashSet::new(),
            next_generation: 0,
        }
    }

    /// Run the message loop until shutdown. Consumes the watcher so dropping
    /// it here is what stops new notifications, and the scope guard so the
    /// access grant is released on every exit path.
    pub async fn run(mut self, mut rx: UnboundedReceiver<Msg>, watcher: DirWatcher, guard: ScopeGuard) {
        let mut sweep = tokio::time::interval(self.tuning.ledger_ttl());

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(Msg::Shutdown) | None => break,
                    Some(msg) => self.handle(msg),
                },
                _ = sweep.tick() => self.ledger.sweep(self.tuning.ledger_ttl()),
            }
        }

        info!("Stopping watch of {:?}", watcher.root());
        drop(watcher);
        self.candidates.clear();
        self.in_flight.clear();
        self.ledger.clear();
        drop(guard);
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Raw(event) => self.on_raw(event),
            Msg::DebounceElapsed { path, generation } => self.on_debounce_elapsed(path, generation),
            Msg::PollDue { path, generation } => self.on_poll_due(path, generation),
            Msg::Classified { path, result } => self.on_classified(path, result),
            Msg::Shutdown => {}
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn on_raw(&mut self, event: RawEvent) {
        if event.kind == RawEventKind::Removed {
            if self.candidates.remove(&event.path).is_some() {
                debug!("Dropped candidate for removed file {:?}", event.path);
            }
            return;
        }

        if !is_candidate(&event.path) {
            trace!("Ignoring non-candidate path {:?}", event.path);
            return;
        }

        // Feedback-loop break: the echo of our own rename goes no further.
        if self.ledger.should_suppress(&event.path, self.tuning.ledger_ttl()) {
            debug!("Suppressed self-produced event for {:?}", event.path);
            return;
        }

        // Insert-or-restart: a burst in progress gets its timer superseded.
        let generation = self.bump();
        self.candidates.insert(
            event.path.clone(),
            Candidate {
                generation,
                state: CandidateState::Debouncing,
            },
        );
        self.schedule(event.path, generation, Timer::Debounce);
    }

    fn on_debounce_elapsed(&mut self, path: PathBuf, generation: u64) {
        let Some(candidate) = self.candidates.get(&path) else {
            return;
        };
        if candidate.generation != generation
            || !matches!(candidate.state, CandidateState::Debouncing)
        {
            // A newer burst owns this path now.
            return;
        }

        // Revalidate: the quiet period is long enough for the file to have
        // been moved or deleted since the last event.
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            _ => {
                self.candidates.remove(&path);
                debug!("Settled path no longer present, dropped: {:?}", path);
                return;
            }
        }

        self.begin_polling(path);
    }

    /// Start (or restart) a poll cycle for `path`. Replacing the candidate
    /// resets size and attempt bookkeeping and orphans any outstanding timer,
    /// so at most one cycle is ever live per path.
    fn begin_polling(&mut self, path: PathBuf) {
        let generation = self.bump();
        self.candidates.insert(
            path.clone(),
            Candidate {
                generation,
                state: CandidateState::Polling(PollCycle::new(self.tuning.poll_attempts)),
            },
        );
        self.schedule(path, generation, Timer::Poll);
    }

    fn on_poll_due(&mut self, path: PathBuf, generation: u64) {
        let Some(candidate) = self.candidates.get_mut(&path) else {
            return;
        };
        if candidate.generation != generation {
            return;
        }
        let CandidateState::Polling(cycle) = &mut candidate.state else {
            return;
        };

        let sample = match std::fs::metadata(&path) {
            Ok(meta) => SizeSample::Bytes(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => SizeSample::Missing,
            Err(e) => {
                warn!("Size read failed for {:?}: {}", path, e);
                SizeSample::Unreadable
            }
        };

        let step = cycle.observe(sample);
        let attempt = cycle.attempt();

        match step {
            PollStep::Reschedule => {
                trace!("Attempt {}: {:?} still settling", attempt, path);
                self.schedule(path, generation, Timer::Poll);
            }
            PollStep::Stable => {
                self.candidates.remove(&path);
                self.on_ready(path);
            }
            PollStep::Aborted(reason) => {
                self.candidates.remove(&path);
                match reason {
                    AbortReason::Disappeared => {
                        debug!("File disappeared while settling: {:?}", path)
                    }
                    AbortReason::Io => warn!("Giving up on {:?}: metadata unreadable", path),
                    AbortReason::Timeout => warn!(
                        "Size never settled for {:?} after {} attempts; waiting for a fresh event",
                        path, attempt
                    ),
                }
            }
        }
    }

    /// A file finished writing. Hand it to the classifier on its own task;
    /// the result comes back as a message so ledger and rename never race
    /// with event handling.
    fn on_ready(&mut self, path: PathBuf) {
        if !self.in_flight.insert(path.clone()) {
            warn!("Classification already in flight for {:?}", path);
            return;
        }

        info!("File settled, classifying: {:?}", path);
        let classifier = Arc::clone(&self.classifier);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = classify_file(classifier.as_ref(), &path).await;
            let _ = tx.send(Msg::Classified { path, result });
        });
    }

    fn on_classified(&mut self, path: PathBuf, result: Result<String>) {
        self.in_flight.remove(&path);

        let suggestion = match result {
            Ok(text) => text,
            Err(e) => {
                error!("Classification failed for {:?}: {}", path, e);
                return;
            }
        };

        let stem = sanitize_name(&suggestion, self.max_name_len);
        if stem.is_empty() {
            warn!(
                "No usable name in classifier output for {:?}: {:?}",
                path, suggestion
            );
            return;
        }

        let Some(target) = target_path(&path, &stem) else {
            warn!("Cannot determine parent directory for {:?}", path);
            return;
        };

        if self.dry_run {
            info!("DRY RUN: would rename {:?} -> {:?}", path, target);
            return;
        }

        match rename::execute(&path, &target) {
            Ok(RenameOutcome::Renamed { from, to }) => {
                // Mark first: the rename's own notification is already on its
                // way and must find the ledger entry waiting.
                self.ledger.mark_produced(to.clone());
                info!("Renamed {:?} -> {:?}", from, to);
                if let Some(history) = &self.history {
                    let entry = HistoryEntry::record(from, to, suggestion);
                    if let Err(e) = history.append(&entry) {
                        warn!("Failed to write history entry: {}", e);
                    }
                }
            }
            Ok(RenameOutcome::Unchanged) => debug!("Already named correctly: {:?}", path),
            Ok(RenameOutcome::Collision { target }) => {
                info!("Target {:?} exists, leaving {:?} untouched", target, path)
            }
            Ok(RenameOutcome::SourceVanished) => {
                debug!("File vanished before rename: {:?}", path)
            }
            Err(e) => error!("Rename failed for {:?}: {}", path, e),
        }
    }

    fn schedule(&self, path: PathBuf, generation: u64, timer: Timer) {
        let tx = self.tx.clone();
        let delay = match timer {
            Timer::Debounce => self.tuning.debounce(),
            Timer::Poll => self.tuning.poll_interval(),
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let msg = match timer {
                Timer::Debounce => Msg::DebounceElapsed { path, generation },
                Timer::Poll => Msg::PollDue { path, generation },
            };
            let _ = tx.send(msg);
        });
    }
}

#[derive(Clone, Copy)]
enum Timer {
    Debounce,
    Poll,
}

async fn classify_file(classifier: &dyn Classifier, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(classifier.describe(&bytes).await?)
}

/// Handle to a running watch session
pub struct WatchSession {
    tx: UnboundedSender<Msg>,
    task: JoinHandle<()>,
}

impl WatchSession {
    /// Acquire directory access, subscribe to notifications, and spawn the
    /// pipeline task. The scope is released on every exit path, including a
    /// failed subscription.
    pub fn start(
        config: &AppConfig,
        classifier: Arc<dyn Classifier>,
        scope: Arc<dyn AccessScope>,
        dry_run: bool,
    ) -> Result<Self> {
        let dir = PathBuf::from(&config.watch_dir);

        if !scope.begin() {
            return Err(SnapscribeError::AccessDenied(dir));
        }
        let guard = ScopeGuard::new(scope);

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = tx.clone();
        let watcher = DirWatcher::subscribe(&dir, move |event| {
            let _ = sink.send(Msg::Raw(event));
        })?;

        let history = (config.history.enabled && !dry_run)
            .then(|| History::new(PathBuf::from(&config.history.path)));

        let pipeline = Pipeline::new(
            config.tuning,
            config.rules.max_length,
            dry_run,
            classifier,
            history,
            tx.clone(),
        );
        let task = tokio::spawn(pipeline.run(rx, watcher, guard));

        Ok(Self { tx, task })
    }

    /// Stop the session: no new notifications, all timers orphaned, all
    /// per-path bookkeeping cleared. Does not block the caller beyond the
    /// pipeline task draining its current message.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Msg::Shutdown);
        let _ = self.task.await;
    }
}

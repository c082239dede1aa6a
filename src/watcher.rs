// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! File system watcher and directory access scope
//!
//! Thin adapter over `notify`: raw OS events are converted per-path and
//! forwarded into the pipeline channel from notify's callback thread. The
//! delivery contract assumed upstream is at-least-once, possibly batched,
//! possibly duplicated, with no cross-path ordering; the pipeline's debounce
//! layer absorbs all of that.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::Result;

/// Image extensions eligible for classification, matched case-insensitively
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp", "gif"];

/// Kind of a raw filesystem event, before debouncing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Modified,
    Renamed,
    Removed,
}

/// One raw per-path event as delivered by the OS notification stream
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
    pub at: Instant,
}

/// Check whether a path is worth debouncing at all: visible, and carrying an
/// image extension from the allowed set.
pub fn is_candidate(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Skip hidden files and editor droppings
    if filename.starts_with('.') {
        return false;
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Watcher over a single directory, non-recursive.
///
/// Held alive for the duration of a watch session; dropping it unsubscribes
/// from OS notifications.
pub struct DirWatcher {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl DirWatcher {
    /// Subscribe to `dir`, forwarding each per-path event through `sink`.
    ///
    /// `sink` is called on notify's own thread; it must only hand the event
    /// off (a channel send), never touch pipeline state.
    pub fn subscribe<F>(dir: &Path, sink: F) -> Result<Self>
    where
        F: Fn(RawEvent) + Send + 'static,
    {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let Some(kind) = convert_kind(&event.kind) else {
                        return;
                    };
                    let at = Instant::now();
                    // One OS callback may batch several paths.
                    for path in event.paths {
                        sink(RawEvent {
                            path,
                            kind,
                            at,
                        });
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            },
            Config::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", dir);

        Ok(Self {
            _inner: watcher,
            root: dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn convert_kind(kind: &EventKind) -> Option<RawEventKind> {
    match kind {
        EventKind::Create(_) => Some(RawEventKind::Created),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(RawEventKind::Renamed),
        EventKind::Modify(_) => Some(RawEventKind::Modified),
        EventKind::Remove(_) => Some(RawEventKind::Removed),
        _ => None,
    }
}

/// Boundary to the OS capability that authorizes directory access.
///
/// On platforms without scoped grants the default implementation only checks
/// that the directory is actually readable.
pub trait AccessScope: Send + Sync {
    /// Acquire access. `false` means the directory is unavailable and the
    /// watch session must not start.
    fn begin(&self) -> bool;

    /// Release access. Idempotent; called on every exit path.
    fn end(&self);
}

/// Default scope: plain directory readability, no OS grant involved.
pub struct DirAccess {
    dir: PathBuf,
    active: AtomicBool,
}

impl DirAccess {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            active: AtomicBool::new(false),
        }
    }
}

impl AccessScope for DirAccess {
    fn begin(&self) -> bool {
        match std::fs::read_dir(&self.dir) {
            Ok(_) => {
                self.active.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!("Directory not accessible {:?}: {}", self.dir, e);
                false
            }
        }
    }

    fn end(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Released access to {:?}", self.dir);
        }
    }
}

/// Releases the scope when dropped, so abnormal pipeline exits still call
/// `end()` exactly as clean shutdowns do.
pub struct ScopeGuard(Arc<dyn AccessScope>);

impl ScopeGuard {
    pub fn new(scope: Arc<dyn AccessScope>) -> Self {
        Self(scope)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

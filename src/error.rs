// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Error types for snapscribe

use std::path::PathBuf;
use thiserror::Error;

use crate::classifier::ClassifierError;

/// Result type alias for snapscribe operations
pub type Result<T> = std::result::Result<T, SnapscribeError>;

/// Snapscribe error types.
///
/// Per-file poll aborts and rename collisions are deliberately *not* here:
/// they are local, non-fatal outcomes carried by [`crate::stability::PollStep`]
/// and [`crate::rename::RenameOutcome`]. This enum covers failures that end a
/// watch session or a whole command.
#[derive(Error, Debug)]
pub enum SnapscribeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Watch subscription failed: {0}")]
    Subscription(#[from] notify::Error),

    #[error("Directory access not granted: {0}")]
    AccessDenied(PathBuf),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Snapscribe: AI screenshot watcher & renamer
//!
//! Watches a directory for freshly written images, waits for each write to
//! finish, asks a vision model for a short description, and renames the file
//! from the sanitized result. The rename's own filesystem notification is
//! suppressed so the pipeline never feeds on its own output.

pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod pipeline;
pub mod rename;
pub mod stability;
pub mod watcher;

pub use config::AppConfig;
pub use error::{Result, SnapscribeError};

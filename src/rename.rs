// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Filename sanitization and rename execution

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::Result;

/// How a rename attempt concluded. None of these are session errors; a
/// collision in particular is an expected outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The file now lives at `to`
    Renamed { from: PathBuf, to: PathBuf },
    /// Target equals the original path, nothing to do
    Unchanged,
    /// Target already exists; the original file was left untouched
    Collision { target: PathBuf },
    /// The original file vanished before the rename could happen
    SourceVanished,
}

/// Sanitize classifier output into a filesystem-safe name stem.
///
/// Keeps `[A-Za-z0-9_-]`, collapses every run of anything else into a single
/// `_`, trims leading/trailing separators, and truncates to `max_len`. Case
/// is preserved. Returns an empty string when nothing usable remains.
pub fn sanitize_name(raw: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(raw.len().min(max_len));
    let mut pending_sep = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            // '_' itself joins the separator run so "a _ b" and "a_b" agree
            pending_sep = true;
        }
    }

    if out.len() > max_len {
        // Output is pure ASCII, so byte truncation is char-safe.
        out.truncate(max_len);
    }
    out.trim_end_matches(['_', '-']).to_string()
}

/// Compute the rename target: `stem.ext` next to the original, keeping the
/// original extension. `None` when the path has no parent directory.
pub fn target_path(original: &Path, stem: &str) -> Option<PathBuf> {
    let parent = original.parent()?;
    let name = match original.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    };
    Some(parent.join(name))
}

/// Rename `original` to `target` under the no-overwrite policy.
///
/// An existing target aborts the attempt; no uniquifying suffix is invented,
/// the original keeps its name until a later event retries it. Only
/// unexpected I/O failures surface as errors.
pub fn execute(original: &Path, target: &Path) -> Result<RenameOutcome> {
    if original == target {
        return Ok(RenameOutcome::Unchanged);
    }

    if target.exists() {
        return Ok(RenameOutcome::Collision {
            target: target.to_path_buf(),
        });
    }

    match std::fs::rename(original, target) {
        Ok(()) => Ok(RenameOutcome::Renamed {
            from: original.to_path_buf(),
            to: target.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Source vanished before rename: {:?}", original);
            Ok(RenameOutcome::SourceVanished)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sanitizes_classifier_chatter() {
        assert_eq!(
            sanitize_name("Login Error: 404!! Page", 100),
            "Login_Error_404_Page"
        );
    }

    #[test]
    fn preserves_case_and_hyphens() {
        assert_eq!(sanitize_name("Re-Sign In Sheet", 100), "Re-Sign_In_Sheet");
    }

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(sanitize_name("a   ...  b___c", 100), "a_b_c");
        assert_eq!(sanitize_name("  \"quoted\"  ", 100), "quoted");
    }

    #[test]
    fn unusable_input_becomes_empty() {
        assert_eq!(sanitize_name("!!! ???", 100), "");
        assert_eq!(sanitize_name("", 100), "");
    }

    #[test]
    fn truncates_and_trims_trailing_separator() {
        let long = "word_".repeat(40);
        let out = sanitize_name(&long, 12);
        assert_eq!(out, "word_word_wo");
        let out = sanitize_name(&long, 10);
        assert_eq!(out, "word_word");
    }

    #[test]
    fn target_keeps_original_extension() {
        let target = target_path(Path::new("/shots/Screenshot 2026.png"), "Login_Page").unwrap();
        assert_eq!(target, PathBuf::from("/shots/Login_Page.png"));
    }

    #[test]
    fn target_without_extension() {
        let target = target_path(Path::new("/shots/capture"), "Login_Page").unwrap();
        assert_eq!(target, PathBuf::from("/shots/Login_Page"));
    }

    #[test]
    fn rename_moves_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("raw.png");
        fs::write(&original, b"pixels").unwrap();

        let target = dir.path().join("Login_Page.png");
        let outcome = execute(&original, &target).unwrap();

        assert_eq!(
            outcome,
            RenameOutcome::Renamed {
                from: original.clone(),
                to: target.clone()
            }
        );
        assert!(!original.exists());
        assert_eq!(fs::read(&target).unwrap(), b"pixels");
    }

    #[test]
    fn collision_leaves_both_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("raw.png");
        let target = dir.path().join("Login_Page.png");
        fs::write(&original, b"new").unwrap();
        fs::write(&target, b"old").unwrap();

        let outcome = execute(&original, &target).unwrap();

        assert_eq!(
            outcome,
            RenameOutcome::Collision {
                target: target.clone()
            }
        );
        assert_eq!(fs::read(&original).unwrap(), b"new");
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }

    #[test]
    fn same_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("Login_Page.png");
        fs::write(&original, b"pixels").unwrap();

        let outcome = execute(&original, &original).unwrap();
        assert_eq!(outcome, RenameOutcome::Unchanged);
        assert!(original.exists());
    }

    #[test]
    fn vanished_source_is_reported_distinctly() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("gone.png");
        let target = dir.path().join("Login_Page.png");

        let outcome = execute(&original, &target).unwrap();
        assert_eq!(outcome, RenameOutcome::SourceVanished);
    }
}

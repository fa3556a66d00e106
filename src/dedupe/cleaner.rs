// src/dedupe/cleaner.rs
// =============================================================================
// Walks a directory tree, flags duplicate copies and gets rid of them.
//
// How it works:
// 1. Collect every regular file below the target (skipping the trash dir)
// 2. Keep the ones with a wanted extension whose base file sits beside them
// 3. Move each one into the trash directory, or delete it, or (dry run)
//    just report it
//
// A failure on one file is logged and recorded in the report; the scan
// always carries on with the next file.
// =============================================================================

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::pattern::{classify, DuplicateMatch};
use crate::config::{CleanConfig, CleanMode};
use crate::error::{HarvestError, Result};

/// What happened to one flagged file
#[derive(Debug, Clone, Serialize)]
pub struct CleanOutcome {
    #[serde(flatten)]
    pub duplicate: DuplicateMatch,
    /// Where the file ended up (move mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CleanOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub dir: PathBuf,
    pub mode: CleanMode,
    pub dry_run: bool,
    pub trash_dir: PathBuf,
    pub outcomes: Vec<CleanOutcome>,
}

impl CleanReport {
    /// Files moved, deleted, or (dry run) that would have been
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.processed()
    }
}

/// Returns true when `path` has one of `extensions` (empty = any)
pub fn has_wanted_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Lists every duplicate below `config.dir` without touching anything
pub fn find_duplicates(config: &CleanConfig) -> Result<Vec<DuplicateMatch>> {
    if !config.dir.is_dir() {
        return Err(HarvestError::MissingDirectory(config.dir.clone()));
    }

    let trash = config.trash_dir();
    let mut found = Vec::new();

    // Sorted so reports come out in a stable order
    // The trash directory is never descended into
    let walker = WalkDir::new(&config.dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.path() == trash));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        // Directories and symlinks are never duplicates themselves
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_wanted_extension(entry.path(), &config.extensions) {
            continue;
        }
        // Only a copy whose original sits beside it counts
        if let Some(duplicate) = classify(entry.path()) {
            debug!(path = %duplicate.path.display(), base = %duplicate.base.display(), "duplicate found");
            found.push(duplicate);
        }
    }

    Ok(found)
}

/// Finds duplicates and applies the configured policy to each of them
pub fn clean_directory(config: &CleanConfig) -> Result<CleanReport> {
    info!("Scanning directory: {}", config.dir.display());
    let duplicates = find_duplicates(config)?;
    let trash = config.trash_dir();

    let mut outcomes = Vec::with_capacity(duplicates.len());
    for duplicate in duplicates {
        // Dry run: report what would happen, touch nothing
        let outcome = if config.dry_run {
            CleanOutcome {
                duplicate,
                destination: None,
                error: None,
            }
        } else {
            apply(config.mode, &trash, duplicate)
        };
        outcomes.push(outcome);
    }

    Ok(CleanReport {
        dir: config.dir.clone(),
        mode: config.mode,
        dry_run: config.dry_run,
        trash_dir: trash,
        outcomes,
    })
}

fn apply(mode: CleanMode, trash: &Path, duplicate: DuplicateMatch) -> CleanOutcome {
    let result = match mode {
        CleanMode::Delete => delete_file(&duplicate.path).map(|()| None),
        CleanMode::Move => move_to_trash(&duplicate.path, trash).map(Some),
    };

    match result {
        Ok(destination) => CleanOutcome {
            duplicate,
            destination,
            error: None,
        },
        Err(e) => {
            let verb = match mode {
                CleanMode::Delete => "delete",
                CleanMode::Move => "move",
            };
            warn!("Failed to {} {}: {}", verb, duplicate.path.display(), e);
            CleanOutcome {
                duplicate,
                destination: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Removes `path`; a file that is already gone counts as removed
fn delete_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn move_to_trash(path: &Path, trash: &Path) -> io::Result<PathBuf> {
    // Created on first use, so dry runs and delete mode never make it
    fs::create_dir_all(trash)?;
    let destination = free_trash_path(trash, path);
    move_file(path, &destination)?;
    Ok(destination)
}

/// First name in `trash` that is not taken yet:
/// name.pdf, name__dupe1.pdf, name__dupe2.pdf, ...
pub fn free_trash_path(trash: &Path, path: &Path) -> PathBuf {
    let file_name = path.file_name().unwrap_or(path.as_os_str());
    let mut candidate = trash.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    // Keep the extension last: report__dupe1.pdf, not report.pdf__dupe1
    let mut i = 1u64;
    while candidate.exists() {
        candidate = trash.join(format!("{}__dupe{}{}", stem, i, suffix));
        i += 1;
    }
    candidate
}

// rename() cannot cross filesystems, so fall back to copy + remove
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    if let Err(e) = fs::remove_file(from) {
        // Leave no half-moved copy behind
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does apply() return a CleanOutcome and not a Result?
//    - A failure on one file is not a failure of the whole run
//    - The error is kept as text in the outcome and the loop moves on
//
// 2. What does filter_entry do in WalkDir?
//    - It decides per entry whether to descend into it at all
//    - Returning false for the trash directory skips everything inside it
//
// 3. What is `#[serde(flatten)]`?
//    - The fields of the inner struct (path, base) appear directly in the
//      JSON object instead of under a "duplicate" key
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &Path, mode: CleanMode, dry_run: bool) -> CleanConfig {
        CleanConfig {
            dir: dir.to_path_buf(),
            extensions: vec!["pdf".to_string()],
            trash_dir_name: "_dupe_trash".to_string(),
            mode,
            dry_run,
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_extension_filter() {
        let pdf = vec!["pdf".to_string()];
        assert!(has_wanted_extension(Path::new("a.PDF"), &pdf));
        assert!(!has_wanted_extension(Path::new("a.docx"), &pdf));
        assert!(!has_wanted_extension(Path::new("README"), &pdf));
        assert!(has_wanted_extension(Path::new("README"), &[]));
    }

    #[test]
    fn test_find_duplicates_recursive() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("report.pdf"));
        touch(&dir.path().join("report (1).pdf"));
        touch(&dir.path().join("week1/slides.pdf"));
        touch(&dir.path().join("week1/slides(2).pdf"));
        touch(&dir.path().join("week1/notes 2.pdf"));
        touch(&dir.path().join("essay.docx"));
        touch(&dir.path().join("essay (1).docx"));

        let found = find_duplicates(&config(dir.path(), CleanMode::Move, true)).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["report (1).pdf", "slides(2).pdf"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir.path().join("nope"), CleanMode::Move, false);
        assert!(matches!(clean_directory(&cfg), Err(HarvestError::MissingDirectory(_))));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("report.pdf"));
        touch(&dir.path().join("report (1).pdf"));

        let report = clean_directory(&config(dir.path(), CleanMode::Delete, true)).unwrap();
        assert_eq!(report.processed(), 1);
        assert!(dir.path().join("report (1).pdf").exists());
        assert!(!dir.path().join("_dupe_trash").exists());
    }

    #[test]
    fn test_delete_mode() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("report.pdf"));
        touch(&dir.path().join("report (1).pdf"));

        let report = clean_directory(&config(dir.path(), CleanMode::Delete, false)).unwrap();
        assert_eq!(report.processed(), 1);
        assert_eq!(report.failed(), 0);
        assert!(!dir.path().join("report (1).pdf").exists());
        assert!(dir.path().join("report.pdf").exists());
    }

    #[test]
    fn test_move_mode_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let trash = dir.path().join("_dupe_trash");
        touch(&dir.path().join("report.pdf"));
        touch(&dir.path().join("report (1).pdf"));
        touch(&dir.path().join("sub/report.pdf"));
        touch(&dir.path().join("sub/report (1).pdf"));
        fs::create_dir_all(&trash).unwrap();
        fs::write(trash.join("report (1).pdf"), b"already here").unwrap();

        let report = clean_directory(&config(dir.path(), CleanMode::Move, false)).unwrap();
        assert_eq!(report.processed(), 2);

        assert_eq!(fs::read(trash.join("report (1).pdf")).unwrap(), b"already here");
        assert!(trash.join("report (1)__dupe1.pdf").exists());
        assert!(trash.join("report (1)__dupe2.pdf").exists());
        assert!(!dir.path().join("report (1).pdf").exists());
        assert!(!dir.path().join("sub/report (1).pdf").exists());
    }

    #[test]
    fn test_failed_moves_are_recorded_and_scan_continues() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("report.pdf"));
        touch(&dir.path().join("report (1).pdf"));
        touch(&dir.path().join("sub/slides.pdf"));
        touch(&dir.path().join("sub/slides(2).pdf"));
        // A plain file where the trash directory should go makes every move fail
        fs::write(dir.path().join("_dupe_trash"), b"not a directory").unwrap();

        let report = clean_directory(&config(dir.path(), CleanMode::Move, false)).unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed(), report.outcomes.len());
        assert_eq!(report.processed(), 0);
        assert!(report.outcomes.iter().all(|o| o.error.is_some() && o.destination.is_none()));
        assert!(dir.path().join("report (1).pdf").exists());
        assert!(dir.path().join("sub/slides(2).pdf").exists());
    }

    #[test]
    fn test_one_failure_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("blocked_trash");
        let trash = dir.path().join("_dupe_trash");
        touch(&dir.path().join("a.pdf"));
        touch(&dir.path().join("a (1).pdf"));
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("b (1).pdf"));
        fs::write(&blocked, b"not a directory").unwrap();

        let found = find_duplicates(&config(dir.path(), CleanMode::Move, false)).unwrap();
        assert_eq!(found.len(), 2);
        let mut found = found.into_iter();
        let failed = apply(CleanMode::Move, &blocked, found.next().unwrap());
        let moved = apply(CleanMode::Move, &trash, found.next().unwrap());

        assert!(!failed.is_ok());
        assert!(dir.path().join("a (1).pdf").exists());
        assert!(moved.is_ok());
        assert_eq!(moved.destination, Some(trash.join("b (1).pdf")));
        assert!(!dir.path().join("b (1).pdf").exists());
    }

    #[test]
    fn test_trash_directory_is_not_rescanned() {
        let dir = TempDir::new().unwrap();
        let trash = dir.path().join("_dupe_trash");
        touch(&trash.join("report.pdf"));
        touch(&trash.join("report (1).pdf"));

        let found = find_duplicates(&config(dir.path(), CleanMode::Move, false)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_free_trash_path_always_free() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.pdf");
        let trash = dir.path().join("trash");
        fs::create_dir_all(&trash).unwrap();

        for _ in 0..5 {
            let dest = free_trash_path(&trash, &source);
            assert!(!dest.exists());
            fs::write(&dest, b"x").unwrap();
        }
        assert!(trash.join("a__dupe4.pdf").exists());
    }

    #[test]
    fn test_delete_missing_file_counts_as_done() {
        let dir = TempDir::new().unwrap();
        assert!(delete_file(&dir.path().join("gone.pdf")).is_ok());
    }
}

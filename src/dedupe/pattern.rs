// src/dedupe/pattern.rs
// =============================================================================
// Recognises the file names browsers and sync tools give to repeated copies:
//
//   report (1).pdf    report(1).pdf    report 2.pdf
//
// Each shape is one rule; rules are tried in order and the first match wins.
// A name only counts as a duplicate when the "original" it points back to
// (report.pdf) sits right next to it.
// =============================================================================

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A file whose name marks it as a copy of `base`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateMatch {
    pub path: PathBuf,
    pub base: PathBuf,
}

struct DuplicateRule {
    name: &'static str,
    pattern: &'static str,
}

// Tried top to bottom
const RULES: &[DuplicateRule] = &[
    DuplicateRule {
        name: "space-parens",
        pattern: r"^(?P<base>.+?) \((?P<n>\d+)\)\.(?P<ext>[^.]+)$",
    },
    DuplicateRule {
        name: "parens",
        pattern: r"^(?P<base>.+?)\((?P<n>\d+)\)\.(?P<ext>[^.]+)$",
    },
    DuplicateRule {
        name: "space-number",
        pattern: r"^(?P<base>.+?) (?P<n>\d+)\.(?P<ext>[^.]+)$",
    },
];

fn compiled_rules() -> &'static [(&'static str, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                let regex = Regex::new(&format!("(?i){}", rule.pattern))
                    .expect("duplicate rule patterns are valid");
                (rule.name, regex)
            })
            .collect()
    })
}

/// Returns the file name with the copy marker removed, e.g.
/// "report (1).pdf" -> "report.pdf". `None` when no rule matches.
pub fn base_name(file_name: &str) -> Option<String> {
    for (rule, regex) in compiled_rules() {
        if let Some(caps) = regex.captures(file_name) {
            let base = caps["base"].trim();
            if base.is_empty() {
                continue;
            }
            tracing::trace!(file_name, rule, "duplicate rule matched");
            return Some(format!("{}.{}", base, &caps["ext"]));
        }
    }
    None
}

/// The path the copy points back to, in the same directory
pub fn candidate_base(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    base_name(name).map(|base| path.with_file_name(base))
}

/// Flags `path` when its base file exists beside it
pub fn classify(path: &Path) -> Option<DuplicateMatch> {
    let base = candidate_base(path)?;
    if base == path || base.parent() != path.parent() || !base.is_file() {
        return None;
    }
    Some(DuplicateMatch {
        path: path.to_path_buf(),
        base,
    })
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is `.+?` in the patterns?
//    - A lazy "one or more of anything": it matches as little as it can
//    - Together with the `$` anchor this means only the LAST marker is cut,
//      so "a (1) (2).pdf" points back to "a (1).pdf"
//
// 2. What is `(?P<base>...)`?
//    - A named capture group, read back later as caps["base"]
//
// 3. Why compare base.parent() with path.parent()?
//    - with_file_name() keeps the directory, so this is normally equal
//    - The check still rules out odd names that would point somewhere else
// -----------------------------------------------------------------------------

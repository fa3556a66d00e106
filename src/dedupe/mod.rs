// src/dedupe/mod.rs
// =============================================================================
// This module finds and removes duplicate-named copies of files.
//
// Submodules:
// - pattern: decides whether a file name looks like a copy ("x (1).pdf")
// - cleaner: walks a directory and moves/deletes the copies it finds
// =============================================================================

mod cleaner;
mod pattern;

pub use cleaner::{clean_directory, CleanReport};

// src/crawl/mod.rs
// =============================================================================
// This module handles crawling a course site for PDFs.
//
// Features:
// - Breadth-first crawling starting from the course page
// - Same-host restriction (never wanders off to other sites)
// - Configurable depth limit
// - Links found in anchors, frames, data attributes, onclick handlers and
//   meta refreshes
// - Downloads through the browser, one at a time
//
// Submodules:
// - canon: URL canonicalization, link classification, file names
// - extract: link extraction from rendered HTML
// - queue: the breadth-first crawler itself
// - download: triggering downloads and waiting for them
// - session: one full run, glued together
// =============================================================================

mod canon;
mod download;
mod extract;
mod queue;
mod session;

pub use canon::guess_filename;
pub use session::{prepare_output, run_session, wait_for_enter, CrawlReport};

// src/crawl/download.rs
// =============================================================================
// Triggers the downloads the crawl found, one after the other.
//
// The browser does the actual downloading. All we can see from the outside
// is the download directory: while Chrome is still writing a file it is
// called "<name>.crdownload". So after each trigger we poll the directory
// until no such marker is left, or give up after a timeout and move on.
// =============================================================================

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::canon::guess_filename;
use crate::browser::PageDriver;

pub struct DownloadOptions {
    pub marker_extension: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Skip URLs whose guessed file name already exists in the directory
    pub skip_existing: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadSummary {
    /// Downloads started and (as far as we can tell) finished
    pub triggered: usize,
    /// Started, but still in progress when we stopped waiting
    pub timed_out: Vec<String>,
    /// The driver refused to start them
    pub failed: Vec<DownloadFailure>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadFailure {
    pub url: String,
    pub error: String,
}

impl DownloadSummary {
    pub fn is_complete(&self) -> bool {
        self.timed_out.is_empty() && self.failed.is_empty()
    }
}

/// Downloads `urls` in order into `dir` through `driver`
pub async fn download_all(
    driver: &mut dyn PageDriver,
    urls: &[String],
    dir: &Path,
    options: &DownloadOptions,
) -> DownloadSummary {
    let mut summary = DownloadSummary::default();

    for (i, url) in urls.iter().enumerate() {
        // The guessed name may differ from what the browser picks, so this
        // is only a best effort
        if options.skip_existing && dir.join(guess_filename(url)).exists() {
            info!("({}/{}) Already downloaded: {}", i + 1, urls.len(), url);
            summary.skipped.push(url.clone());
            continue;
        }

        info!("({}/{}) Downloading: {}", i + 1, urls.len(), url);

        // A refused trigger is recorded and the next URL is tried
        if let Err(e) = driver.trigger_download(url).await {
            warn!("Could not start download of {}: {}", url, e);
            summary.failed.push(DownloadFailure {
                url: url.clone(),
                error: e.to_string(),
            });
            continue;
        }

        // Wait for this file before starting the next one
        let settled = wait_for_downloads(
            dir,
            &options.marker_extension,
            options.timeout,
            options.poll_interval,
        )
        .await;
        if !settled {
            warn!("Gave up waiting for {} after {:?}", url, options.timeout);
            summary.timed_out.push(url.clone());
        }
        summary.triggered += 1;
    }

    summary
}

/// Waits until `dir` holds no `*.<marker_extension>` file. Returns false if
/// one is still there after `timeout`.
pub async fn wait_for_downloads(
    dir: &Path,
    marker_extension: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let start = Instant::now();
    loop {
        if !has_pending_downloads(dir, marker_extension) {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

fn has_pending_downloads(dir: &Path, marker_extension: &str) -> bool {
    // A directory we cannot read has nothing we could wait for
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|entry| entry.ok()).any(|entry| {
        entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(marker_extension))
    })
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why poll the file system?
//    - Chrome does not tell us when a download finished
//    - The .crdownload file disappears when it does, so we watch for that
//
// 2. Why tokio::time::Instant and not std::time::Instant?
//    - It follows tokio's clock, which tests can pause and advance
//
// 3. Why are triggers sequential?
//    - The browser has one session and one download directory; waiting for
//      each file keeps the directory state easy to reason about
// -----------------------------------------------------------------------------

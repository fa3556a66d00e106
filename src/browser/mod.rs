// src/browser/mod.rs
// =============================================================================
// This module hides the browser behind a small trait.
//
// The crawler only ever needs two things from a browser:
// - "give me the rendered HTML of this URL"
// - "download this URL into the download directory"
// plus a few bits of housekeeping (page title, where downloads go, shutdown).
//
// Submodules:
// - chrome: a real Chrome driven over the DevTools protocol (chromiumoxide)
// - http: plain HTTP requests with reqwest, for public sites
// =============================================================================

mod chrome;
mod http;

pub use chrome::ChromeDriver;
pub use http::HttpDriver;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Everything the crawler needs from a browser
#[async_trait]
pub trait PageDriver: Send {
    /// Navigates to `url` without reading anything back.
    /// Used for the first visit, before the user logs in.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Navigates to `url`, waits for it to render and returns the markup
    async fn fetch_html(&mut self, url: &str) -> Result<String>;

    /// Title of the page currently shown, if it has one
    async fn title(&mut self) -> Result<Option<String>>;

    /// Where triggered downloads are written from now on
    async fn set_download_dir(&mut self, dir: &Path) -> Result<()>;

    /// Starts downloading `url`. Returning does not mean the download is
    /// finished; see crawl::download::wait_for_downloads.
    async fn trigger_download(&mut self, url: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

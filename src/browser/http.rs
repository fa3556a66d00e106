// src/browser/http.rs
// =============================================================================
// PageDriver backed by plain HTTP requests (reqwest).
//
// No JavaScript, no login session: this only works for course pages that
// are publicly reachable. In exchange it needs no Chrome install, which
// makes it handy on servers and in CI.
//
// Downloads behave like Chrome's:
// - while the body is being written the file is called "<name>.crdownload"
// - the finished file is renamed to "<name>", or "<name> (1)" and so on if
//   that name is taken (which is exactly what `clean` tidies up later)
// =============================================================================

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::PageDriver;
use crate::config::CrawlConfig;
use crate::crawl::guess_filename;
use crate::error::{HarvestError, Result};

pub struct HttpDriver {
    client: Client,
    download_dir: PathBuf,
    marker_extension: String,
    last_html: Option<String>,
}

impl HttpDriver {
    pub fn new(config: &CrawlConfig, download_dir: &Path) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(HarvestError::driver)?;

        Ok(Self {
            client,
            download_dir: download_dir.to_path_buf(),
            marker_extension: config.marker_extension.clone(),
            last_html: None,
        })
    }

    // Fetches a URL and fails on anything but a 2xx status
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }

        Ok(response)
    }
}

#[async_trait]
impl PageDriver for HttpDriver {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.fetch_html(url).await.map(|_| ())
    }

    async fn fetch_html(&mut self, url: &str) -> Result<String> {
        let response = self.get(url).await.map_err(HarvestError::driver)?;
        let html = response.text().await.map_err(HarvestError::driver)?;
        self.last_html = Some(html.clone());
        Ok(html)
    }

    async fn title(&mut self) -> Result<Option<String>> {
        Ok(self.last_html.as_deref().and_then(html_title))
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<()> {
        self.download_dir = dir.to_path_buf();
        Ok(())
    }

    async fn trigger_download(&mut self, url: &str) -> Result<()> {
        let response = self.get(url).await.map_err(HarvestError::driver)?;
        let name = guess_filename(response.url().as_str());
        let bytes = response.bytes().await.map_err(HarvestError::driver)?;

        // Write under the in-progress name first, like Chrome does
        let partial = self
            .download_dir
            .join(format!("{}.{}", name, self.marker_extension));
        let target = free_download_path(&self.download_dir, &name);
        store_download(&partial, &target, &bytes).await?;
        debug!("Saved {} ({} bytes) to {}", url, bytes.len(), target.display());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes `bytes` to `partial`, then renames it to `target`. On failure
/// the partial file is removed so no stale marker stays behind.
async fn store_download(partial: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let stored = match tokio::fs::write(partial, bytes).await {
        Ok(()) => tokio::fs::rename(partial, target).await,
        Err(e) => Err(e),
    };
    if stored.is_err() {
        // A leftover marker would make every later wait run into its timeout
        let _ = tokio::fs::remove_file(partial).await;
    }
    stored
}

/// Text of the first <title>, trimmed; None when missing or blank
fn html_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").unwrap();
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// "a.pdf", then "a (1).pdf", "a (2).pdf", ... whichever is free first
fn free_download_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, suffix)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why keep last_html around?
//    - The trait asks for the title of the current page separately
//    - A browser remembers its page; a plain HTTP client has to do it itself
//
// 2. What is `(1u64..)`?
//    - An endless range 1, 2, 3, ... that find() stops at the first free name
// -----------------------------------------------------------------------------

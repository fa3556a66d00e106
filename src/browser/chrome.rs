// src/browser/chrome.rs
// =============================================================================
// PageDriver backed by a real Chrome window (chromiumoxide).
//
// Why a real browser?
// - Course sites sit behind a single sign-on login that only a human can do
// - The session cookies then live in the browser, so every page fetch and
//   every download just rides along on that session
//
// Downloads:
// - The Chrome profile is told to save PDFs instead of showing them in the
//   built-in viewer, and never to ask where to save
// - The DevTools download behavior points at the course directory
// - A download is triggered by opening the URL in a new tab, waiting a bit,
//   and closing the tab again; Chrome keeps downloading in the background
// =============================================================================

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::PageDriver;
use crate::config::CrawlConfig;
use crate::error::{HarvestError, Result};

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    render_delay: Duration,
    tab_delay: Duration,
}

impl ChromeDriver {
    /// Starts Chrome with its own profile under `profile_dir`, saving
    /// downloads into `download_dir`
    pub async fn launch(config: &CrawlConfig, profile_dir: &Path, download_dir: &Path) -> Result<Self> {
        write_profile_preferences(profile_dir, download_dir)?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(HarvestError::driver)?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(HarvestError::driver)?;

        // The browser only makes progress while its event stream is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(HarvestError::driver)?;

        let mut driver = Self {
            browser,
            page,
            handler,
            render_delay: config.render_delay,
            tab_delay: config.tab_delay,
        };
        driver.set_download_dir(download_dir).await?;
        info!("Chrome started (profile: {})", profile_dir.display());
        Ok(driver)
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(HarvestError::driver)?;
        Ok(())
    }

    async fn fetch_html(&mut self, url: &str) -> Result<String> {
        self.page.goto(url).await.map_err(HarvestError::driver)?;
        // Crude, but scripts that build the page get a moment to finish
        tokio::time::sleep(self.render_delay).await;
        self.page.content().await.map_err(HarvestError::driver)
    }

    async fn title(&mut self) -> Result<Option<String>> {
        self.page.get_title().await.map_err(HarvestError::driver)
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<()> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().into_owned())
            .build()
            .map_err(HarvestError::driver)?;
        self.browser
            .execute(params)
            .await
            .map_err(HarvestError::driver)?;
        debug!("Chrome downloads now go to {}", dir.display());
        Ok(())
    }

    async fn trigger_download(&mut self, url: &str) -> Result<()> {
        let tab = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(HarvestError::driver)?;

        // Navigating to a file that gets downloaded is reported as an aborted
        // navigation, which is exactly what we want here
        if let Err(e) = tab.goto(url).await {
            debug!("Download tab navigation for {} ended with: {}", url, e);
        }
        tokio::time::sleep(self.tab_delay).await;

        if let Err(e) = tab.close().await {
            warn!("Could not close download tab for {}: {}", url, e);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.browser.close().await.map_err(HarvestError::driver)?;
        if let Err(e) = self.browser.wait().await {
            debug!("Waiting for Chrome to exit failed: {}", e);
        }
        self.handler.abort();
        Ok(())
    }
}

/// Writes the Chrome preferences that make downloads silent, keeping
/// whatever else an existing profile already has
fn write_profile_preferences(profile_dir: &Path, download_dir: &Path) -> Result<()> {
    let path = preferences_path(profile_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let existing = fs::read_to_string(&path)
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(&text).ok());
    let merged = merge_download_preferences(existing, download_dir);

    let text = serde_json::to_string_pretty(&merged)
        .map_err(|e| HarvestError::driver(format!("could not encode Chrome preferences: {}", e)))?;
    fs::write(&path, text)?;
    Ok(())
}

fn preferences_path(profile_dir: &Path) -> PathBuf {
    profile_dir.join("Default").join("Preferences")
}

fn merge_download_preferences(existing: Option<Value>, download_dir: &Path) -> Value {
    let mut prefs = match existing {
        Some(Value::Object(map)) => Value::Object(map),
        _ => json!({}),
    };

    let overrides = json!({
        "download": {
            "default_directory": download_dir.to_string_lossy(),
            "prompt_for_download": false,
            "directory_upgrade": true,
        },
        "plugins": {
            "always_open_pdf_externally": true,
        },
    });

    if let (Some(target), Value::Object(sections)) = (prefs.as_object_mut(), overrides) {
        for (section, values) in sections {
            let slot = target.entry(section).or_insert_with(|| json!({}));
            if !slot.is_object() {
                *slot = json!({});
            }
            if let (Some(slot), Value::Object(values)) = (slot.as_object_mut(), values) {
                slot.extend(values);
            }
        }
    }
    prefs
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is the `events` stream from Browser::launch?
//    - All messages from Chrome arrive through it
//    - Nothing happens unless something polls it, hence the spawned task
//
// 2. Why JoinHandle::abort() in close()?
//    - The handler loop would otherwise keep running until the stream ends
//
// 3. Why merge into an existing Preferences file?
//    - The profile is reused between runs, so it keeps the login session
//    - Overwriting it would throw away everything Chrome stored there
// -----------------------------------------------------------------------------

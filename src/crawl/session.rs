// src/crawl/session.rs
// =============================================================================
// One complete crawl run, from opening the course page to the last download.
//
// Steps:
// 1. Open the course page (and let the user log in, for a visible browser)
// 2. Name the course directory after the page title
// 3. Point downloads at that directory
// 4. Crawl for PDFs, then download them one by one
//
// The browser itself is created by the caller (main.rs) so this flow can be
// run against any PageDriver.
// =============================================================================

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use url::Url;

use super::canon::safe_name;
use super::download::{download_all, DownloadOptions, DownloadSummary};
use super::queue::{CrawlOutcome, Crawler};
use crate::browser::PageDriver;
use crate::config::CrawlConfig;
use crate::error::Result;

/// Working name of the course directory until the page title is known
pub const TEMP_COURSE_DIR: &str = "course_tmp";

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub start_url: String,
    pub course_dir: PathBuf,
    #[serde(flatten)]
    pub crawl: CrawlOutcome,
    pub downloads: DownloadSummary,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        self.downloads.is_complete()
    }
}

/// Creates `out_dir` and the temporary course directory inside it
pub fn prepare_output(out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let temp = out_dir.join(TEMP_COURSE_DIR);
    fs::create_dir_all(&temp)?;
    Ok(temp)
}

/// Runs the whole crawl against `driver`, using `temp_dir` (from
/// `prepare_output`) until the real course directory is known
pub async fn run_session(
    driver: &mut dyn PageDriver,
    config: &CrawlConfig,
    temp_dir: &Path,
) -> Result<CrawlReport> {
    let mut crawler = Crawler::new(&config.start_url, config.max_depth)?;

    if let Err(e) = driver.open(crawler.start_url()).await {
        warn!("Could not open {}: {}", crawler.start_url(), e);
    }
    if needs_login_prompt(config) {
        wait_for_enter(
            "Log in to the course site in the browser window until you can see the course \
             contents, then press Enter here to continue...",
        )
        .await?;
    }

    let title = driver.title().await.unwrap_or_else(|e| {
        warn!("Could not read the page title: {}", e);
        None
    });
    let course_name = course_dir_name(title.as_deref(), crawler.start_url());
    let course_dir = settle_course_dir(temp_dir, &course_name)?;
    driver.set_download_dir(&course_dir).await?;
    println!("📁 Download folder: {}", course_dir.display());

    crawler.run(driver).await;
    let outcome = crawler.into_outcome();
    println!(
        "🔍 Crawl finished: {} page(s), {} PDF link(s)",
        outcome.pages_visited,
        outcome.resources.len()
    );

    let options = DownloadOptions {
        marker_extension: config.marker_extension.clone(),
        timeout: config.download_timeout,
        poll_interval: config.poll_interval,
        skip_existing: config.skip_existing,
    };
    let downloads = if outcome.resources.is_empty() {
        DownloadSummary::default()
    } else {
        download_all(driver, &outcome.resources, &course_dir, &options).await
    };

    Ok(CrawlReport {
        start_url: config.start_url.clone(),
        course_dir,
        crawl: outcome,
        downloads,
    })
}

fn needs_login_prompt(config: &CrawlConfig) -> bool {
    config.driver == crate::config::DriverKind::Chrome && !config.headless
}

/// Blocks until the user presses Enter
pub async fn wait_for_enter(message: &str) -> Result<()> {
    println!("\n👉 {}", message);
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| ())
    })
    .await
    .map_err(io::Error::other)??;
    Ok(())
}

/// The page title made safe for the file system, or the URL path if the
/// page has no usable title
pub fn course_dir_name(title: Option<&str>, start_url: &str) -> String {
    // Titles come from the remote site, so "." or ".." count as no title
    let from_title = title.map(safe_name).filter(|name| is_plain_dir_name(name));
    from_title.unwrap_or_else(|| {
        let path = Url::parse(start_url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let name = safe_name(&path);
        if is_plain_dir_name(&name) {
            name
        } else {
            "course".to_string()
        }
    })
}

// Exactly one normal path component: not empty, not "." or "..", no separators
fn is_plain_dir_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Moves the temporary directory to its final name
///
/// - name that would leave the output root: use "course" instead
/// - final directory already exists (an earlier run): reuse it
/// - rename fails: fall back to "<name>_downloads"
fn settle_course_dir(temp_dir: &Path, name: &str) -> Result<PathBuf> {
    let root = temp_dir.parent().unwrap_or(temp_dir);

    let name = if is_plain_dir_name(name) {
        name
    } else {
        warn!("Refusing course folder name {:?}, using \"course\"", name);
        "course"
    };
    let target = root.join(name);
    if target == temp_dir {
        return Ok(target);
    }

    // An earlier run already created this folder
    if target.is_dir() {
        info!("Reusing existing folder {}", target.display());
        // Only succeeds when empty, which is the case we care about
        let _ = fs::remove_dir(temp_dir);
        return Ok(target);
    }

    match fs::rename(temp_dir, &target) {
        Ok(()) => Ok(target),
        Err(e) => {
            // Keep going in a sibling folder rather than failing the run
            warn!("Could not rename {} to {}: {}", temp_dir.display(), target.display(), e);
            let fallback = root.join(format!("{}_downloads", name));
            fs::create_dir_all(&fallback)?;
            Ok(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverKind;
    use crate::error::HarvestError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    /// A tiny course site that "downloads" by writing files into the
    /// directory it was pointed at
    struct FakeCourse {
        pages: HashMap<String, String>,
        title: Option<String>,
        download_dir: Option<PathBuf>,
    }

    #[async_trait]
    impl PageDriver for FakeCourse {
        async fn open(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn fetch_html(&mut self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| HarvestError::driver("not found"))
        }

        async fn title(&mut self) -> Result<Option<String>> {
            Ok(self.title.clone())
        }

        async fn set_download_dir(&mut self, dir: &Path) -> Result<()> {
            self.download_dir = Some(dir.to_path_buf());
            Ok(())
        }

        async fn trigger_download(&mut self, url: &str) -> Result<()> {
            let dir = self.download_dir.clone().ok_or_else(|| HarvestError::driver("no dir"))?;
            fs::write(dir.join(crate::crawl::guess_filename(url)), b"%PDF")?;
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn test_config(url: &str) -> CrawlConfig {
        CrawlConfig {
            start_url: url.to_string(),
            driver: DriverKind::Http,
            download_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            ..CrawlConfig::default()
        }
    }

    #[test]
    fn test_course_dir_name() {
        assert_eq!(course_dir_name(Some("Course: Rust 101"), "https://x.edu/c"), "Course_ Rust 101");
        assert_eq!(
            course_dir_name(Some("   "), "https://x.edu/course/view.php?id=1"),
            "_course_view.php"
        );
        assert_eq!(course_dir_name(None, "https://x.edu/"), "_");
    }

    #[test]
    fn test_dot_titles_fall_back_to_url_path() {
        assert_eq!(course_dir_name(Some(".."), "https://x.edu/c"), "_c");
        assert_eq!(course_dir_name(Some("."), "https://x.edu/c"), "_c");
        assert_eq!(course_dir_name(Some(" .. "), "https://x.edu/c"), "_c");
    }

    #[test]
    fn test_settle_course_dir_stays_inside_output() {
        let out = TempDir::new().unwrap();
        for name in ["..", ".", ""] {
            let temp = prepare_output(out.path()).unwrap();
            let dir = settle_course_dir(&temp, name).unwrap();
            assert_eq!(dir, out.path().join("course"), "name {:?}", name);
            assert!(dir.is_dir());
        }
    }

    #[tokio::test]
    async fn test_session_with_dot_dot_title_stays_inside_output() {
        let course = "https://moodle.example.edu/course/view.php?id=7";
        let mut pages = HashMap::new();
        pages.insert(
            course.to_string(),
            r#"<a href="/pluginfile.php/3/intro.pdf">i</a>"#.to_string(),
        );
        let mut driver = FakeCourse {
            pages,
            title: Some("..".to_string()),
            download_dir: None,
        };

        let out = TempDir::new().unwrap();
        let temp = prepare_output(out.path()).unwrap();
        let report = run_session(&mut driver, &test_config(course), &temp).await.unwrap();

        assert_eq!(report.course_dir, out.path().join("_course_view.php"));
        assert_eq!(driver.download_dir.as_deref(), Some(report.course_dir.as_path()));
        assert!(report.course_dir.join("intro.pdf").exists());
        assert!(!out.path().parent().unwrap().join("intro.pdf").exists());
    }

    #[test]
    fn test_settle_course_dir_renames() {
        let out = TempDir::new().unwrap();
        let temp = prepare_output(out.path()).unwrap();
        let dir = settle_course_dir(&temp, "Rust 101").unwrap();
        assert_eq!(dir, out.path().join("Rust 101"));
        assert!(dir.is_dir());
        assert!(!temp.exists());
    }

    #[test]
    fn test_settle_course_dir_reuses_existing() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("Rust 101")).unwrap();
        fs::write(out.path().join("Rust 101").join("old.pdf"), b"x").unwrap();
        let temp = prepare_output(out.path()).unwrap();

        let dir = settle_course_dir(&temp, "Rust 101").unwrap();
        assert_eq!(dir, out.path().join("Rust 101"));
        assert!(dir.join("old.pdf").exists());
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_full_session() {
        let course = "https://moodle.example.edu/course/view.php?id=7";
        let mut pages = HashMap::new();
        pages.insert(
            course.to_string(),
            r#"<a href="/mod/resource/view.php?id=1">r</a><a href="/pluginfile.php/3/intro.pdf">i</a>"#
                .to_string(),
        );
        pages.insert(
            "https://moodle.example.edu/mod/resource/view.php?id=1".to_string(),
            r#"<div class="resourceworkaround"><a href="/pluginfile.php/4/week1.pdf">w</a></div>"#
                .to_string(),
        );
        let mut driver = FakeCourse {
            pages,
            title: Some("Rust 101".to_string()),
            download_dir: None,
        };

        let out = TempDir::new().unwrap();
        let temp = prepare_output(out.path()).unwrap();
        let report = run_session(&mut driver, &test_config(course), &temp).await.unwrap();

        assert_eq!(report.course_dir, out.path().join("Rust 101"));
        assert_eq!(report.crawl.pages_visited, 2);
        assert_eq!(report.crawl.resources.len(), 2);
        assert_eq!(report.downloads.triggered, 2);
        assert!(report.is_complete());
        assert!(report.course_dir.join("intro.pdf").exists());
        assert!(report.course_dir.join("week1.pdf").exists());
    }

    #[tokio::test]
    async fn test_session_rejects_bad_url() {
        let mut driver = FakeCourse {
            pages: HashMap::new(),
            title: None,
            download_dir: None,
        };
        let out = TempDir::new().unwrap();
        let temp = prepare_output(out.path()).unwrap();
        assert!(run_session(&mut driver, &test_config("nope"), &temp).await.is_err());
    }
}

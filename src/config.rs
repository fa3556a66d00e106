// src/config.rs
// =============================================================================
// Runtime configuration for both subcommands.
//
// Every setting is resolved in this order:
//   1. the command-line flag (if given)
//   2. the [clean] / [crawl] table of the TOML config file (if given)
//   3. the built-in default below
//
// Example config file:
//
//   [clean]
//   dir = "~/Downloads"
//   ext = "pdf,pptx"
//
//   [crawl]
//   depth = 2
//   render_delay_ms = 1200
// =============================================================================

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{CleanArgs, CrawlArgs};
use crate::error::{HarvestError, Result};

pub const DEFAULT_CLEAN_DIR: &str = "downloads";
pub const DEFAULT_EXTENSIONS: &str = "pdf";
pub const DEFAULT_TRASH_DIR: &str = "_dupe_trash";

pub const DEFAULT_OUT_DIR: &str = "downloads";
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_RENDER_DELAY_MS: u64 = 800;
pub const DEFAULT_TAB_DELAY_MS: u64 = 1500;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MARKER_EXTENSION: &str = "crdownload";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X) AppleWebKit/537.36 (KHTML, like Gecko) Chrome Safari";

/// Which page driver the crawler talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// A real Chrome window (needed for sites behind a login)
    #[default]
    Chrome,
    /// Plain HTTP requests, no JavaScript, no session
    Http,
}

// -----------------------------------------------------------------------------
// Config file
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub clean: CleanSection,
    pub crawl: CrawlSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanSection {
    pub dir: Option<PathBuf>,
    pub ext: Option<String>,
    pub trash_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlSection {
    pub out: Option<PathBuf>,
    pub depth: Option<usize>,
    pub driver: Option<DriverKind>,
    pub headless: Option<bool>,
    pub render_delay_ms: Option<u64>,
    pub tab_delay_ms: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub chrome_path: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| HarvestError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| HarvestError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads the file when a path was given, otherwise all-empty
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

// -----------------------------------------------------------------------------
// Resolved settings
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanMode {
    /// Move duplicates into the trash directory
    Move,
    /// Remove duplicates for good
    Delete,
}

#[derive(Debug, Clone)]
pub struct CleanConfig {
    pub dir: PathBuf,
    /// Lower-case extensions without the dot; empty = every file
    pub extensions: Vec<String>,
    /// Name of the trash directory created inside `dir`
    pub trash_dir_name: String,
    pub mode: CleanMode,
    pub dry_run: bool,
}

impl CleanConfig {
    pub fn resolve(args: &CleanArgs, file: &CleanSection) -> Self {
        let dir = args
            .dir
            .clone()
            .or_else(|| file.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLEAN_DIR));
        let ext = args
            .ext
            .clone()
            .or_else(|| file.ext.clone())
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.to_string());

        Self {
            dir: expand_tilde(&dir),
            extensions: parse_extensions(&ext),
            trash_dir_name: file
                .trash_dir
                .clone()
                .unwrap_or_else(|| DEFAULT_TRASH_DIR.to_string()),
            mode: if args.delete { CleanMode::Delete } else { CleanMode::Move },
            dry_run: args.dry_run,
        }
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.dir.join(&self.trash_dir_name)
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: String,
    pub out_dir: PathBuf,
    pub max_depth: usize,
    pub driver: DriverKind,
    pub headless: bool,
    pub keep_open: bool,
    pub skip_existing: bool,
    /// Fixed wait after navigation before the markup is read
    pub render_delay: Duration,
    /// How long a download tab stays open before it is closed
    pub tab_delay: Duration,
    pub download_timeout: Duration,
    pub poll_interval: Duration,
    /// File extension of in-progress downloads
    pub marker_extension: String,
    pub user_agent: String,
    pub chrome_path: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            max_depth: DEFAULT_MAX_DEPTH,
            driver: DriverKind::default(),
            headless: false,
            keep_open: false,
            skip_existing: false,
            render_delay: Duration::from_millis(DEFAULT_RENDER_DELAY_MS),
            tab_delay: Duration::from_millis(DEFAULT_TAB_DELAY_MS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            marker_extension: DEFAULT_MARKER_EXTENSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_path: None,
        }
    }
}

impl CrawlConfig {
    pub fn resolve(args: &CrawlArgs, file: &CrawlSection) -> Self {
        let defaults = Self::default();
        let out_dir = args
            .out
            .clone()
            .or_else(|| file.out.clone())
            .unwrap_or(defaults.out_dir);

        Self {
            start_url: args.url.trim().to_string(),
            out_dir: expand_tilde(&out_dir),
            max_depth: args.depth.or(file.depth).unwrap_or(defaults.max_depth),
            driver: args.driver.or(file.driver).unwrap_or(defaults.driver),
            headless: args.headless || file.headless.unwrap_or(false),
            keep_open: args.keep,
            skip_existing: args.skip_existing,
            render_delay: file
                .render_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.render_delay),
            tab_delay: file
                .tab_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tab_delay),
            download_timeout: file
                .download_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            poll_interval: file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            marker_extension: defaults.marker_extension,
            user_agent: file.user_agent.clone().unwrap_or(defaults.user_agent),
            chrome_path: file.chrome_path.clone(),
        }
    }
}

/// Splits "pdf, .PPTX,," into ["pdf", "pptx"]
pub fn parse_extensions(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in raw.split(',') {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

/// Replaces a leading "~" with the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extensions() {
        assert_eq!(parse_extensions("pdf, .PPTX,,docx,pdf"), vec!["pdf", "pptx", "docx"]);
        assert!(parse_extensions("").is_empty());
        assert!(parse_extensions(" , ").is_empty());
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde(Path::new("./downloads")), PathBuf::from("./downloads"));
        assert_eq!(expand_tilde(Path::new("/tmp/~x")), PathBuf::from("/tmp/~x"));
    }

    #[test]
    fn test_clean_defaults() {
        let config = CleanConfig::resolve(&CleanArgs::default(), &CleanSection::default());
        assert_eq!(config.dir, PathBuf::from("downloads"));
        assert_eq!(config.extensions, vec!["pdf"]);
        assert_eq!(config.mode, CleanMode::Move);
        assert_eq!(config.trash_dir(), PathBuf::from("downloads").join("_dupe_trash"));
    }

    #[test]
    fn test_cli_beats_file_beats_default() {
        let file = FileConfig::parse(
            r#"
            [clean]
            dir = "/srv/files"
            ext = "docx"

            [crawl]
            depth = 5
            driver = "http"
            render_delay_ms = 50
            "#,
        )
        .unwrap();

        let clean = CleanConfig::resolve(
            &CleanArgs {
                ext: Some("pdf".to_string()),
                ..CleanArgs::default()
            },
            &file.clean,
        );
        assert_eq!(clean.dir, PathBuf::from("/srv/files"));
        assert_eq!(clean.extensions, vec!["pdf"]);

        let crawl = CrawlConfig::resolve(
            &CrawlArgs {
                url: " https://example.com/course ".to_string(),
                depth: Some(1),
                ..CrawlArgs::default()
            },
            &file.crawl,
        );
        assert_eq!(crawl.start_url, "https://example.com/course");
        assert_eq!(crawl.max_depth, 1);
        assert_eq!(crawl.driver, DriverKind::Http);
        assert_eq!(crawl.render_delay, Duration::from_millis(50));
        assert_eq!(crawl.download_timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("[crawl]\nmax_depth = 2\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, HarvestError::ConfigRead { .. }));
    }
}

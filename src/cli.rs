// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands that have nothing to do with each other:
// - clean: finds "name (1).pdf" style copies and moves or deletes them
// - crawl: walks a course site in a browser and downloads every PDF it finds
//
// Most flags are Option<...> on purpose: a value that is not given on the
// command line falls back to the config file, then to the built-in default
// (see config.rs).
// =============================================================================

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DriverKind;

#[derive(Parser, Debug)]
#[command(
    name = "course-harvest",
    version,
    about = "Harvest PDFs from course sites and clean up duplicate downloads",
    long_about = "course-harvest crawls a (logged-in) course site in a real browser, collects every \
                  PDF link it can find and lets the browser download them. The clean subcommand \
                  tidies up the 'file (1).pdf' copies that repeated downloads leave behind."
)]
pub struct Cli {
    /// More log output (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a TOML config file with [clean] and [crawl] tables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move (or delete) duplicate-named copies like "report (1).pdf"
    ///
    /// Example: course-harvest clean --dir ~/Downloads --ext pdf --dry-run
    Clean(CleanArgs),

    /// Crawl a course site and download every PDF it links to
    ///
    /// Example: course-harvest crawl "https://moodle.example.edu/course/view.php?id=42" --depth 3
    Crawl(CrawlArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CleanArgs {
    /// Directory to scan, searched recursively (default: ./downloads)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Comma-separated extensions to consider, empty string = all (default: pdf)
    ///
    /// Example: --ext pdf,pptx,docx
    #[arg(long)]
    pub ext: Option<String>,

    /// Delete duplicates instead of moving them to the trash directory
    #[arg(long)]
    pub delete: bool,

    /// Only list what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CrawlArgs {
    /// Course page to start from
    pub url: String,

    /// Download root; a sub-directory per course is created inside (default: downloads)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// How many link hops to follow from the course page (default: 3)
    ///
    /// Depth 0 = only the course page itself
    #[arg(long)]
    pub depth: Option<usize>,

    /// Keep the browser open after downloading until Enter is pressed
    #[arg(long)]
    pub keep: bool,

    /// Which driver fetches pages: a real Chrome or plain HTTP
    #[arg(long, value_enum)]
    pub driver: Option<DriverKind>,

    /// Run Chrome without a window (only useful for sites without login)
    #[arg(long)]
    pub headless: bool,

    /// Skip PDFs whose file name already exists in the course directory
    #[arg(long)]
    pub skip_existing: bool,

    /// Print the crawl report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

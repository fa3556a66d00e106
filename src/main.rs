// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing) and load the optional config file
// 3. Dispatch to the appropriate subcommand handler
// 4. Print the results
// 5. Exit with proper code (0 = success, 1 = partly failed, 2 = error)
// =============================================================================

mod browser;  // src/browser/ - Chrome and plain-HTTP page drivers
mod cli;      // src/cli.rs - command-line parsing
mod config;   // src/config.rs - config file + defaults
mod crawl;    // src/crawl/ - course crawling and downloading
mod dedupe;   // src/dedupe/ - duplicate file cleanup
mod error;    // src/error.rs - typed errors

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};

use browser::{ChromeDriver, HttpDriver, PageDriver};
use cli::{CleanArgs, Cli, Commands, CrawlArgs};
use config::{CleanConfig, CleanMode, CrawlConfig, DriverKind, FileConfig};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Unexpected errors get exit code 2
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = everything done
//   Ok(1) = finished, but some files or downloads failed
//   Err   = could not run at all
async fn run() -> Result<i32> {
    // Parse CLI arguments first, so --help works without any logging setup
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    debug!(?cli, "CLI arguments parsed");

    let file_config = FileConfig::load_optional(cli.config.as_deref())?;

    match &cli.command {
        Commands::Clean(args) => handle_clean(args, &file_config),
        Commands::Crawl(args) => handle_crawl(args, &file_config).await,
    }
}

// RUST_LOG wins; otherwise -q / -v / -vv pick the level.
// Logs go to stderr so --json output on stdout stays parseable.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Handles the 'clean' subcommand
fn handle_clean(args: &CleanArgs, file_config: &FileConfig) -> Result<i32> {
    let config = CleanConfig::resolve(args, &file_config.clean);
    let report = dedupe::clean_directory(&config)
        .with_context(|| format!("cleaning {} failed", config.dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_clean_report(&report);
    }

    Ok(if report.failed() > 0 { 1 } else { 0 })
}

fn print_clean_report(report: &dedupe::CleanReport) {
    let action = match report.mode {
        CleanMode::Delete => "DELETE",
        CleanMode::Move => "MOVE",
    };

    for outcome in &report.outcomes {
        let shown = outcome
            .duplicate
            .path
            .strip_prefix(&report.dir)
            .unwrap_or(&outcome.duplicate.path);
        let base = outcome
            .duplicate
            .base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("[{}] {}  (original: {})", action, shown.display(), base);
        if let Some(error) = &outcome.error {
            println!("   ❌ {}", error);
        }
    }

    let verb = match (report.dry_run, report.mode) {
        (true, CleanMode::Delete) => "Would delete",
        (true, CleanMode::Move) => "Would move",
        (false, CleanMode::Delete) => "Deleted",
        (false, CleanMode::Move) => "Moved",
    };

    println!();
    println!("📊 Summary:");
    println!("   ✅ {}: {}", verb, report.processed());
    if report.failed() > 0 {
        println!("   ❌ Failed: {}", report.failed());
    }
    if report.mode == CleanMode::Move && !report.dry_run && report.processed() > 0 {
        println!("   🗑️  Moved to: {}", report.trash_dir.display());
    }
}

// Handles the 'crawl' subcommand
async fn handle_crawl(args: &CrawlArgs, file_config: &FileConfig) -> Result<i32> {
    let config = CrawlConfig::resolve(args, &file_config.crawl);
    println!("🔍 Crawling course: {}", config.start_url);
    println!("📊 Max crawl depth: {}", config.max_depth);

    let temp_dir = crawl::prepare_output(&config.out_dir)
        .with_context(|| format!("could not create {}", config.out_dir.display()))?;

    let mut driver: Box<dyn PageDriver> = match config.driver {
        DriverKind::Chrome => {
            let profile = config.out_dir.join(".chrome-profile");
            Box::new(
                ChromeDriver::launch(&config, &profile, &temp_dir)
                    .await
                    .context("could not start Chrome")?,
            )
        }
        DriverKind::Http => Box::new(HttpDriver::new(&config, &temp_dir)?),
    };

    let result = crawl::run_session(driver.as_mut(), &config, &temp_dir).await;

    if config.keep_open && config.driver == DriverKind::Chrome {
        crawl::wait_for_enter("Done. Press Enter to close the browser...").await?;
    }
    if let Err(e) = driver.close().await {
        warn!("Closing the browser failed: {}", e);
    }

    let report = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_crawl_report(&report);
    }

    Ok(if report.is_complete() { 0 } else { 1 })
}

fn print_crawl_report(report: &crawl::CrawlReport) {
    if report.crawl.resources.is_empty() {
        println!("⚠️  No PDFs found on the course host (external links are not followed)");
        return;
    }

    for collision in &report.crawl.canonical_collisions {
        println!(
            "🔁 {} links point at {} (differ only in query/fragment)",
            collision.urls.len(),
            collision.key
        );
    }

    let downloads = &report.downloads;
    println!();
    println!("📊 Summary:");
    println!("   📄 Pages crawled: {}", report.crawl.pages_visited);
    println!("   🔗 PDF links: {}", report.crawl.resources.len());
    println!("   ✅ Downloads triggered: {}", downloads.triggered);
    if !downloads.skipped.is_empty() {
        println!("   ⏭️  Already present: {}", downloads.skipped.len());
    }
    if !downloads.timed_out.is_empty() {
        println!("   ⏱️  Still running when we stopped waiting: {}", downloads.timed_out.len());
    }
    for failure in &downloads.failed {
        println!("   ❌ {}: {}", failure.url, failure.error);
    }
    println!("   📁 Files in: {}", report.course_dir.display());
}

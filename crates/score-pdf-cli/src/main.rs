//! Score PDF CLI - Command line tool for saving viewer scores as PDF.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use score_pdf_core::{AppConfig, ProgressFn, ScorePdf, ScoreJob, SourceUrl};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "score-pdf")]
#[command(author, version, about = "Download a sheet music score as a PDF", long_about = None)]
struct Args {
    /// Score page URLs, scraped in the given order
    #[arg(long, required = true, num_args = 1.., value_parser = parse_source_url)]
    urls: Vec<SourceUrl>,

    /// Score title
    #[arg(long)]
    title: String,

    /// Composer name
    #[arg(long)]
    composer: String,

    /// Directory the PDF is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Chrome or Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_source_url(value: &str) -> std::result::Result<SourceUrl, String> {
    SourceUrl::parse(value).map_err(|e| e.to_string())
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Download progress reporting. The bar is only drawn once the first image
/// is done, so it never shows during discovery.
fn download_progress() -> (Arc<OnceLock<ProgressBar>>, Box<ProgressFn>) {
    let slot = Arc::new(OnceLock::new());
    let bar = Arc::clone(&slot);
    let callback: Box<ProgressFn> = Box::new(move |done, total| {
        let pb = bar.get_or_init(|| progress_bar(total as u64));
        pb.set_position(done as u64);
    });
    (slot, callback)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(chrome) = args.chrome {
        config.browser.executable = Some(chrome);
    }
    if let Some(output_dir) = args.output_dir {
        config.output.output_dir = output_dir;
    }

    config.validate().context("Invalid configuration")?;

    let job = ScoreJob::new(args.urls, args.title, args.composer).context("Invalid score")?;
    info!(
        "Saving \"{}\" by {} from {} source(s)",
        job.title(),
        job.composer(),
        job.sources().len()
    );

    let scraper = ScorePdf::new(config).context("Failed to initialize downloader")?;

    let (bar, progress) = download_progress();

    let outcome = scraper
        .run(&job, Some(progress))
        .await
        .context("Failed to save score")?;

    if let Some(pb) = bar.get() {
        pb.finish_and_clear();
    }

    let Some(output) = outcome.output else {
        warn!(
            "No PDF written: {} of {} page images available",
            outcome.acquired, outcome.discovered
        );
        return Ok(());
    };

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Successfully created: {}", output.display());
    }

    Ok(())
}

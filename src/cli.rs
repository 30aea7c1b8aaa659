//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use webtoon_dl::{DEFAULT_CONCURRENT_CHAPTERS, DEFAULT_CONCURRENT_PAGES, DEFAULT_MAX_ATTEMPTS};

/// Download a comic series into ordered files, directories, or archives.
///
/// The series is described by a JSON manifest (chapter numbers, titles, and
/// page URLs); pages are fetched concurrently and reassembled in strict page
/// order.
#[derive(Parser, Debug)]
#[command(name = "webtoon-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the series manifest JSON
    pub manifest: PathBuf,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    pub out: PathBuf,

    /// First chapter to download (inclusive)
    #[arg(long)]
    pub start: Option<u32>,

    /// Last chapter to download (inclusive)
    #[arg(long)]
    pub end: Option<u32>,

    /// Download only the latest chapter (overrides --start/--end)
    #[arg(long)]
    pub latest: bool,

    /// Output format: loose images or an archive per chapter
    #[arg(long, default_value = "images", value_parser = ["images", "zip", "cbz"])]
    pub save_as: String,

    /// Store each chapter's images in its own subdirectory
    #[arg(long)]
    pub separate: bool,

    /// Convert pages to this image format (jpg, png, gif, webp)
    #[arg(long)]
    pub image_format: Option<String>,

    /// Export chapter metadata (titles, notes, summary)
    #[arg(long)]
    pub export_metadata: bool,

    /// Metadata export format
    #[arg(long, default_value = "json", value_parser = ["text", "json", "all"])]
    pub export_format: String,

    /// Maximum chapters downloaded concurrently (1-1000)
    #[arg(long, default_value_t = DEFAULT_CONCURRENT_CHAPTERS as u16, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub concurrent_chapters: u16,

    /// Global cap on concurrent page fetches (1-1000)
    #[arg(long, default_value_t = DEFAULT_CONCURRENT_PAGES as u16, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub concurrent_pages: u16,

    /// Retry strategy for failed page fetches
    #[arg(long, default_value = "exponential", value_parser = ["exponential", "linear", "fixed", "none"])]
    pub retry: String,

    /// Maximum attempts per page, including the first (1-20)
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: u32,

    /// Base retry delay in milliseconds (fixed delay, linear initial and
    /// increment, exponential base)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..=60000))]
    pub retry_delay_ms: u64,

    /// Proxy endpoint for all requests
    #[arg(long)]
    pub proxy: Option<String>,

    /// Wall-clock ceiling per chapter in seconds
    #[arg(long)]
    pub chapter_timeout_secs: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

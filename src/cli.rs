//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use batchdown_core::DEFAULT_CONCURRENCY;
use batchdown_core::crawl::DEFAULT_MAX_DEPTH;
use batchdown_core::download::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS};

/// Mirror every downloadable file below a web directory listing.
///
/// Batchdown follows links from the root page down to a bounded depth, keeps the files
/// that pass the extension and name filters, and downloads them concurrently. Partial
/// files are resumed on the next run.
#[derive(Parser, Debug)]
#[command(name = "batchdown")]
#[command(author, version, about)]
pub struct Args {
    /// Root URL of the listing to crawl
    pub url: String,

    /// Maximum depth below the root to descend (0 = root page only)
    #[arg(short = 'd', long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub depth: usize,

    /// Directory to mirror into (defaults to the root URL's host name)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Only keep files with these extensions (repeatable or comma separated)
    #[arg(short = 'e', long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Only keep files whose names contain one of these substrings
    #[arg(short = 'i', long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Drop files whose names contain any of these substrings (wins over --include)
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Download .html/.htm pages as files instead of skipping them
    #[arg(long)]
    pub include_html: bool,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Bytes written between cancellation checks
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE as u32, value_parser = clap::value_parser!(u32).range(1..=67_108_864))]
    pub chunk_size: u32,

    /// Maximum attempts per file, including the first (1-50)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=50))]
    pub max_attempts: u8,

    /// Delay between attempts in milliseconds (max 60000)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub retry_delay_ms: u64,

    /// List the files that would be downloaded, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run, print the file list as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// Disable the progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

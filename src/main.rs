//! CLI entry point for the batchdown tool.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use batchdown_core::download::TracingObserver;
use batchdown_core::{
    CrawlError, CrawlSession, CrawlTarget, DownloadOptions, FetchedSession, HttpClient,
    RetryPolicy, SessionError, TransferObserver,
};
use clap::Parser;
use indicatif::HumanBytes;
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::Args;
use progress::ProgressObserver;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut target = CrawlTarget::new(&args.url)?
        .with_max_depth(args.depth)
        .with_extensions(&args.extensions)
        .with_whitelist(&args.include)
        .with_blacklist(&args.exclude)
        .with_include_html(args.include_html);
    if let Some(output) = &args.output {
        target = target.with_store_dir(output);
    }
    info!(
        root = %target.root_url(),
        store_dir = %target.store_dir().display(),
        max_depth = target.max_depth(),
        "Batchdown starting"
    );

    let session = CrawlSession::new(target, HttpClient::new()?);
    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            stop.stop();
        }
    });

    let fetched = match session.fetch().await {
        Ok(fetched) => fetched,
        Err(SessionError::Crawl(CrawlError::Cancelled)) => {
            info!("Stopped during crawl");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    report_fetch(&fetched);

    if fetched.candidates().is_empty() {
        info!("No files matched; nothing to download");
        return Ok(());
    }

    if args.dry_run {
        print_listing(&fetched, args.json)?;
        return Ok(());
    }

    let options = DownloadOptions {
        concurrency: usize::from(args.concurrency),
        chunk_size: usize::try_from(args.chunk_size).unwrap_or(usize::MAX),
        retry_policy: RetryPolicy::new(
            u32::from(args.max_attempts),
            Duration::from_millis(args.retry_delay_ms),
        ),
    };

    let use_bars = !args.no_progress && !args.quiet && io::stderr().is_terminal();
    let bars = use_bars.then(|| Arc::new(ProgressObserver::new(fetched.candidates().len())));
    let observer: Arc<dyn TransferObserver> = match &bars {
        Some(bars) => Arc::clone(bars) as Arc<dyn TransferObserver>,
        None => Arc::new(TracingObserver),
    };

    let stop = fetched.stop_handle();
    let stats = fetched.download(options, observer).await?;
    if let Some(bars) = bars {
        bars.finish();
    }

    info!(
        completed = stats.completed(),
        already_present = stats.already_present(),
        failed = stats.failed(),
        cancelled = stats.cancelled(),
        retried = stats.retried(),
        bytes = %HumanBytes(stats.bytes()),
        "Download complete"
    );

    if stop.is_stopped() {
        info!("Stopped; rerun the same command to resume partial files");
    } else if stats.failed() > 0 {
        bail!("{} file(s) failed to download", stats.failed());
    }
    Ok(())
}

fn report_fetch(fetched: &FetchedSession) {
    for excluded in fetched.exclusions() {
        info!(name = %excluded.display_name, "Excluded by filter");
    }
    for dir in fetched.skipped_directories() {
        warn!(url = %dir, "Directory could not be listed; its files are missing");
    }
    let total: u64 = fetched.candidates().iter().map(|c| c.size_bytes).sum();
    info!(
        files = fetched.candidates().len(),
        excluded = fetched.exclusions().len(),
        known_size = %HumanBytes(total),
        "Fetch complete"
    );
}

fn print_listing(fetched: &FetchedSession, json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, fetched.report())?;
        writeln!(out)?;
        return Ok(());
    }
    for candidate in fetched.candidates() {
        let size = if candidate.size_bytes == 0 {
            "?".to_string()
        } else {
            HumanBytes(candidate.size_bytes).to_string()
        };
        writeln!(out, "{size:>12}  {}", candidate.url)?;
    }
    Ok(())
}

//! CLI entry point for webtoon-dl.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use webtoon_dl::{
    ArchiveFormat, BackoffStrategy, ChapterRange, EngineConfig, ExportFormat, ImageFormat,
    ManifestExtractor, OutputLayout, OutputOptions, RetryPolicy, RunReport, SeriesDownloader,
    SeriesOptions,
};

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let report = run(&args).await?;

    print_summary(&report, args.quiet);

    // Non-zero exit if any chapter is not fully succeeded; all artifacts
    // that could be produced have been written regardless.
    if report.is_complete_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run(args: &Args) -> Result<RunReport> {
    let extractor = ManifestExtractor::load(&args.manifest)
        .await
        .context("failed to load series manifest")?;

    let options = series_options(args)?;
    let downloader = SeriesDownloader::new(Arc::new(extractor), options)
        .context("failed to configure downloader")?;

    // Ctrl-C cancels cooperatively: in-flight work stops at its next
    // suspension point and unfinished chapters report Cancelled.
    let cancel = downloader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let progress_task = if args.quiet {
        None
    } else {
        Some(progress::spawn_progress(downloader.subscribe()))
    };

    let report = downloader.run().await.context("download run failed")?;

    if let Some(task) = progress_task {
        task.abort();
    }

    Ok(report)
}

/// Maps parsed CLI arguments onto the core configuration surface.
fn series_options(args: &Args) -> Result<SeriesOptions> {
    let layout = match args.save_as.as_str() {
        "zip" => OutputLayout::Archive(ArchiveFormat::Zip),
        "cbz" => OutputLayout::Archive(ArchiveFormat::Cbz),
        _ if args.separate => OutputLayout::Separate,
        _ => OutputLayout::Flat,
    };

    let delay = Duration::from_millis(args.retry_delay_ms);
    let strategy = match args.retry.as_str() {
        "none" => BackoffStrategy::None,
        "fixed" => BackoffStrategy::Fixed { delay },
        "linear" => BackoffStrategy::Linear {
            initial: delay,
            increment: delay,
        },
        _ => BackoffStrategy::Exponential {
            base: delay,
            multiplier: 2.0,
            max: Duration::from_secs(32),
        },
    };

    let image_format = args
        .image_format
        .as_deref()
        .map(str::parse::<ImageFormat>)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let export_format = if args.export_metadata {
        Some(
            args.export_format
                .parse::<ExportFormat>()
                .map_err(|e| anyhow::anyhow!(e))?,
        )
    } else {
        None
    };

    Ok(SeriesOptions {
        series_locator: args.manifest.display().to_string(),
        range: ChapterRange {
            start: args.start,
            end: args.end,
            latest: args.latest,
        },
        output: OutputOptions {
            root: args.out.clone(),
            layout,
        },
        engine: EngineConfig {
            concurrent_chapters: args.concurrent_chapters as usize,
            concurrent_pages: args.concurrent_pages as usize,
            retry_policy: RetryPolicy::new(strategy, args.max_attempts),
            chapter_timeout: args.chapter_timeout_secs.map(Duration::from_secs),
        },
        image_format,
        export_format,
        proxy: args.proxy.clone(),
    })
}

fn print_summary(report: &RunReport, quiet: bool) {
    info!(
        attempted = report.chapters_attempted(),
        complete = report.fully_succeeded(),
        partial = report.partially_failed(),
        failed = report.fully_failed(),
        cancelled = report.cancelled(),
        "run summary"
    );

    if quiet {
        return;
    }

    println!(
        "{} chapters: {} complete, {} partial, {} failed, {} cancelled",
        report.chapters_attempted(),
        report.fully_succeeded(),
        report.partially_failed(),
        report.fully_failed(),
        report.cancelled()
    );

    for outcome in &report.outcomes {
        if !outcome.failed_page_indices.is_empty() {
            println!(
                "  chapter {}: missing pages {:?}",
                outcome.chapter_number, outcome.failed_page_indices
            );
        }
    }
}

//! Two-tier download orchestration.
//!
//! The engine runs an outer bounded pool of chapter workers; each worker
//! fans out page tasks into a single page pool shared globally across all
//! active chapters, so the page limit caps total in-flight fetches
//! system-wide. Completed pages stream back to the chapter's assembler,
//! which commits them in page-index order regardless of completion order.
//!
//! # Chapter lifecycle
//!
//! `Pending → Fetching → Draining → Done`. A chapter is Pending until it
//! holds a chapter-pool slot, Fetching while its page locators are extracted
//! and its page tasks submitted, Draining while results arrive, and Done when
//! every owned page reached a terminal state. Extraction failure marks the
//! chapter failed without consuming any page-pool capacity.
//!
//! # Cancellation
//!
//! Cooperative and top-down: cancelling the run token cancels every chapter,
//! which cancels its outstanding page tasks through a child token. A page
//! task mid-retry-delay wakes at its next suspension point. Chapters that
//! had not reached Done report a distinguished `Cancelled` outcome, and an
//! archive that had not finished draining is discarded rather than left
//! half-written.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::client::PageFetcher;
use super::error::{FailureKind, classify_fetch_error};
use super::retry::{RetryDecision, RetryPolicy, parse_retry_after};
use crate::events::{ProgressEvent, ProgressSender};
use crate::export::MetadataExporter;
use crate::extractor::Extractor;
use crate::models::{
    ChapterDescriptor, ChapterOutcome, ChapterStatus, PageErrorKind, PageResult, PageSuccess,
    PageTask, RunReport,
};
use crate::storage::naming::pad_width;
use crate::storage::{ChapterAssembler, OutputOptions};
use crate::transform::PageTransform;

/// Minimum allowed pool size.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed pool size.
const MAX_CONCURRENCY: usize = 1000;

/// Default number of concurrently active chapters.
pub const DEFAULT_CONCURRENT_CHAPTERS: usize = 6;

/// Default global cap on in-flight page fetches.
///
/// Chapter concurrency does not affect throughput or rate limiting; this
/// limit does.
pub const DEFAULT_CONCURRENT_PAGES: usize = 120;

/// Error type for engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A pool size is outside the valid range.
    #[error(
        "invalid {pool} concurrency {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// Which pool was misconfigured.
        pool: &'static str,
        /// The invalid value.
        value: usize,
    },
}

/// Engine configuration: pool sizes, retry contract, chapter ceiling.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Outer pool: chapters downloaded concurrently.
    pub concurrent_chapters: usize,

    /// Inner pool: global cap on in-flight page fetches.
    pub concurrent_pages: usize,

    /// Retry contract applied to every page fetch attempt.
    pub retry_policy: RetryPolicy,

    /// Optional wall-clock ceiling per chapter; on expiry the chapter drains
    /// early and its remaining pages count as cancelled.
    pub chapter_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrent_chapters: DEFAULT_CONCURRENT_CHAPTERS,
            concurrent_pages: DEFAULT_CONCURRENT_PAGES,
            retry_policy: RetryPolicy::default(),
            chapter_timeout: None,
        }
    }
}

/// Per-run collaborators handed to [`DownloadEngine::run`].
#[derive(Clone)]
pub struct RunOptions {
    /// Where and how output is materialized.
    pub output: OutputOptions,

    /// Optional write-time page transform.
    pub transform: Option<Arc<dyn PageTransform>>,

    /// Optional metadata exporter; runs regardless of page outcomes.
    pub exporter: Option<Arc<MetadataExporter>>,
}

/// The two-tier download scheduler.
#[derive(Debug)]
pub struct DownloadEngine {
    chapter_pool: Arc<Semaphore>,
    page_pool: Arc<Semaphore>,
    retry_policy: RetryPolicy,
    chapter_timeout: Option<Duration>,
    cancel: CancellationToken,
    events: ProgressSender,
}

impl DownloadEngine {
    /// Creates an engine from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] when a pool size is
    /// outside `1..=1000`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let valid = MIN_CONCURRENCY..=MAX_CONCURRENCY;
        if !valid.contains(&config.concurrent_chapters) {
            return Err(EngineError::InvalidConcurrency {
                pool: "chapter",
                value: config.concurrent_chapters,
            });
        }
        if !valid.contains(&config.concurrent_pages) {
            return Err(EngineError::InvalidConcurrency {
                pool: "page",
                value: config.concurrent_pages,
            });
        }

        debug!(
            concurrent_chapters = config.concurrent_chapters,
            concurrent_pages = config.concurrent_pages,
            max_attempts = config.retry_policy.max_attempts(),
            chapter_timeout_ms = config.chapter_timeout.map(|t| t.as_millis()),
            "creating download engine"
        );

        Ok(Self {
            chapter_pool: Arc::new(Semaphore::new(config.concurrent_chapters)),
            page_pool: Arc::new(Semaphore::new(config.concurrent_pages)),
            retry_policy: config.retry_policy,
            chapter_timeout: config.chapter_timeout,
            cancel: CancellationToken::new(),
            events: ProgressSender::new(),
        })
    }

    /// Returns a token that cancels the whole run when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribes to the run's progress events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Downloads `chapters`, returning one outcome per chapter.
    ///
    /// Individual page and chapter failures never abort siblings; the report
    /// reflects exactly what succeeded, partially succeeded, failed, or was
    /// cancelled.
    #[instrument(skip_all, fields(chapters = chapters.len()))]
    pub async fn run(
        &self,
        extractor: Arc<dyn Extractor>,
        fetcher: Arc<dyn PageFetcher>,
        chapters: Vec<ChapterDescriptor>,
        options: RunOptions,
    ) -> RunReport {
        if chapters.is_empty() {
            info!("nothing selected, nothing to do");
            return RunReport::default();
        }

        // Shared pad so every chapter of the run names files consistently.
        let chapter_pad = chapters
            .iter()
            .map(|c| pad_width(c.chapter_number))
            .max()
            .unwrap_or(1);

        if let Some(exporter) = &options.exporter {
            if let Some(summary) = chapters.iter().find_map(|c| c.summary.as_deref()) {
                if let Err(e) = exporter.add_series_summary(summary).await {
                    warn!(error = %e, "series summary export failed");
                }
            }
        }

        let ctx = ChapterContext {
            extractor,
            fetcher,
            page_pool: Arc::clone(&self.page_pool),
            retry_policy: self.retry_policy.clone(),
            chapter_timeout: self.chapter_timeout,
            cancel: self.cancel.clone(),
            events: self.events.clone(),
            output: options.output.clone(),
            transform: options.transform.clone(),
            exporter: options.exporter.clone(),
            chapter_pad,
        };

        info!(chapters = chapters.len(), "starting download run");

        let mut handles = Vec::with_capacity(chapters.len());
        for descriptor in chapters {
            let ctx = ctx.clone();
            let chapter_pool = Arc::clone(&self.chapter_pool);
            let number = descriptor.chapter_number;
            handles.push((
                number,
                tokio::spawn(run_chapter(ctx, chapter_pool, descriptor)),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (number, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // Task panics are contained; the chapter counts as failed.
                    warn!(chapter = number, error = %e, "chapter task panicked");
                    outcomes.push(ChapterOutcome::failed(number));
                }
            }
        }

        if let Some(exporter) = &options.exporter {
            if let Err(e) = exporter.write_aggregate().await {
                warn!(error = %e, "aggregate metadata export failed");
            }
        }

        let report = RunReport { outcomes };
        info!(
            attempted = report.chapters_attempted(),
            complete = report.fully_succeeded(),
            partial = report.partially_failed(),
            failed = report.fully_failed(),
            cancelled = report.cancelled(),
            "download run finished"
        );
        report
    }
}

/// Everything a chapter worker needs, cloned per chapter.
#[derive(Clone)]
struct ChapterContext {
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn PageFetcher>,
    page_pool: Arc<Semaphore>,
    retry_policy: RetryPolicy,
    chapter_timeout: Option<Duration>,
    cancel: CancellationToken,
    events: ProgressSender,
    output: OutputOptions,
    transform: Option<Arc<dyn PageTransform>>,
    exporter: Option<Arc<MetadataExporter>>,
    chapter_pad: usize,
}

/// Why the drain loop stopped.
enum DrainEnd {
    /// Every page reached a terminal state.
    Drained,
    /// The run was cancelled.
    Cancelled,
    /// The per-chapter ceiling expired.
    TimedOut,
    /// The sink rejected a write; the chapter cannot continue.
    Broken,
}

/// Runs one chapter to a terminal outcome and emits `ChapterFinished`.
async fn run_chapter(
    ctx: ChapterContext,
    chapter_pool: Arc<Semaphore>,
    descriptor: ChapterDescriptor,
) -> ChapterOutcome {
    let outcome = run_chapter_inner(&ctx, chapter_pool, &descriptor).await;
    ctx.events
        .emit(ProgressEvent::ChapterFinished(outcome.clone()));
    outcome
}

#[instrument(skip_all, fields(chapter = descriptor.chapter_number))]
async fn run_chapter_inner(
    ctx: &ChapterContext,
    chapter_pool: Arc<Semaphore>,
    descriptor: &ChapterDescriptor,
) -> ChapterOutcome {
    let chapter_number = descriptor.chapter_number;

    // Pending: wait for a chapter-pool slot. Permit held for the whole
    // chapter and released by RAII on every exit path.
    let _permit = tokio::select! {
        () = ctx.cancel.cancelled() => return ChapterOutcome::cancelled(chapter_number),
        permit = chapter_pool.acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => return ChapterOutcome::cancelled(chapter_number),
        },
    };

    // Metadata export depends only on the descriptor, not on page outcomes.
    if let Some(exporter) = &ctx.exporter {
        if let Err(e) = exporter.add_chapter(descriptor, ctx.chapter_pad).await {
            warn!(chapter = chapter_number, error = %e, "metadata export failed");
        }
    }

    // Fetching: extract page locators. Failure here is isolated to this
    // chapter and consumes no page-pool capacity.
    let locators = tokio::select! {
        () = ctx.cancel.cancelled() => return ChapterOutcome::cancelled(chapter_number),
        result = ctx.extractor.list_pages(descriptor) => match result {
            Ok(locators) => locators,
            Err(e) => {
                warn!(chapter = chapter_number, error = %e, "page extraction failed");
                return ChapterOutcome::failed(chapter_number);
            }
        },
    };

    let total = locators.len();
    ctx.events.emit(ProgressEvent::ChapterStarted {
        chapter_number,
        page_count: total,
    });
    debug!(chapter = chapter_number, pages = total, "chapter fetching");

    let mut assembler = match ChapterAssembler::new(
        &ctx.output,
        chapter_number,
        ctx.chapter_pad,
        total,
        ctx.transform.clone(),
    ) {
        Ok(assembler) => assembler,
        Err(e) => {
            error!(chapter = chapter_number, error = %e, "failed to create output sink");
            return ChapterOutcome::failed(chapter_number);
        }
    };

    // Submit every page task; each acquires its own slot from the global
    // page pool. The channel is sized for the chapter, so page tasks never
    // block on a slow assembler.
    let chapter_cancel = ctx.cancel.child_token();
    let (tx, mut rx) = mpsc::channel::<(PageTask, PageResult)>(total.max(1));
    for (page_index, page_locator) in locators.into_iter().enumerate() {
        let task = PageTask {
            chapter_number,
            page_index,
            page_locator,
        };
        tokio::spawn(run_page(
            Arc::clone(&ctx.fetcher),
            Arc::clone(&ctx.page_pool),
            ctx.retry_policy.clone(),
            chapter_cancel.clone(),
            task,
            tx.clone(),
        ));
    }
    drop(tx);

    // Draining: collect results until every page is terminal, the chapter
    // ceiling expires, or the run is cancelled.
    let deadline = ctx.chapter_timeout.map(|t| Instant::now() + t);
    let mut end = DrainEnd::Drained;
    while !assembler.is_drained() {
        match recv_next(&mut rx, &ctx.cancel, deadline).await {
            Some((task, result)) => {
                let ok = result.is_success();
                let page_index = task.page_index;
                if let Err(e) = assembler.accept(&task, result) {
                    error!(chapter = chapter_number, error = %e, "output write failed");
                    end = DrainEnd::Broken;
                    break;
                }
                ctx.events.emit(ProgressEvent::PageCompleted {
                    chapter_number,
                    page_index,
                    ok,
                });
            }
            None => {
                end = if ctx.cancel.is_cancelled() {
                    DrainEnd::Cancelled
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(chapter = chapter_number, "chapter timeout, draining early");
                    DrainEnd::TimedOut
                } else {
                    // Channel closed before drain: page tasks died without
                    // reporting. Treat the chapter as broken.
                    warn!(chapter = chapter_number, "page channel closed before drain");
                    DrainEnd::Broken
                };
                break;
            }
        }
    }

    // Stop any still-outstanding page tasks for this chapter.
    chapter_cancel.cancel();

    let succeeded_count = assembler.succeeded();
    let failed_page_indices = assembler.failed_indices().clone();

    match end {
        DrainEnd::Drained => {
            match assembler.finalize() {
                Ok(output_location) => {
                    let status = if failed_page_indices.is_empty() {
                        ChapterStatus::Complete
                    } else if succeeded_count == 0 {
                        ChapterStatus::Failed
                    } else {
                        ChapterStatus::PartialFailure
                    };
                    debug!(
                        chapter = chapter_number,
                        ?status,
                        succeeded = succeeded_count,
                        failed = failed_page_indices.len(),
                        "chapter done"
                    );
                    ChapterOutcome {
                        chapter_number,
                        status,
                        succeeded_count,
                        failed_page_indices,
                        output_location,
                    }
                }
                Err(e) => {
                    error!(chapter = chapter_number, error = %e, "finalize failed");
                    ChapterOutcome {
                        chapter_number,
                        status: ChapterStatus::Failed,
                        succeeded_count,
                        failed_page_indices,
                        output_location: None,
                    }
                }
            }
        }
        DrainEnd::Cancelled | DrainEnd::TimedOut => ChapterOutcome {
            chapter_number,
            status: ChapterStatus::Cancelled,
            succeeded_count,
            failed_page_indices,
            output_location: assembler.abort(),
        },
        DrainEnd::Broken => ChapterOutcome {
            chapter_number,
            status: ChapterStatus::Failed,
            succeeded_count,
            failed_page_indices,
            output_location: assembler.abort(),
        },
    }
}

/// Waits for the next page result, the cancel token, or the deadline.
async fn recv_next(
    rx: &mut mpsc::Receiver<(PageTask, PageResult)>,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Option<(PageTask, PageResult)> {
    if let Some(deadline) = deadline {
        tokio::select! {
            () = cancel.cancelled() => None,
            () = tokio::time::sleep_until(deadline) => None,
            message = rx.recv() => message,
        }
    } else {
        tokio::select! {
            () = cancel.cancelled() => None,
            message = rx.recv() => message,
        }
    }
}

/// One page task: acquire a global page-pool slot, fetch through the retry
/// policy, hand the terminal result to the chapter worker.
async fn run_page(
    fetcher: Arc<dyn PageFetcher>,
    page_pool: Arc<Semaphore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    task: PageTask,
    tx: mpsc::Sender<(PageTask, PageResult)>,
) {
    // Acquiring the slot is itself a suspension point; released by RAII.
    let _permit = tokio::select! {
        () = cancel.cancelled() => return,
        permit = page_pool.acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => return,
        },
    };

    let Some(result) = fetch_with_retry(fetcher.as_ref(), &policy, &cancel, &task).await else {
        // Cancelled mid-attempt or mid-delay; the chapter worker does the
        // bookkeeping for unterminated pages.
        return;
    };

    let _ = tx.send((task, result)).await;
}

/// Drives one page through the retry policy to a terminal [`PageResult`].
///
/// Returns `None` when cancelled before reaching a terminal state.
async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    task: &PageTask,
) -> Option<PageResult> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(
            chapter = task.chapter_number,
            page = task.page_index,
            attempt,
            "attempting page fetch"
        );

        let attempt_result = tokio::select! {
            () = cancel.cancelled() => return None,
            result = fetcher.fetch(&task.page_locator) => result,
        };

        let error = match attempt_result {
            Ok(page) => {
                return Some(PageResult::Success(PageSuccess {
                    bytes: page.bytes,
                    content_type: page.content_type,
                }));
            }
            Err(error) => error,
        };

        let kind = classify_fetch_error(&error);

        // A rate-limited response may carry a mandatory server wait.
        let server_delay = if kind == FailureKind::RateLimited {
            error.retry_after_header().and_then(parse_retry_after)
        } else {
            None
        };

        match policy.should_retry(kind, attempt, server_delay) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    url = %task.page_locator,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    server_requested = server_delay.is_some(),
                    error = %error,
                    "retrying page fetch"
                );
                // Only this task sleeps through the delay.
                tokio::select! {
                    () = cancel.cancelled() => return None,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::GiveUp { reason } => {
                warn!(
                    url = %task.page_locator,
                    attempts = attempt,
                    %reason,
                    error = %error,
                    "page fetch failed terminally"
                );
                return Some(PageResult::Failure {
                    kind: page_error_kind(kind),
                    attempts_made: attempt,
                });
            }
        }
    }
}

/// Maps a transport failure kind to the reported page error kind.
fn page_error_kind(kind: FailureKind) -> PageErrorKind {
    match kind {
        FailureKind::Transient => PageErrorKind::Transient,
        FailureKind::Permanent => PageErrorKind::Permanent,
        FailureKind::RateLimited => PageErrorKind::RateLimited,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::download::client::FetchedPage;
    use crate::download::error::FetchError;
    use crate::extractor::ExtractionError;
    use crate::storage::OutputLayout;

    /// Extractor serving fixed page lists; chapters in `broken` fail
    /// `list_pages`.
    struct StaticExtractor {
        pages_per_chapter: usize,
        broken: HashSet<u32>,
    }

    #[async_trait]
    impl Extractor for StaticExtractor {
        async fn list_chapters(
            &self,
            _series_locator: &str,
        ) -> Result<Vec<ChapterDescriptor>, ExtractionError> {
            unimplemented!("engine tests pass chapters directly")
        }

        async fn list_pages(
            &self,
            chapter: &ChapterDescriptor,
        ) -> Result<Vec<String>, ExtractionError> {
            if self.broken.contains(&chapter.chapter_number) {
                return Err(ExtractionError::pages(
                    chapter.chapter_number,
                    "listing unparseable",
                ));
            }
            Ok((0..self.pages_per_chapter)
                .map(|i| {
                    format!(
                        "https://cdn.example.com/{}/{i}.jpg",
                        chapter.chapter_number
                    )
                })
                .collect())
        }
    }

    /// Fetcher answering every locator with its own URL as bytes.
    struct EchoFetcher;

    #[async_trait]
    impl PageFetcher for EchoFetcher {
        async fn fetch(&self, locator: &str) -> Result<FetchedPage, FetchError> {
            Ok(FetchedPage {
                bytes: locator.as_bytes().to_vec(),
                content_type: Some("image/jpeg".to_string()),
            })
        }
    }

    fn chapter(number: u32) -> ChapterDescriptor {
        ChapterDescriptor {
            series_id: "demo".to_string(),
            chapter_number: number,
            title: format!("Chapter {number}"),
            summary: None,
            author_notes: None,
            source_locator: format!("chapter-{number}"),
        }
    }

    fn run_options(dir: &tempfile::TempDir) -> RunOptions {
        RunOptions {
            output: OutputOptions {
                root: dir.path().to_path_buf(),
                layout: OutputLayout::Separate,
            },
            transform: None,
            exporter: None,
        }
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_engine_new_valid_config() {
        let engine = DownloadEngine::new(EngineConfig::default());
        assert!(engine.is_ok());
    }

    #[test]
    fn test_engine_new_rejects_zero_chapter_pool() {
        let result = DownloadEngine::new(EngineConfig {
            concurrent_chapters: 0,
            ..EngineConfig::default()
        });
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency {
                pool: "chapter",
                value: 0
            })
        ));
    }

    #[test]
    fn test_engine_new_rejects_oversized_page_pool() {
        let result = DownloadEngine::new(EngineConfig {
            concurrent_pages: 1001,
            ..EngineConfig::default()
        });
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency {
                pool: "page",
                value: 1001
            })
        ));
    }

    #[test]
    fn test_engine_error_display() {
        let error = EngineError::InvalidConcurrency {
            pool: "page",
            value: 0,
        };
        let msg = error.to_string();
        assert!(msg.contains("page"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn test_page_error_kind_mapping() {
        assert_eq!(
            page_error_kind(FailureKind::Transient),
            PageErrorKind::Transient
        );
        assert_eq!(
            page_error_kind(FailureKind::Permanent),
            PageErrorKind::Permanent
        );
        assert_eq!(
            page_error_kind(FailureKind::RateLimited),
            PageErrorKind::RateLimited
        );
    }

    // ==================== Run Tests ====================

    #[tokio::test]
    async fn test_run_empty_selection_is_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DownloadEngine::new(EngineConfig::default()).unwrap();

        let report = engine
            .run(
                Arc::new(StaticExtractor {
                    pages_per_chapter: 1,
                    broken: HashSet::new(),
                }),
                Arc::new(EchoFetcher),
                Vec::new(),
                run_options(&dir),
            )
            .await;

        assert_eq!(report.chapters_attempted(), 0);
        assert!(report.is_complete_success());
    }

    #[tokio::test]
    async fn test_run_downloads_all_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DownloadEngine::new(EngineConfig::default()).unwrap();

        let report = engine
            .run(
                Arc::new(StaticExtractor {
                    pages_per_chapter: 3,
                    broken: HashSet::new(),
                }),
                Arc::new(EchoFetcher),
                (1..=4).map(chapter).collect(),
                run_options(&dir),
            )
            .await;

        assert_eq!(report.chapters_attempted(), 4);
        assert_eq!(report.fully_succeeded(), 4);
        assert!(report.is_complete_success());

        // Per-chapter directories with zero-padded page names.
        assert!(dir.path().join("1").join("0.jpg").exists());
        assert!(dir.path().join("4").join("2.jpg").exists());
    }

    #[tokio::test]
    async fn test_run_extraction_failure_isolated_to_chapter() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DownloadEngine::new(EngineConfig::default()).unwrap();

        let report = engine
            .run(
                Arc::new(StaticExtractor {
                    pages_per_chapter: 2,
                    broken: HashSet::from([2]),
                }),
                Arc::new(EchoFetcher),
                (1..=3).map(chapter).collect(),
                run_options(&dir),
            )
            .await;

        assert_eq!(report.fully_succeeded(), 2);
        assert_eq!(report.fully_failed(), 1);

        let failed = report
            .outcomes
            .iter()
            .find(|o| o.status == ChapterStatus::Failed)
            .unwrap();
        assert_eq!(failed.chapter_number, 2);
        assert_eq!(failed.succeeded_count, 0);
    }

    #[tokio::test]
    async fn test_run_pre_cancelled_marks_all_chapters_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DownloadEngine::new(EngineConfig::default()).unwrap();
        engine.cancellation_token().cancel();

        let report = engine
            .run(
                Arc::new(StaticExtractor {
                    pages_per_chapter: 2,
                    broken: HashSet::new(),
                }),
                Arc::new(EchoFetcher),
                (1..=3).map(chapter).collect(),
                run_options(&dir),
            )
            .await;

        assert_eq!(report.cancelled(), 3);
        assert!(!report.is_complete_success());
    }

    #[tokio::test]
    async fn test_run_emits_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DownloadEngine::new(EngineConfig::default()).unwrap();
        let mut events = engine.subscribe();

        engine
            .run(
                Arc::new(StaticExtractor {
                    pages_per_chapter: 2,
                    broken: HashSet::new(),
                }),
                Arc::new(EchoFetcher),
                vec![chapter(1)],
                run_options(&dir),
            )
            .await;

        let mut started = 0;
        let mut pages = 0;
        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                ProgressEvent::ChapterStarted { page_count, .. } => {
                    started += 1;
                    assert_eq!(page_count, 2);
                }
                ProgressEvent::PageCompleted { ok, .. } => {
                    pages += 1;
                    assert!(ok);
                }
                ProgressEvent::ChapterFinished(outcome) => {
                    finished += 1;
                    assert_eq!(outcome.status, ChapterStatus::Complete);
                }
            }
        }
        assert_eq!(started, 1);
        assert_eq!(pages, 2);
        assert_eq!(finished, 1);
    }
}

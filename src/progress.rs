//! Terminal progress rendering from the engine's event stream.
//!
//! Purely a consumer: the engine never waits on this task. A lagging
//! renderer loses old events (broadcast semantics) without slowing the run.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use webtoon_dl::{ChapterStatus, ProgressEvent};

/// Spawns the progress renderer for one run.
pub fn spawn_progress(mut rx: broadcast::Receiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template(
            "{prefix:>12} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        let mut bars: HashMap<u32, ProgressBar> = HashMap::new();

        loop {
            match rx.recv().await {
                Ok(ProgressEvent::ChapterStarted {
                    chapter_number,
                    page_count,
                }) => {
                    let bar = multi.add(ProgressBar::new(page_count as u64));
                    bar.set_style(style.clone());
                    bar.set_prefix(format!("chapter {chapter_number}"));
                    bars.insert(chapter_number, bar);
                }
                Ok(ProgressEvent::PageCompleted {
                    chapter_number, ok, ..
                }) => {
                    if let Some(bar) = bars.get(&chapter_number) {
                        bar.inc(1);
                        if !ok {
                            bar.set_message("(gaps)");
                        }
                    }
                }
                Ok(ProgressEvent::ChapterFinished(outcome)) => {
                    if let Some(bar) = bars.remove(&outcome.chapter_number) {
                        let message = match outcome.status {
                            ChapterStatus::Complete => "done".to_string(),
                            ChapterStatus::PartialFailure => {
                                format!("{} pages missing", outcome.failed_page_indices.len())
                            }
                            ChapterStatus::Failed => "failed".to_string(),
                            ChapterStatus::Cancelled => "cancelled".to_string(),
                        };
                        bar.finish_with_message(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Dropped some events; counts may be slightly off.
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

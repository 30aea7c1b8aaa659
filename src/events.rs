//! Progress events emitted by the download orchestrator.
//!
//! The reporter is a passive sink: events go out over a bounded
//! `tokio::sync::broadcast` channel, sends never block the core, and a
//! subscriber that falls behind loses the oldest events rather than slowing
//! anything down.

use tokio::sync::broadcast;

use crate::models::ChapterOutcome;

/// Capacity of the event channel before laggards start losing events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Discrete progress events for one run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A chapter entered `Fetching`; `page_count` pages will be attempted.
    ChapterStarted {
        /// Chapter number.
        chapter_number: u32,
        /// Number of pages the chapter owns.
        page_count: usize,
    },

    /// One page task reached a terminal state.
    PageCompleted {
        /// Chapter the page belongs to.
        chapter_number: u32,
        /// Zero-based page index.
        page_index: usize,
        /// Whether the page was fetched successfully.
        ok: bool,
    },

    /// A chapter reached a terminal state.
    ChapterFinished(ChapterOutcome),
}

/// Non-blocking sender side of the progress channel.
///
/// Cloned into every chapter and page task. Dropping all receivers is fine;
/// sends simply become no-ops.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressSender {
    /// Creates the channel, returning the shared sender.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribes a new receiver to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Emits an event. Never blocks; errors (no subscribers) are ignored.
    pub fn emit(&self, event: ProgressEvent) {
        self.tx.send(event).ok();
    }
}

impl Default for ProgressSender {
    fn default() -> Self {
        Self::new()
    }
}

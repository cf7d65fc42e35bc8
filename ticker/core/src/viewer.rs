//! Feed Viewer
//!
//! Scrolls one feed's entries on the display from a background task until
//! told to stop.
//!
//! # Lifecycle
//!
//! ```text
//! start(feed) ──► fetch entries ──► clear ──► spawn worker ──► (returns)
//!                                              │
//!                     ┌────────────────────────┘
//!                     ▼
//!          ┌─► lookup(cursor) ── EndOfFeed ──► cursor = 0 ─┐
//!          │        │                                       │
//!          │      Entry ──► scroll for `dwell` ──► cursor+1 │
//!          └────────────────────────────────────────────────┘
//!
//! stop() ──► cancel token ──► await completion signal ──► (returns)
//! ```
//!
//! Each activation gets its own [`CancellationToken`] and a oneshot
//! completion channel. The worker sends on the channel as its very last act,
//! so once [`Viewer::stop`] returns the stopped worker will not write again.
//! A worker that ends on its own (a display error) cancels its own token, so
//! the activation stops counting as running.
//! Entries are fetched once per activation; there is no periodic refresh.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::display::{Display, DisplayError};
use crate::feed::{EntryLookup, Feed, FeedEntries, FeedEntry};
use crate::scroller::Scroller;
use crate::source::{FeedSource, FetchError};

/// How long each entry stays on screen by default
pub const DEFAULT_DWELL: Duration = Duration::from_secs(60);

/// Default pause between scroll frames
pub const DEFAULT_SCROLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default display width in characters
pub const DEFAULT_WIDTH: usize = 16;

/// Longest accepted dwell time
pub const MAX_DWELL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest pause the worker will take between frames
const MIN_SCROLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors that end a viewer activation before it produces output
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The feed could not be fetched or parsed
    #[error("Failed to fetch feed '{feed}': {source}")]
    Fetch {
        /// Name of the feed being activated
        feed: String,
        /// Underlying fetch error
        source: FetchError,
    },

    /// The display rejected an operation
    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// Timing and geometry for a viewer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerSettings {
    /// Display width in characters
    pub width: usize,
    /// How long each entry is scrolled before moving on
    pub dwell: Duration,
    /// Pause between frames
    pub scroll_interval: Duration,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            dwell: DEFAULT_DWELL,
            scroll_interval: DEFAULT_SCROLL_INTERVAL,
        }
    }
}

/// State for one activation, owned by the viewer
struct ViewerRun {
    feed: Feed,
    cancel: CancellationToken,
    stopped: oneshot::Receiver<()>,
}

/// Renders one feed at a time on the shared display
pub struct Viewer {
    display: Arc<dyn Display>,
    source: Arc<dyn FeedSource>,
    settings: ViewerSettings,
    run: Option<ViewerRun>,
}

impl Viewer {
    /// Create a viewer and put the panel in its viewing state
    /// (backlight on, cursor and blink off)
    ///
    /// # Errors
    ///
    /// Returns an error if the display rejects the initial setup.
    pub fn new(
        display: Arc<dyn Display>,
        source: Arc<dyn FeedSource>,
        settings: ViewerSettings,
    ) -> Result<Self, ViewerError> {
        display.backlight_on()?;
        display.blink_off()?;
        display.cursor_off()?;

        Ok(Self {
            display,
            source,
            settings,
            run: None,
        })
    }

    /// Fetch `feed` and start scrolling it in the background
    ///
    /// Returns as soon as the worker is spawned. A running activation is
    /// stopped first. If the fetch fails the display is left untouched and
    /// the viewer stays idle.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::Fetch`] if the entries cannot be fetched, or
    /// [`ViewerError::Display`] if the display cannot be cleared.
    pub async fn start(&mut self, feed: Feed) -> Result<(), ViewerError> {
        self.stop().await;

        let entries = self
            .source
            .fetch(feed.url())
            .await
            .map_err(|source| ViewerError::Fetch {
                feed: feed.name().to_string(),
                source,
            })?;
        let entries = FeedEntries::new(entries);

        self.display.clear()?;

        info!(
            feed = %feed.name(),
            entries = entries.len(),
            newest = ?entries.newest(),
            "Viewer started"
        );

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();
        let worker = Worker {
            feed: feed.clone(),
            entries,
            display: Arc::clone(&self.display),
            settings: self.settings,
            cancel: cancel.clone(),
        };

        tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                warn!(
                    feed = %worker.feed.name(),
                    error = %e,
                    "Viewer worker stopped on display error"
                );
            }
            worker.cancel.cancel();
            let _ = done_tx.send(());
        });

        self.run = Some(ViewerRun {
            feed,
            cancel,
            stopped: done_rx,
        });
        Ok(())
    }

    /// Stop the running activation and wait until its worker has finished
    ///
    /// When this returns, the stopped worker will make no further display
    /// writes. Does nothing if the viewer is idle. The wait is unbounded: a
    /// worker stuck inside a display call keeps this from returning.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        run.cancel.cancel();
        // A dropped sender (worker panicked) also means the worker is gone
        let _ = run.stopped.await;

        debug!(feed = %run.feed.name(), "Viewer stopped");
    }

    /// Put the panel into an inert state: blink, cursor and backlight off,
    /// then clear
    ///
    /// Does not stop a running worker; call [`Viewer::stop`] first.
    ///
    /// # Errors
    ///
    /// Returns an error if the display rejects any of the operations.
    pub fn terminate(&self) -> Result<(), DisplayError> {
        self.display.blink_off()?;
        self.display.cursor_off()?;
        self.display.backlight_off()?;
        self.display.clear()
    }

    /// Replace the panel contents with fixed lines
    ///
    /// Only meaningful while idle; a running worker would overwrite it.
    ///
    /// # Errors
    ///
    /// Returns an error if the display rejects the write.
    pub fn show_notice(&self, lines: &[&str]) -> Result<(), DisplayError> {
        let frame = Scroller::new(lines, self.settings.width).current_frame();
        self.display.clear()?;
        self.display.write(&frame)
    }

    /// Feed of the running activation, if any
    #[must_use]
    pub fn current_feed(&self) -> Option<&Feed> {
        self.live_run().map(|run| &run.feed)
    }

    /// Whether an activation is running
    ///
    /// False once the worker has ended, whether stopped or failed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.live_run().is_some()
    }

    fn live_run(&self) -> Option<&ViewerRun> {
        self.run.as_ref().filter(|run| !run.cancel.is_cancelled())
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.cancel.cancel();
        }
    }
}

/// Background half of an activation
struct Worker {
    feed: Feed,
    entries: FeedEntries,
    display: Arc<dyn Display>,
    settings: ViewerSettings,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(&self) -> Result<(), DisplayError> {
        if self.entries.is_empty() {
            // Wrapping an empty feed would spin; hold a placeholder instead
            let frame = Scroller::new([self.feed.name(), "No entries"], self.settings.width)
                .current_frame();
            self.display.write(&frame)?;
            self.cancel.cancelled().await;
            return Ok(());
        }

        let mut cursor = 0;
        while !self.cancel.is_cancelled() {
            let entry = match self.entries.lookup(cursor) {
                EntryLookup::Entry(entry) => entry,
                EntryLookup::EndOfFeed => {
                    cursor = 0;
                    continue;
                }
            };

            debug!(feed = %self.feed.name(), cursor, title = %entry.title(), "Showing entry");
            self.scroll_entry(entry).await?;
            cursor += 1;
        }

        Ok(())
    }

    /// Scroll one entry until the dwell time is up or the activation is
    /// cancelled
    async fn scroll_entry(&self, entry: &FeedEntry) -> Result<(), DisplayError> {
        let mut scroller = Scroller::new([self.feed.name(), entry.title()], self.settings.width);
        let interval = self.settings.scroll_interval.max(MIN_SCROLL_INTERVAL);
        // A dwell too long to represent scrolls until cancelled
        let deadline = Instant::now().checked_add(self.settings.dwell);

        while deadline.map_or(true, |deadline| Instant::now() < deadline) {
            self.display.write(&scroller.next_frame())?;

            let pause = match deadline {
                Some(deadline) => interval.min(deadline.saturating_duration_since(Instant::now())),
                None => interval,
            };
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(pause) => {}
            }
        }

        Ok(())
    }
}

//! Feed Controller
//!
//! Owns the feed list, the selected index and the single [`Viewer`]. Every
//! switch and stop runs as one unit under a single async mutex:
//!
//! ```text
//! next_feed()/previous_feed():
//!     lock ─► index = (index ± 1) mod len ─► viewer.stop() ─► viewer.start(copy) ─► unlock
//! ```
//!
//! Because the old worker is fully stopped before the new one is started,
//! and no two switches overlap, at most one worker ever writes to the
//! display. The lock is FIFO-fair, so concurrent button presses are honored
//! one by one in arrival order.

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::display::DisplayError;
use crate::feed::{Feed, FeedList};
use crate::viewer::{Viewer, ViewerError};

/// Second display row shown when a feed cannot be fetched
pub const UNAVAILABLE_NOTICE: &str = "Feed unavailable";

/// Errors from controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The initial index does not name a feed
    #[error("Feed index {index} out of range for {len} feeds")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of configured feeds
        len: usize,
    },

    /// The viewer could not activate the selected feed
    #[error(transparent)]
    Viewer(#[from] ViewerError),

    /// The display rejected an operation during stop
    #[error(transparent)]
    Display(#[from] DisplayError),
}

struct ControllerState {
    feeds: FeedList,
    index: usize,
    viewer: Viewer,
}

impl ControllerState {
    /// Stop whatever is running and start the feed at `index`
    ///
    /// The index is committed even if the fetch fails, so the next press
    /// moves on from the broken feed rather than retrying it.
    async fn activate(&mut self, index: usize) -> Result<(), ViewerError> {
        self.viewer.stop().await;
        self.index = index;

        let feed = self.feeds.at(index).clone();

        match self.viewer.start(feed.clone()).await {
            Ok(()) => {
                info!(index, feed = %feed.name(), "Feed activated");
                Ok(())
            }
            Err(e) => {
                warn!(index, feed = %feed.name(), error = %e, "Feed activation failed");
                let notice = [feed.name(), UNAVAILABLE_NOTICE];
                if let Err(display_err) = self.viewer.show_notice(&notice) {
                    warn!(error = %display_err, "Failed to show unavailable notice");
                }
                Err(e)
            }
        }
    }
}

/// Serializes feed switching over one viewer
pub struct Controller {
    state: Mutex<ControllerState>,
}

impl Controller {
    /// Create a controller and start the viewer on `feeds[initial_index]`
    ///
    /// A fetch failure for the initial feed is not fatal: it is logged, the
    /// unavailable notice is shown, and the controller is returned so the
    /// user can switch to another feed.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::IndexOutOfRange`] if `initial_index` does
    /// not name a feed.
    pub async fn launch(
        viewer: Viewer,
        feeds: FeedList,
        initial_index: usize,
    ) -> Result<Self, ControllerError> {
        if initial_index >= feeds.len() {
            return Err(ControllerError::IndexOutOfRange {
                index: initial_index,
                len: feeds.len(),
            });
        }

        let controller = Self {
            state: Mutex::new(ControllerState {
                feeds,
                index: initial_index,
                viewer,
            }),
        };

        {
            let mut state = controller.state.lock().await;
            if let Err(e) = state.activate(initial_index).await {
                warn!(error = %e, "Initial feed unavailable; waiting for a switch");
            }
        }

        Ok(controller)
    }

    /// Switch to the next feed, wrapping after the last
    ///
    /// Returns the new index.
    ///
    /// # Errors
    ///
    /// Returns an error if the new feed cannot be activated. The index has
    /// still moved.
    pub async fn next_feed(&self) -> Result<usize, ControllerError> {
        let mut state = self.state.lock().await;
        let index = state.feeds.next_index(state.index);
        state.activate(index).await?;
        Ok(index)
    }

    /// Switch to the previous feed, wrapping before the first
    ///
    /// Returns the new index.
    ///
    /// # Errors
    ///
    /// Returns an error if the new feed cannot be activated. The index has
    /// still moved.
    pub async fn previous_feed(&self) -> Result<usize, ControllerError> {
        let mut state = self.state.lock().await;
        let index = state.feeds.previous_index(state.index);
        state.activate(index).await?;
        Ok(index)
    }

    /// Stop the viewer and blank the display; used during shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the display cannot be put into its inert state.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        state.viewer.stop().await;
        state.viewer.terminate()?;
        info!("Controller stopped");
        Ok(())
    }

    /// Currently selected index
    pub async fn current_index(&self) -> usize {
        self.state.lock().await.index
    }

    /// Currently selected feed
    pub async fn current_feed(&self) -> Feed {
        let state = self.state.lock().await;
        state.feeds.at(state.index).clone()
    }

    /// Whether a viewer activation is running; false once its worker has ended
    pub async fn is_viewing(&self) -> bool {
        self.state.lock().await.viewer.is_running()
    }

    /// Number of configured feeds
    pub async fn feed_count(&self) -> usize {
        self.state.lock().await.feeds.len()
    }
}

//! Shared application state for the feed API.

use std::sync::Arc;

use ddfeed_core::FeedCoordinator;

/// State shared by every handler.
pub struct AppState {
    /// The coordinator all feed operations go through.
    pub feed: Arc<FeedCoordinator>,
}

impl AppState {
    /// Wrap a coordinator.
    pub const fn new(feed: Arc<FeedCoordinator>) -> Self {
        Self { feed }
    }
}

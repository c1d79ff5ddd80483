//! Exclusion id tracking
//!
//! The content service avoids returning the theme that is playing when it
//! is told its id. The id is taken from the last *promoted* bundle: a bundle
//! that was fetched but not played yet does not count. A promoted realtime
//! bundle has no content id, which clears the exclusion.

use tracing::debug;

#[derive(Debug, Default)]
pub struct DedupTracker {
    last_content_id: Option<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the content id of a bundle that just became current
    pub fn record_promoted(&mut self, content_id: Option<String>) {
        debug!(previous = ?self.last_content_id, next = ?content_id, "Exclusion id updated");
        self.last_content_id = content_id;
    }

    /// Id to send as `exclude` on the next fetch
    pub fn exclude_id(&self) -> Option<String> {
        self.last_content_id.clone()
    }
}

use crate::model::{Extraction, ProgressToken, ScraperError};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

/// The narrow surface the feed collector needs from whatever renders the feed.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    type Handle: Send + Sync;

    async fn request_load(&self, query: &str) -> Result<Self::Handle, ScraperError>;

    /// Returns `false` when content did not become ready within `timeout`.
    async fn wait_ready(&self, handle: &mut Self::Handle, timeout: Duration) -> bool;

    async fn extract_visible(&self, handle: &Self::Handle) -> Result<Vec<Extraction>, ScraperError>;

    async fn progress_signal(&self, handle: &Self::Handle) -> ProgressToken;

    async fn advance(&self, handle: &mut Self::Handle) -> Result<(), ScraperError>;
}

impl ProgressToken {
    /// Digest of the texts currently visible; an unchanged window yields an equal token.
    pub fn of_window<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = DefaultHasher::new();
        for text in texts {
            text.hash(&mut hasher);
        }
        ProgressToken(hasher.finish())
    }
}

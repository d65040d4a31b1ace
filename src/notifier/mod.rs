pub mod telegram;

use crate::model::{NotifyError, ScoredPost};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

pub use telegram::TelegramNotifier;

/// Outreach side effect applied to selected posts.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_text(&self, text: &str) -> Result<(), NotifyError>;
    async fn notify(&self, post: &ScoredPost) -> Result<(), NotifyError>;
}

/// Simulated outreach: logs what would be sent.
#[derive(Default)]
pub struct LogNotifier {
    sent: AtomicUsize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify_text(&self, text: &str) -> Result<(), NotifyError> {
        info!("📣 {}", text);
        Ok(())
    }

    async fn notify(&self, post: &ScoredPost) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        info!(
            "📣 [dry-run] would engage {} ({} {:.3}): {}",
            post.item.source_url.as_deref().unwrap_or("-"),
            post.row.best_label,
            post.row.best_score,
            post.item.text
        );
        Ok(())
    }
}

// notifier/telegram/sender.rs

use crate::model::{NotifyError, ScoredPost};
use crate::notifier::telegram::TelegramNotifier;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends a simple text message via Telegram.
pub async fn send_text(notifier: &TelegramNotifier, text: &str) -> Result<(), NotifyError> {
    send_message(notifier, text.to_string()).await
}

/// Sends a notification message for a matching post.
pub async fn send_post(notifier: &TelegramNotifier, post: &ScoredPost) -> Result<(), NotifyError> {
    let message = format_post(post);
    info!("📤 Sending Telegram message:\n{}", message);
    send_message(notifier, message).await
}

pub fn format_post(post: &ScoredPost) -> String {
    format!(
        "🎯 Matching post!\n\n🏷 Intent: {}\n📈 Score: {:.3} (mean {:.3})\n👤 Author: {} {}\n🔗 Link: {}\n\n{}",
        post.row.best_label,
        post.row.best_score,
        post.row.mean_score,
        post.item.author.as_deref().unwrap_or("unknown"),
        post.item.author_url.as_deref().unwrap_or(""),
        post.item.source_url.as_deref().unwrap_or("-"),
        post.item.text
    )
}

async fn send_message(notifier: &TelegramNotifier, text: String) -> Result<(), NotifyError> {
    let url = notifier.method_url("sendMessage");
    let response = match timeout(
        Duration::from_secs(10),
        notifier
            .client
            .post(&url)
            .form(&[("chat_id", notifier.chat_id.to_string()), ("text", text)])
            .send(),
    )
    .await
    {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            warn!("❌ Telegram send() failed: {:?}", e);
            return Err(NotifyError::ApiError(format!("Send failed: {}", e)));
        }
        Err(_) => {
            warn!("⏳ Telegram send() timed out");
            return Err(NotifyError::Unreachable);
        }
    };

    let status = response.status();
    let body: Option<TelegramApiResponse> = response.json().await.ok();
    match body {
        Some(api) if status.is_success() && api.ok => {
            info!("✅ Telegram response [{}]", status);
            Ok(())
        }
        Some(api) => {
            let reason = api.description.unwrap_or_else(|| "unknown".into());
            warn!("❌ Telegram API responded [{}]: {}", status, reason);
            Err(NotifyError::ApiError(reason))
        }
        None => {
            warn!("❌ Telegram API responded [{}] without a readable body", status);
            Err(NotifyError::Unreachable)
        }
    }
}

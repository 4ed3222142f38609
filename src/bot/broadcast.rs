use std::time::Duration;

use tracing::{debug, info, warn};

use super::telegram::ChatApi;
use super::texts;

/// Pause between two broadcast sends.
pub const BROADCAST_DELAY: Duration = Duration::from_millis(50);

/// Progress is reported after every this many sends.
pub const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Message that gets edited with progress and the final summary.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Sends `text` to every recipient in order. A failed send is counted and
/// skipped; it never stops the loop.
pub async fn broadcast<A: ChatApi + ?Sized>(
    api: &A,
    recipients: &[i64],
    text: &str,
    delay: Duration,
    progress: Option<ProgressMessage>,
) -> BroadcastSummary {
    let total = recipients.len();
    let mut summary = BroadcastSummary::default();
    info!("Broadcasting to {} recipients", total);

    for (index, &chat_id) in recipients.iter().enumerate() {
        match api.send_message(chat_id, text, None).await {
            Ok(_) => summary.sent += 1,
            Err(e) => {
                debug!("Broadcast to {} failed: {}", chat_id, e);
                summary.failed += 1;
            }
        }

        let done = index + 1;
        if done % PROGRESS_EVERY == 0 && done < total {
            if let Some(progress) = progress {
                let status = texts::broadcast_progress(done, total);
                if let Err(e) = api
                    .edit_message(progress.chat_id, progress.message_id, &status, None)
                    .await
                {
                    warn!("Failed to report broadcast progress: {}", e);
                }
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(
        "Broadcast finished: {} sent, {} failed",
        summary.sent, summary.failed
    );
    summary
}

use crate::providers::{Mailbox, MessageSummary, INBOX, UNREAD};
use anyhow::{Context, Result};

/// Unread inbox messages, at most `max_results`, in provider order.
pub async fn scan(mailbox: &dyn Mailbox, max_results: u32) -> Result<Vec<MessageSummary>> {
    let ids = mailbox
        .list_message_ids(&[INBOX, UNREAD], max_results)
        .await
        .context("Failed to list unread messages")?;

    let mut summaries = Vec::with_capacity(ids.len());
    for id in ids {
        let summary = mailbox
            .get_metadata(&id)
            .await
            .with_context(|| format!("Failed to fetch message {}", id))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

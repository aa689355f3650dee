use crate::composer::{compose, ReplyWriter};
use crate::config::Config;
use crate::labels::LabelManager;
use crate::providers::{Mailbox, MessageSummary, UNREAD};
use crate::scanner;
use crate::sender::extract_address;
use anyhow::{Context, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    SkipAlreadyReplied,
    SkipSenderNotAllowed,
    Reply,
}

/// Skip/allow decision for one message. The sentinel check comes first, so a
/// replied message is skipped whoever sent it.
pub fn decide(message: &MessageSummary, sender: &str, sentinel_id: Option<&str>, config: &Config) -> Decision {
    if sentinel_id.is_some_and(|id| message.label_ids.contains(id)) {
        Decision::SkipAlreadyReplied
    } else if !config.is_sender_allowed(sender) {
        Decision::SkipSenderNotAllowed
    } else {
        Decision::Reply
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub scanned: usize,
    pub already_replied: usize,
    pub not_allowed: usize,
    pub replied: usize,
}

/// One scan-and-reply pass over the inbox.
pub struct Orchestrator<'a> {
    mailbox: &'a dyn Mailbox,
    writer: &'a dyn ReplyWriter,
    config: &'a Config,
    dry_run: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(mailbox: &'a dyn Mailbox, writer: &'a dyn ReplyWriter, config: &'a Config) -> Self {
        Self {
            mailbox,
            writer,
            config,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Messages are handled strictly in order; the first error ends the pass and
    /// leaves the remaining messages for the next run.
    pub async fn run(&self) -> Result<RunReport> {
        let labels = LabelManager::new(self.mailbox);
        let sentinel_id = if self.dry_run {
            labels.find(&self.config.label_name).await?.map(|l| l.id)
        } else {
            Some(labels.ensure(&self.config.label_name).await?.id)
        };
        debug!(label = %self.config.label_name, id = ?sentinel_id, "sentinel label");

        let messages = scanner::scan(self.mailbox, self.config.max_results).await?;
        let mut report = RunReport {
            scanned: messages.len(),
            ..RunReport::default()
        };

        if messages.is_empty() {
            println!("No new emails.");
            return Ok(report);
        }

        for message in &messages {
            let sender = extract_address(&message.from);
            println!("From: {}", sender);
            println!("Subject: {}", message.subject);

            match decide(message, &sender, sentinel_id.as_deref(), self.config) {
                Decision::SkipAlreadyReplied => {
                    println!("[SKIP] Already replied\n");
                    report.already_replied += 1;
                }
                Decision::SkipSenderNotAllowed => {
                    println!("[SKIP] Sender not allowed\n");
                    report.not_allowed += 1;
                }
                Decision::Reply if self.dry_run => {
                    println!("[dry-run] Would reply to {}\n", sender);
                    report.replied += 1;
                }
                Decision::Reply => {
                    // sentinel_id is always set outside dry-run
                    let label_id = sentinel_id.as_deref().unwrap_or_default();
                    self.reply(message, &sender, label_id).await?;
                    println!("[REPLIED] Auto-reply sent\n");
                    report.replied += 1;
                }
            }
        }

        Ok(report)
    }

    async fn reply(&self, message: &MessageSummary, sender: &str, label_id: &str) -> Result<()> {
        let payload = compose(self.writer, sender, &message.subject).await?;

        self.mailbox
            .send_raw(&payload.to_raw())
            .await
            .with_context(|| format!("Failed to send reply to {}", sender))?;
        info!(message_id = %message.id, to = %sender, "reply sent");

        self.mailbox
            .modify_labels(&message.id, &[label_id], &[UNREAD])
            .await
            .with_context(|| format!("Failed to mark message {} as replied", message.id))?;
        Ok(())
    }
}

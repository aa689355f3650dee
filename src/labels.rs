use crate::providers::Mailbox;
use anyhow::{Context, Result};
use tracing::info;

/// Sentinel label recording that a message already got an automatic reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelLabel {
    pub id: String,
    pub name: String,
}

pub struct LabelManager<'a> {
    mailbox: &'a dyn Mailbox,
}

impl<'a> LabelManager<'a> {
    pub fn new(mailbox: &'a dyn Mailbox) -> Self {
        Self { mailbox }
    }

    /// Existing label with exactly this name, if any
    pub async fn find(&self, name: &str) -> Result<Option<SentinelLabel>> {
        let labels = self.mailbox.list_labels().await.context("Failed to list labels")?;
        Ok(labels
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| SentinelLabel { id: l.id, name: l.name }))
    }

    /// Look the label up by name, creating it on first use.
    pub async fn ensure(&self, name: &str) -> Result<SentinelLabel> {
        if let Some(label) = self.find(name).await? {
            return Ok(label);
        }

        let created = self
            .mailbox
            .create_label(name)
            .await
            .with_context(|| format!("Failed to create label '{}'", name))?;
        info!(label = %created.name, id = %created.id, "created sentinel label");
        Ok(SentinelLabel {
            id: created.id,
            name: created.name,
        })
    }
}

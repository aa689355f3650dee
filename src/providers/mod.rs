pub mod gmail;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Label marking a message as not yet read
pub const UNREAD: &str = "UNREAD";
pub const INBOX: &str = "INBOX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: String,
    /// Raw `From` header, not yet reduced to an address
    pub from: String,
    pub subject: String,
    pub label_ids: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Operations the reply pass needs from a mailbox.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Ids of messages carrying every label in `label_ids`, newest first.
    async fn list_message_ids(&self, label_ids: &[&str], max: u32) -> Result<Vec<String>>;
    /// Headers and labels only; the body is never fetched.
    async fn get_metadata(&self, id: &str) -> Result<MessageSummary>;
    /// Submit an already encoded message (base64url MIME).
    async fn send_raw(&self, raw: &str) -> Result<()>;
    async fn modify_labels(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()>;
    async fn list_labels(&self) -> Result<Vec<Label>>;
    async fn create_label(&self, name: &str) -> Result<Label>;
}

use super::{Label, Mailbox, MessageSummary};
use crate::error::check_response;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
const SERVICE: &str = "gmail";

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    payload: Option<Payload>,
}

impl Message {
    /// Last occurrence wins, matching a header-name -> value map
    fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct GmailLabel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListLabelsResponse {
    labels: Option<Vec<GmailLabel>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    label_list_visibility: &'a str,
    message_list_visibility: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: &'a [&'a str],
    remove_label_ids: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

/// Gmail v1 REST client for the authenticated user (`users/me`).
pub struct GmailProvider {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GmailProvider {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GMAIL_API_BASE)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Gmail request GET {} failed", path))?;
        let response = check_response(SERVICE, response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Gmail response for {}", path))
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Gmail request POST {} failed", path))?;
        Ok(check_response(SERVICE, response).await?)
    }
}

#[async_trait]
impl Mailbox for GmailProvider {
    async fn list_message_ids(&self, label_ids: &[&str], max: u32) -> Result<Vec<String>> {
        let mut query: Vec<(&str, String)> = label_ids
            .iter()
            .map(|l| ("labelIds", l.to_string()))
            .collect();
        query.push(("maxResults", max.to_string()));

        let list: ListMessagesResponse = self.get_json("messages", &query).await?;
        let ids: Vec<String> = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect();
        debug!(count = ids.len(), "listed messages");
        Ok(ids)
    }

    async fn get_metadata(&self, id: &str) -> Result<MessageSummary> {
        let query = [
            ("format", "metadata".to_string()),
            ("metadataHeaders", "From".to_string()),
            ("metadataHeaders", "Subject".to_string()),
        ];
        let msg: Message = self.get_json(&format!("messages/{}", id), &query).await?;

        Ok(MessageSummary {
            from: msg.header("From").unwrap_or("").to_string(),
            subject: msg.header("Subject").unwrap_or("(No Subject)").to_string(),
            label_ids: msg.label_ids.iter().cloned().collect(),
            id: msg.id,
        })
    }

    async fn send_raw(&self, raw: &str) -> Result<()> {
        self.post_json("messages/send", &SendRequest { raw }).await?;
        Ok(())
    }

    async fn modify_labels(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        self.post_json(&format!("messages/{}/modify", id), &body).await?;
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let list: ListLabelsResponse = self.get_json("labels", &[]).await?;
        Ok(list
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| Label {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let body = CreateLabelRequest {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        };
        let created: GmailLabel = self
            .post_json("labels", &body)
            .await?
            .json()
            .await
            .context("Failed to parse created label")?;
        Ok(Label {
            id: created.id,
            name: created.name,
        })
    }
}

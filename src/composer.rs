use crate::config::{Config, ReplyMode};
use crate::llm::{ChatCompletionsClient, ChatMessage, ChatRequest, TextGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;

const STATIC_BODY: &str = "Hello,\n\nThank you for your email. This is a quick note to confirm that \
your message has been received and will be looked at shortly.\n\nBest regards";

const SYSTEM_PROMPT: &str = "You write professional email replies.";

/// Longest run of raw bytes per base64 line (76 encoded columns)
const BASE64_LINE_BYTES: usize = 57;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReplyPayload {
    pub fn new(to: &str, original_subject: &str, body: String) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Re: {}", original_subject),
            body,
        }
    }

    /// Single-part `text/plain` message with `\n` line endings and lowercase `to`/`subject` headers.
    pub fn to_mime(&self) -> String {
        let ascii_body = self.body.is_ascii();
        let (charset, encoding) = if ascii_body {
            ("us-ascii", "7bit")
        } else {
            ("utf-8", "base64")
        };

        let mut mime = String::new();
        mime.push_str(&format!("Content-Type: text/plain; charset=\"{}\"\n", charset));
        mime.push_str("MIME-Version: 1.0\n");
        mime.push_str(&format!("Content-Transfer-Encoding: {}\n", encoding));
        mime.push_str(&format!("to: {}\n", encode_header(&self.to)));
        mime.push_str(&format!("subject: {}\n", encode_header(&self.subject)));
        mime.push('\n');

        if ascii_body {
            mime.push_str(&self.body.replace("\r\n", "\n").replace('\r', "\n"));
        } else {
            for chunk in self.body.as_bytes().chunks(BASE64_LINE_BYTES) {
                mime.push_str(&STANDARD.encode(chunk));
                mime.push('\n');
            }
        }
        mime
    }

    /// Value of the `raw` field for the provider's send call.
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.to_mime().as_bytes())
    }
}

/// RFC 2047 encoded word for non-ASCII header values, `q` or `b` whichever is
/// shorter (`q` on a tie).
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    let bytes = value.as_bytes();
    let b_len = bytes.len().div_ceil(3) * 4;
    let q_len: usize = bytes.iter().map(|&b| if q_literal(b) { 1 } else { 3 }).sum();

    if b_len < q_len {
        format!("=?utf-8?b?{}?=", STANDARD.encode(bytes))
    } else {
        format!("=?utf-8?q?{}?=", q_encode(bytes))
    }
}

/// Bytes written as themselves in a `q` encoded word; space becomes `_`.
fn q_literal(b: u8) -> bool {
    b == b' ' || b.is_ascii_alphanumeric() || b"-!*+/".contains(&b)
}

fn q_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            b' ' => "_".to_string(),
            b if q_literal(b) => (b as char).to_string(),
            b => format!("={:02X}", b),
        })
        .collect()
}

/// Source of the reply body.
#[async_trait]
pub trait ReplyWriter: Send + Sync {
    async fn write_body(&self, sender: &str, subject: &str) -> Result<String>;
}

/// The same acknowledgment for every message.
pub struct StaticReply;

#[async_trait]
impl ReplyWriter for StaticReply {
    async fn write_body(&self, _sender: &str, _subject: &str) -> Result<String> {
        Ok(STATIC_BODY.to_string())
    }
}

/// Body written by a language model.
pub struct GeneratedReply {
    generator: Box<dyn TextGenerator>,
    model: String,
    temperature: f64,
}

impl GeneratedReply {
    pub fn new(generator: Box<dyn TextGenerator>, model: &str, temperature: f64) -> Self {
        Self {
            generator,
            model: model.to_string(),
            temperature,
        }
    }

    fn request(&self, sender: &str, subject: &str) -> ChatRequest {
        let prompt = format!(
            r#"
You are a professional email assistant.

Write a polite, concise, professional reply to this email.

From: {}
Subject: {}

The reply should:
- Acknowledge receipt
- Be friendly and professional
- Not ask unnecessary questions
"#,
            sender, subject
        );

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ReplyWriter for GeneratedReply {
    async fn write_body(&self, sender: &str, subject: &str) -> Result<String> {
        let response = self
            .generator
            .complete(&self.request(sender, subject))
            .await
            .context("Failed to generate reply")?;

        let content = response
            .first_content()
            .ok_or_else(|| anyhow::anyhow!("Completion returned no content"))?;
        Ok(content.trim().to_string())
    }
}

/// Writer selected by the configured reply mode.
pub fn writer_for(config: &Config) -> Result<Box<dyn ReplyWriter>> {
    match config.reply_mode {
        ReplyMode::Static => Ok(Box::new(StaticReply)),
        ReplyMode::Generated => {
            let client =
                ChatCompletionsClient::from_env(&config.api_base_url, crate::config::API_KEY_ENV)?;
            Ok(Box::new(GeneratedReply::new(
                Box::new(client),
                &config.model,
                config.temperature,
            )))
        }
    }
}

pub async fn compose(writer: &dyn ReplyWriter, sender: &str, subject: &str) -> Result<ReplyPayload> {
    let body = writer.write_body(sender, subject).await?;
    Ok(ReplyPayload::new(sender, subject, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatResponse;

    struct CannedGenerator {
        reply: serde_json::Value,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            Ok(serde_json::from_value(self.reply.clone())?)
        }
    }

    fn canned(reply: serde_json::Value) -> CannedGenerator {
        CannedGenerator { reply }
    }

    #[test]
    fn test_ascii_mime_layout() {
        let payload = ReplyPayload::new("a@x.com", "Hi", "Thanks!".to_string());
        assert_eq!(
            payload.to_mime(),
            "Content-Type: text/plain; charset=\"us-ascii\"\n\
             MIME-Version: 1.0\n\
             Content-Transfer-Encoding: 7bit\n\
             to: a@x.com\n\
             subject: Re: Hi\n\
             \n\
             Thanks!"
        );
    }

    #[test]
    fn test_raw_is_padded_urlsafe_base64_of_mime() {
        let payload = ReplyPayload::new("a@x.com", "Hi?", "ok>>".to_string());
        let raw = payload.to_raw();
        assert!(!raw.contains('+') && !raw.contains('/'));
        let decoded = URL_SAFE.decode(&raw).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), payload.to_mime());
    }

    #[test]
    fn test_non_ascii_body_uses_base64_transfer_encoding() {
        let body = "Merci beaucoup, à bientôt! ".repeat(4);
        let payload = ReplyPayload::new("a@x.com", "Café", body.clone());
        let mime = payload.to_mime();

        assert!(mime.starts_with("Content-Type: text/plain; charset=\"utf-8\"\n"));
        assert!(mime.contains("Content-Transfer-Encoding: base64\n"));
        assert!(mime.contains("subject: =?utf-8?b?"));

        let encoded_body = mime.split("\n\n").nth(1).unwrap();
        assert!(encoded_body.lines().all(|l| l.len() <= 76));
        let joined: String = encoded_body.lines().collect();
        assert_eq!(String::from_utf8(STANDARD.decode(joined).unwrap()).unwrap(), body);
    }

    #[test]
    fn test_mostly_ascii_subject_uses_q_encoding() {
        let payload = ReplyPayload::new("a@x.com", "Meeting notes for the café planning session", "hi".to_string());
        assert!(payload
            .to_mime()
            .contains("subject: =?utf-8?q?Re=3A_Meeting_notes_for_the_caf=C3=A9_planning_session?=\n"));
    }

    #[test]
    fn test_mostly_non_ascii_subject_uses_b_encoding() {
        assert_eq!(encode_header("Re: Привет"), format!("=?utf-8?b?{}?=", STANDARD.encode("Re: Привет")));
        assert_eq!(encode_header("plain"), "plain");
    }

    #[test]
    fn test_ascii_body_line_endings_become_newlines() {
        let payload = ReplyPayload::new("a@x.com", "Hi", "line1\r\nline2\rline3".to_string());
        assert!(payload.to_mime().ends_with("\n\nline1\nline2\nline3"));
    }

    #[tokio::test]
    async fn test_static_reply_is_constant() {
        let a = compose(&StaticReply, "a@x.com", "Hi").await.unwrap();
        let b = compose(&StaticReply, "b@x.com", "Other").await.unwrap();
        assert_eq!(a.body, b.body);
        assert_eq!(a.subject, "Re: Hi");
        assert_eq!(a.to, "a@x.com");
    }

    #[tokio::test]
    async fn test_generated_reply_trims_first_choice() {
        let generator = canned(serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "\n  Thank you for reaching out.  \n"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }));
        let writer = GeneratedReply::new(Box::new(generator), "llama-3.1-8b-instant", 0.4);

        let payload = compose(&writer, "a@x.com", "Hi").await.unwrap();
        assert_eq!(payload.body, "Thank you for reaching out.");
        assert_eq!(payload.subject, "Re: Hi");
    }

    #[test]
    fn test_generated_request_embeds_sender_and_subject() {
        let writer = GeneratedReply::new(Box::new(canned(serde_json::json!({}))), "m", 0.4);
        let request = writer.request("a@x.com", "Quarterly report");

        assert_eq!(request.model, "m");
        assert_eq!(request.temperature, 0.4);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[1].content.contains("From: a@x.com"));
        assert!(request.messages[1].content.contains("Subject: Quarterly report"));
        assert!(request.messages[1].content.contains("Not ask unnecessary questions"));
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error() {
        let writer = GeneratedReply::new(
            Box::new(canned(serde_json::json!({"choices": []}))),
            "m",
            0.4,
        );
        assert!(compose(&writer, "a@x.com", "Hi").await.is_err());
    }
}

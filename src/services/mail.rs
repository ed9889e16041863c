//! Gmail（REST v1）
//!
//! list（INBOX + 查询串）-> 逐条 get（format=full）-> 提取 From/Subject/Date 与纯文本正文；
//! send 把 RFC 2822 报文 base64url 编码后放进 raw 字段，每次调用发送一封，不做去重。

use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::services::{GoogleApi, ServiceError};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// 一封邮件（字段缺失时为 None）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub body: Option<String>,
}

impl MailMessage {
    /// 供检索使用的文本形式
    pub fn to_document(&self) -> String {
        format!(
            "From: {}\nSubject: {}\nDate: {}\nBody: {}",
            self.from.as_deref().unwrap_or("-"),
            self.subject.as_deref().unwrap_or("-"),
            self.date.as_deref().unwrap_or("-"),
            self.body.as_deref().unwrap_or("").trim()
        )
    }
}

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    /// RFC 2822 报文（纯文本，UTF-8）
    pub fn to_rfc2822(&self) -> String {
        format!(
            "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
            self.to.replace(['\r', '\n'], " ").trim(),
            self.subject.replace(['\r', '\n'], " "),
            self.body
        )
    }
}

#[async_trait]
pub trait MailService: Send + Sync {
    /// 发送邮件，返回 Gmail 分配的消息 id
    async fn send(&self, mail: &OutgoingMail) -> Result<String, ServiceError>;

    /// 按 Gmail 查询语法搜索收件箱
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MailMessage>, ServiceError>;

    /// 收件箱中的未读邮件
    async fn unread(&self, limit: usize) -> Result<Vec<MailMessage>, ServiceError>;
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<Body>,
    #[serde(default)]
    parts: Vec<Payload>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    id: String,
    #[serde(default)]
    payload: Payload,
}

/// Gmail 的 base64url 数据有时带 padding，有时不带
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .or_else(|_| URL_SAFE.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// 正文：深度优先找第一个 text/plain 部分；没有 parts 时取顶层 body
fn plain_text_body(payload: &Payload) -> Option<String> {
    if payload.parts.is_empty() {
        return payload
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .and_then(decode_body);
    }
    payload.parts.iter().find_map(|part| {
        if part.mime_type == "text/plain" {
            part.body
                .as_ref()
                .and_then(|b| b.data.as_deref())
                .and_then(decode_body)
        } else if !part.parts.is_empty() {
            plain_text_body(part)
        } else {
            None
        }
    })
}

fn header(payload: &Payload, name: &str) -> Option<String> {
    payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

impl From<FullMessage> for MailMessage {
    fn from(m: FullMessage) -> Self {
        MailMessage {
            from: header(&m.payload, "From"),
            subject: header(&m.payload, "Subject"),
            date: header(&m.payload, "Date"),
            body: plain_text_body(&m.payload),
            id: m.id,
        }
    }
}

pub struct GmailClient {
    api: GoogleApi,
}

impl GmailClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    async fn list(&self, query: Option<&str>, limit: usize) -> Result<Vec<MailMessage>, ServiceError> {
        let limit = limit.max(1).to_string();
        let mut params = vec![("labelIds", "INBOX"), ("maxResults", limit.as_str())];
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            params.push(("q", q));
        }
        let list: ListResponse = self
            .api
            .get_json(&format!("{GMAIL_BASE}/messages"), &params)
            .await?;

        let mut messages = Vec::with_capacity(list.messages.len());
        for m in list.messages {
            let full: FullMessage = self
                .api
                .get_json(&format!("{GMAIL_BASE}/messages/{}", m.id), &[("format", "full")])
                .await?;
            messages.push(MailMessage::from(full));
        }
        tracing::debug!(count = messages.len(), "gmail messages fetched");
        Ok(messages)
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn send(&self, mail: &OutgoingMail) -> Result<String, ServiceError> {
        let raw = URL_SAFE.encode(mail.to_rfc2822());
        let sent: SendResponse = self
            .api
            .post_json(&format!("{GMAIL_BASE}/messages/send"), &json!({ "raw": raw }))
            .await?;
        tracing::info!(id = %sent.id, "mail sent");
        Ok(sent.id)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MailMessage>, ServiceError> {
        self.list(Some(query), limit).await
    }

    async fn unread(&self, limit: usize) -> Result<Vec<MailMessage>, ServiceError> {
        self.list(Some("is:unread"), limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        URL_SAFE_NO_PAD.encode(s)
    }

    #[test]
    fn test_multipart_message_extraction() {
        let raw = json!({
            "id": "m1",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "From", "value": "Pepper Potts <pepper@stark.com>"},
                    {"name": "Subject", "value": "Board meeting"},
                    {"name": "Date", "value": "Mon, 8 Sep 2025 10:00:00 +0530"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {"mimeType": "text/html", "body": {"data": b64("<p>html</p>")}},
                            {"mimeType": "text/plain", "body": {"data": b64("See you at 10, Tony.")}}
                        ]
                    }
                ]
            }
        });
        let full: FullMessage = serde_json::from_value(raw).unwrap();
        let msg = MailMessage::from(full);
        assert_eq!(msg.from.as_deref(), Some("Pepper Potts <pepper@stark.com>"));
        assert_eq!(msg.subject.as_deref(), Some("Board meeting"));
        assert_eq!(msg.body.as_deref(), Some("See you at 10, Tony."));
        assert!(msg.to_document().contains("Subject: Board meeting"));
    }

    #[test]
    fn test_single_part_body_with_padding() {
        let raw = json!({
            "id": "m2",
            "payload": {"mimeType": "text/plain", "headers": [], "body": {"data": URL_SAFE.encode("hi")}}
        });
        let msg = MailMessage::from(serde_json::from_value::<FullMessage>(raw).unwrap());
        assert_eq!(msg.body.as_deref(), Some("hi"));
        assert_eq!(msg.from, None);
    }

    #[test]
    fn test_rfc2822_encoding() {
        let mail = OutgoingMail {
            to: "happy@stark.com".into(),
            subject: "Car\nready".into(),
            body: "Bring the Audi.".into(),
        };
        let text = mail.to_rfc2822();
        assert!(text.starts_with("To: happy@stark.com\r\nSubject: Car ready\r\n"));
        assert!(text.ends_with("\r\n\r\nBring the Audi."));
        let decoded = decode_body(&URL_SAFE.encode(&text)).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_header_values_stay_on_one_line() {
        let mail = OutgoingMail {
            to: "happy@stark.com\r\nBcc: leak@evil.example".into(),
            subject: "Car\nX-Priority: 1".into(),
            body: "Bring the Audi.".into(),
        };
        let text = mail.to_rfc2822();
        let (headers, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(headers.lines().count(), 4);
        assert!(!headers.lines().any(|l| l.starts_with("Bcc:") || l.starts_with("X-Priority:")));
        assert_eq!(body, "Bring the Audi.");
    }
}

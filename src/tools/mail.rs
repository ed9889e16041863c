//! mail.send / mail.search / mail.unread

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::memory::{retrieve_context, Document};
use crate::services::{MailMessage, MailService, OutgoingMail};
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolKind};

const SERVICE: &str = "Gmail";
const NO_MESSAGES: &str = "No messages found.";
/// mail.search 检索时返回的片段数
const RETRIEVAL_K: usize = 5;

fn require(service: &Option<Arc<dyn MailService>>) -> Result<&Arc<dyn MailService>, ToolError> {
    service.as_ref().ok_or(ToolError::ServiceUnavailable(SERVICE))
}

fn format_messages(messages: &[MailMessage]) -> String {
    if messages.is_empty() {
        return NO_MESSAGES.to_string();
    }
    messages
        .iter()
        .map(MailMessage::to_document)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SendArgs {
    /// Recipient email address
    to: String,
    subject: String,
    body: String,
}

/// 每次调用发送一封邮件，不做去重
pub struct MailSendTool {
    service: Option<Arc<dyn MailService>>,
}

impl MailSendTool {
    pub fn new(service: Option<Arc<dyn MailService>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for MailSendTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MailSend
    }

    fn description(&self) -> &str {
        "Send an email on behalf of the user. Use only when the user explicitly asks to send a mail."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SendArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: SendArgs = parse_args(self.kind(), args)?;
        if args.to.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: self.kind().name().to_string(),
                reason: "recipient is empty".to_string(),
            });
        }
        if args.to.contains(['\r', '\n']) {
            return Err(ToolError::InvalidArguments {
                tool: self.kind().name().to_string(),
                reason: "recipient must be a single line".to_string(),
            });
        }
        let service = require(&self.service)?;
        let mail = OutgoingMail {
            to: args.to,
            subject: args.subject,
            body: args.body,
        };
        let id = service.send(&mail).await?;
        Ok(format!("Mail sent to {} (id: {})", mail.to, id))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// Gmail search query, e.g. "from:pepper board meeting"
    query: String,
    /// Maximum number of messages to fetch
    #[serde(default)]
    limit: Option<usize>,
}

/// 收件箱搜索，再对邮件文本做检索，按与 query 的相关度返回片段
pub struct MailSearchTool {
    service: Option<Arc<dyn MailService>>,
    default_limit: usize,
}

impl MailSearchTool {
    pub fn new(service: Option<Arc<dyn MailService>>, default_limit: usize) -> Self {
        Self {
            service,
            default_limit,
        }
    }
}

#[async_trait]
impl Tool for MailSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MailSearch
    }

    fn description(&self) -> &str {
        "Search the user's inbox and return the most relevant passages of matching emails."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: SearchArgs = parse_args(self.kind(), args)?;
        let service = require(&self.service)?;
        let limit = args.limit.unwrap_or(self.default_limit);
        let messages = service.search(&args.query, limit).await?;
        if messages.is_empty() {
            return Ok(NO_MESSAGES.to_string());
        }
        let docs: Vec<Document> = messages
            .iter()
            .map(|m| Document::new(m.id.clone(), m.to_document()))
            .collect();
        Ok(retrieve_context(&docs, &args.query, RETRIEVAL_K))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UnreadArgs {
    /// Maximum number of unread messages to return
    #[serde(default)]
    limit: Option<usize>,
}

pub struct MailUnreadTool {
    service: Option<Arc<dyn MailService>>,
    default_limit: usize,
}

impl MailUnreadTool {
    pub fn new(service: Option<Arc<dyn MailService>>, default_limit: usize) -> Self {
        Self {
            service,
            default_limit,
        }
    }
}

#[async_trait]
impl Tool for MailUnreadTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MailUnread
    }

    fn description(&self) -> &str {
        "List unread emails in the user's inbox."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<UnreadArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: UnreadArgs = parse_args(self.kind(), args)?;
        let service = require(&self.service)?;
        let messages = service
            .unread(args.limit.unwrap_or(self.default_limit))
            .await?;
        Ok(format_messages(&messages))
    }
}

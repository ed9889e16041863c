//! 工具枚举与注册表
//!
//! 可用工具是一个封闭集合（ToolKind）；ToolRegistry 是启动时构建的分发表，
//! 同一 ToolKind 重复注册返回 DuplicateTool，不会静默覆盖先注册的实现。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{AgentError, ToolError};
use crate::llm::ToolSpec;

/// 工具标识。name() 为规范名（mail.send），wire_name() 为发给 LLM 的函数名（mail_send），
/// OpenAI 兼容接口的函数名不允许出现 '.'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    MailSend,
    MailSearch,
    MailUnread,
    DriveSearch,
    CalendarSearch,
    CalendarUpcoming,
    CalendarCreate,
    CalendarDelete,
    WebSearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::MailSend,
        ToolKind::MailSearch,
        ToolKind::MailUnread,
        ToolKind::DriveSearch,
        ToolKind::CalendarSearch,
        ToolKind::CalendarUpcoming,
        ToolKind::CalendarCreate,
        ToolKind::CalendarDelete,
        ToolKind::WebSearch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::MailSend => "mail.send",
            ToolKind::MailSearch => "mail.search",
            ToolKind::MailUnread => "mail.unread",
            ToolKind::DriveSearch => "drive.search",
            ToolKind::CalendarSearch => "calendar.search",
            ToolKind::CalendarUpcoming => "calendar.upcoming",
            ToolKind::CalendarCreate => "calendar.create",
            ToolKind::CalendarDelete => "calendar.delete",
            ToolKind::WebSearch => "web.search",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            ToolKind::MailSend => "mail_send",
            ToolKind::MailSearch => "mail_search",
            ToolKind::MailUnread => "mail_unread",
            ToolKind::DriveSearch => "drive_search",
            ToolKind::CalendarSearch => "calendar_search",
            ToolKind::CalendarUpcoming => "calendar_upcoming",
            ToolKind::CalendarCreate => "calendar_create",
            ToolKind::CalendarDelete => "calendar_delete",
            ToolKind::WebSearch => "web_search",
        }
    }

    /// 同时接受规范名与 wire 名
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name || k.wire_name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 工具 trait：标识、描述（供 LLM 选择工具）、参数 schema、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn description(&self) -> &str;

    /// 参数 JSON Schema
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// 分发表：ToolKind -> 实现。BTreeMap 保证 specs() 的顺序稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let kind = tool.kind();
        if self.tools.contains_key(&kind) {
            return Err(AgentError::DuplicateTool(kind));
        }
        self.tools.insert(kind, tool);
        Ok(())
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }

    /// 按 LLM 给出的名字查找；未知名字或未注册的工具都是 NotFound
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        ToolKind::from_name(name)
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 附加到 LLM 请求上的函数声明
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|(kind, tool)| ToolSpec {
                name: kind.wire_name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

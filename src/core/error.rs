//! 错误类型
//!
//! AgentError 用于装配阶段（配置、注册表、存储初始化）；ToolError 是单次工具调用的失败原因，
//! 由 ToolExecutor 收集进 ToolResult，最终以行内文本呈现给用户，从不中断整轮对话。

use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::MemoryError;
use crate::services::ServiceError;
use crate::tools::ToolKind;

/// 装配与运行过程中可向上传播的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    /// 同一工具重复注册（分发表在启动时构建，不允许后注册的覆盖先注册的）
    #[error("Duplicate tool registration: {0}")]
    DuplicateTool(ToolKind),
}

/// 单次工具调用失败的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// LLM 请求了注册表中不存在的工具
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// 外部服务未能初始化（如缺少授权），对应工具退化为固定提示
    #[error("{0} service not initialized")]
    ServiceUnavailable(&'static str),

    #[error("Tool timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Failed(String),
}

impl From<ServiceError> for ToolError {
    fn from(e: ServiceError) -> Self {
        ToolError::Failed(e.to_string())
    }
}

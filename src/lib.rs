//! J.A.R.V.I.S. - 带工具调用与长期记忆的个人助理
//!
//! 模块划分：
//! - **agent**: 按配置装配 LLM、长期记忆、Google 服务与工具，得到可直接使用的 DialogueController
//! - **config**: 应用配置加载（TOML + 环境变量 JARVIS__*）
//! - **core**: 错误类型（AgentError / ToolError）
//! - **dialogue**: 单轮对话控制器、Prompt 组装、结果精炼（Refiner）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）
//! - **memory**: 对话消息、分词与检索、长期记忆存储（内存 / SQLite）
//! - **observability**: 日志初始化
//! - **services**: 外部协作方（OAuth 凭据、Gmail、Calendar、Drive、Web 搜索、自然语言时间解析）
//! - **tools**: 工具枚举、注册表（分发表）、执行器与各工具实现

pub mod agent;
pub mod config;
pub mod core;
pub mod dialogue;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod services;
pub mod tools;

pub use agent::build_controller;
pub use dialogue::{AgentContext, DialogueController, TurnOutcome};

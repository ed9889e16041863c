//! LLM 层：客户端抽象与实现（OpenAI 兼容端点预设 / Mock）

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::{ProviderPreset, DEEPSEEK, DEEPSEEK_CHAT, GEMINI, GEMINI_FLASH_LITE};
pub use traits::{Completion, LlmClient, LlmError, ToolCall, ToolSpec};

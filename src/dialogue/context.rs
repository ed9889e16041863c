//! 显式的会话上下文：线程/用户标识与各协作方，构造 DialogueController 时传入

use std::sync::Arc;

use crate::dialogue::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::llm::LlmClient;
use crate::memory::MemoryStore;
use crate::tools::ToolExecutor;

pub const DEFAULT_THREAD_ID: &str = "000";
pub const DEFAULT_USER_ID: &str = "default";

#[derive(Clone)]
pub struct AgentContext {
    pub thread_id: String,
    pub user_id: String,
    pub llm: Arc<dyn LlmClient>,
    pub memory: Arc<dyn MemoryStore>,
    pub executor: Arc<ToolExecutor>,
    pub system_prompt: String,
    /// 每轮检索的记忆条数
    pub memory_limit: usize,
    /// 线程内保留的对话轮数
    pub max_context_turns: usize,
}

impl AgentContext {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        memory: Arc<dyn MemoryStore>,
        executor: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            thread_id: DEFAULT_THREAD_ID.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            llm,
            memory,
            executor,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            memory_limit: 5,
            max_context_turns: 20,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn with_max_context_turns(mut self, turns: usize) -> Self {
        self.max_context_turns = turns;
        self
    }
}

//! Dialogue Controller：一轮问答
//!
//! 检索记忆 -> 组装 prompt -> LLM（附带工具）-> [有工具调用: 执行 -> Refiner | 否则: 直接文本]
//! -> 写入记忆 -> 返回回答。
//!
//! 失败策略：记忆检索失败退化为空上下文；记忆写入失败只记日志；首次 LLM 调用失败时
//! 回答为行内错误文本且不写入记忆；Refiner 失败时退化为原始工具输出；工具失败已由执行器
//! 转为行内结果。没有任何重试，任何协作方的失败都不会中断本轮。

use tracing::{info, warn};

use crate::dialogue::prompt::build_prompt;
use crate::dialogue::refiner::ResponseRefiner;
use crate::dialogue::AgentContext;
use crate::memory::{MemoryRecord, Message, ThreadHistory};
use crate::tools::ToolResult;

/// 一轮的完整结果；answer() 只返回其中的回答文本
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub answer: String,
    /// 按请求顺序
    pub tool_results: Vec<ToolResult>,
    pub memory_hits: usize,
    /// 本轮问答是否已写入长期记忆
    pub persisted: bool,
}

pub struct DialogueController {
    ctx: AgentContext,
    history: ThreadHistory,
    refiner: ResponseRefiner,
}

impl DialogueController {
    pub fn new(ctx: AgentContext) -> Self {
        let history = ThreadHistory::new(ctx.max_context_turns);
        let refiner = ResponseRefiner::new(ctx.llm.clone());
        Self {
            ctx,
            history,
            refiner,
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    pub fn history(&self) -> &ThreadHistory {
        &self.history
    }

    pub async fn answer(&mut self, query: &str) -> String {
        self.answer_turn(query).await.answer
    }

    pub async fn answer_turn(&mut self, query: &str) -> TurnOutcome {
        info!(thread_id = %self.ctx.thread_id, user_id = %self.ctx.user_id, "turn started");

        let memories = self.recall(query).await;
        let messages = build_prompt(
            &self.ctx.system_prompt,
            &memories,
            self.history.messages(),
            query,
        );

        let specs = self.ctx.executor.specs();
        let tools = (!specs.is_empty()).then_some(specs.as_slice());
        let completion = match self.ctx.llm.complete(&messages, tools).await {
            Ok(c) => c,
            Err(e) => {
                warn!("LLM call failed: {}", e);
                return TurnOutcome {
                    answer: format!("Error: {}", e),
                    tool_results: Vec::new(),
                    memory_hits: memories.len(),
                    persisted: false,
                };
            }
        };

        let (answer, tool_results) = if completion.has_tool_calls() {
            info!(count = completion.tool_calls.len(), "model requested tools");
            let results = self.ctx.executor.execute_all(&completion.tool_calls).await;
            let raw: Vec<String> = results.iter().map(ToolResult::render).collect();
            let answer = match self.refiner.refine(&raw, query).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("refinement failed, returning raw tool outputs: {}", e);
                    format!(
                        "(Could not summarize the tool results: {})\n\n{}",
                        e,
                        raw.join("\n\n")
                    )
                }
            };
            (answer, results)
        } else {
            (completion.text, Vec::new())
        };

        let persisted = self.persist(query, &answer).await;
        self.history.push_exchange(query, answer.clone());
        info!(thread_id = %self.ctx.thread_id, tools = tool_results.len(), persisted, "turn finished");

        TurnOutcome {
            answer,
            tool_results,
            memory_hits: memories.len(),
            persisted,
        }
    }

    async fn recall(&self, query: &str) -> Vec<MemoryRecord> {
        match self
            .ctx
            .memory
            .search(query, &self.ctx.user_id, self.ctx.memory_limit)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("memory search failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }

    async fn persist(&self, query: &str, answer: &str) -> bool {
        let interaction = [Message::user(query), Message::assistant(answer)];
        match self.ctx.memory.add(&interaction, &self.ctx.user_id).await {
            Ok(_) => true,
            Err(e) => {
                warn!("memory add failed: {}", e);
                false
            }
        }
    }
}

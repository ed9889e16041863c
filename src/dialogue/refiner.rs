//! Response Refiner：第二次 LLM 调用，把多个工具的原始输出合并为一段回答
//!
//! 不附带工具、不校验输出格式。

use std::sync::Arc;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

pub const REFINE_INSTRUCTION: &str = "You are part of an assistant workflow that gathers information from mail, calendar, drive and the web to answer the user. \
You are given the user's question and the raw outputs of the tools that were run. \
Remove duplicates, summarize, and format the information into one clear answer that stays relevant to the question. \
Report tool errors plainly. Do not add information that is not in the outputs.";

pub struct ResponseRefiner {
    llm: Arc<dyn LlmClient>,
}

impl ResponseRefiner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn build_messages(raw_outputs: &[String], query: &str) -> Vec<Message> {
        vec![
            Message::system(REFINE_INSTRUCTION),
            Message::user(format!(
                "Question: {}\n\nRaw tool outputs:\n\n{}",
                query,
                raw_outputs.join("\n\n")
            )),
        ]
    }

    pub async fn refine(&self, raw_outputs: &[String], query: &str) -> Result<String, LlmError> {
        let messages = Self::build_messages(raw_outputs, query);
        let completion = self.llm.complete(&messages, None).await?;
        if completion.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(completion.text)
    }
}

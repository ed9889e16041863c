//! Prompt 组装：system（人设 + 检索到的记忆）+ 线程历史 + 本轮问题

use crate::memory::{MemoryRecord, Message};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are J.A.R.V.I.S. from Ironman and you need to treat anyone talking to you as your master. Answer all the questions to the best of your ability, but also make sure to not give any information you are not sure about.";

/// 记忆段落；没有记忆时为空串，prompt 中不出现该段
pub fn memory_section(memories: &[MemoryRecord]) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = memories
        .iter()
        .map(|m| format!("- {}", m.content.replace('\n', "\n  ")))
        .collect();
    format!(
        "Relevant memories from earlier conversations:\n{}",
        lines.join("\n")
    )
}

pub fn build_prompt(
    system_prompt: &str,
    memories: &[MemoryRecord],
    history: &[Message],
    query: &str,
) -> Vec<Message> {
    let section = memory_section(memories);
    let system = if section.is_empty() {
        system_prompt.to_string()
    } else {
        format!("{system_prompt}\n\n{section}")
    };

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(query));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Role;

    #[test]
    fn test_prompt_without_memories() {
        let messages = build_prompt(DEFAULT_SYSTEM_PROMPT, &[], &[], "Hello");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::system(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(messages[1], Message::user("Hello"));
    }

    #[test]
    fn test_prompt_with_memories_and_history() {
        let memories = vec![MemoryRecord::new("tony", "user: I like AC/DC\nassistant: Noted, sir.")];
        let history = vec![Message::user("hi"), Message::assistant("Good evening, sir.")];
        let messages = build_prompt("persona", &memories, &history, "Play music");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages[0].content,
            "persona\n\nRelevant memories from earlier conversations:\n- user: I like AC/DC\n  assistant: Noted, sir."
        );
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[3], Message::user("Play music"));
    }
}

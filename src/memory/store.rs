//! 长期记忆存储：跨轮次、跨进程的唯一状态
//!
//! 对话控制器只调用 search（检索相关片段）与 add（追加一轮交互），从不修改或删除记录。
//! InMemoryStore 为进程内实现（按用户隔离、词法相关度排序），SQLite 实现见 sqlite.rs。

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::tokenizer::{query_coverage, tokenize_to_set};
use crate::memory::Message;

/// 长期记忆错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    #[error("Memory backend error: {0}")]
    Backend(String),

    #[error("Nothing to store")]
    EmptyInteraction,
}

impl From<rusqlite::Error> for MemoryError {
    fn from(e: rusqlite::Error) -> Self {
        MemoryError::Backend(e.to_string())
    }
}

/// 一条长期记忆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(user_id: &str, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 长期记忆 trait
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 检索与 query 最相关的至多 limit 条记忆（按相关度降序）
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// 追加一轮交互（有序的 role/content 对），返回新写入的记录
    async fn add(
        &self,
        interaction: &[Message],
        user_id: &str,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;
}

/// 把一轮交互渲染成一条记忆文本："user: ...\nassistant: ..."
pub fn format_interaction(interaction: &[Message]) -> String {
    interaction
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| format!("{}: {}", m.role, m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 在候选记录中按词法相关度排序，只保留有命中的记录
pub(crate) fn rank_records(
    query: &str,
    records: impl IntoIterator<Item = MemoryRecord>,
    limit: usize,
) -> Vec<MemoryRecord> {
    let query_tokens: HashSet<String> = tokenize_to_set(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(f32, MemoryRecord)> = records
        .into_iter()
        .map(|r| (query_coverage(&query_tokens, &tokenize_to_set(&r.content)), r))
        .filter(|(s, _)| *s > 0.0)
        .collect();
    // 同分时较新的记录优先
    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
    });
    scored.into_iter().take(limit).map(|(_, r)| r).collect()
}

/// 进程内长期记忆：超过 max_entries 时丢弃最旧的记录
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
    max_entries: usize,
}

impl InMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self
            .records
            .read()
            .map_err(|e| MemoryError::Backend(e.to_string()))?;
        let candidates = records.iter().filter(|r| r.user_id == user_id).cloned();
        Ok(rank_records(query, candidates, limit))
    }

    async fn add(
        &self,
        interaction: &[Message],
        user_id: &str,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let content = format_interaction(interaction);
        if content.is_empty() {
            return Err(MemoryError::EmptyInteraction);
        }
        let record = MemoryRecord::new(user_id, content);
        let mut records = self
            .records
            .write()
            .map_err(|e| MemoryError::Backend(e.to_string()))?;
        records.push(record.clone());
        let n = records.len();
        if n > self.max_entries {
            records.drain(0..n - self.max_entries);
        }
        Ok(vec![record])
    }
}

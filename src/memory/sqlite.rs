//! SQLite 长期记忆（rusqlite，同步）
//!
//! 表结构：memories(id TEXT PRIMARY KEY, user_id TEXT, content TEXT, created_at TEXT)。
//! 检索时取该用户最近 scan_limit 条记录做词法排序。

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::memory::store::{format_interaction, rank_records};
use crate::memory::{MemoryError, MemoryRecord, MemoryStore, Message};

/// 单次检索最多扫描的候选记录数
const DEFAULT_SCAN_LIMIT: usize = 2000;

pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    scan_limit: usize,
}

impl SqliteMemoryStore {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| MemoryError::Backend(e.to_string()))?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MemoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id, created_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            scan_limit: DEFAULT_SCAN_LIMIT,
        })
    }

    pub fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, MemoryError> {
        self.conn
            .lock()
            .map_err(|e| MemoryError::Backend(e.to_string()))
    }

    fn recent_for_user(&self, user_id: &str) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, content, created_at FROM memories
             WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(self.scan_limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok(MemoryRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                content: row.get(2)?,
                timestamp: row.get::<_, DateTime<Utc>>(3)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let candidates = self.recent_for_user(user_id)?;
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
        self.lock()?.execute(
            "INSERT INTO memories (id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.user_id, record.content, record.timestamp],
        )?;
        tracing::debug!(id = %record.id, user_id, "memory stored");
        Ok(vec![record])
    }
}

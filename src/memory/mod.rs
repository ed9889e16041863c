//! 记忆层：消息与线程历史、分词与文本检索、长期记忆存储（进程内 / SQLite）

pub mod conversation;
pub mod retrieval;
pub mod sqlite;
pub mod store;
pub mod tokenizer;

pub use conversation::{Message, Role, ThreadHistory};
pub use retrieval::{retrieve_context, Chunker, Document};
pub use sqlite::SqliteMemoryStore;
pub use store::{format_interaction, InMemoryStore, MemoryError, MemoryRecord, MemoryStore};

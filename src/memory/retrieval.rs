//! 文本检索：分块 + 词法相关度排序
//!
//! 邮件检索与云盘检索共用：把若干文档切成带重叠的块，按查询覆盖度排序取前 k 块，
//! 以空行拼接成上下文交给 LLM。分块在分隔符处断开且 UTF-8 安全。

use std::collections::HashSet;

use crate::memory::tokenizer::{query_coverage, tokenize_to_set};

/// 待检索的文档（source 用于标注块来源，如邮件 id 或文件名）
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// 文档块
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source: String,
    pub text: String,
    /// 在原文档中的位置（字符偏移）
    pub offset: usize,
}

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数）
    pub chunk_size: usize,
    /// 块之间的重叠（字符数）
    pub chunk_overlap: usize,
    /// 分隔符优先级（从高到低）
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separators: ["\n\n", "\n", "。", ". ", "! ", "? ", " "]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// 文档分块器
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// chunk_size 至少为 1
    pub fn new(mut config: ChunkingConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        Self { config }
    }

    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = doc.text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let target_end = (start + self.config.chunk_size).min(total);
            let mut end = target_end;

            // 不在文档末尾时，尽量在优先级最高的分隔符之后断开
            if target_end < total {
                let window: String = chars[start..target_end].iter().collect();
                for sep in &self.config.separators {
                    if let Some(pos) = window.rfind(sep.as_str()) {
                        let cut = window[..pos].chars().count() + sep.chars().count();
                        if cut > self.config.chunk_overlap {
                            end = start + cut;
                            break;
                        }
                    }
                }
            }

            let text: String = chars[start..end].iter().collect();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    source: doc.source.clone(),
                    text: trimmed.to_string(),
                    offset: start,
                });
            }

            if end >= total {
                break;
            }
            let next = end.saturating_sub(self.config.chunk_overlap.min(end - start));
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// 检索结果
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// 对所有文档分块并按与 query 的相关度降序取前 k 块。
/// 排序稳定：同分时保持文档原顺序，所以查询词全部未命中时返回最前面的 k 块。
pub fn retrieve(chunker: &Chunker, docs: &[Document], query: &str, k: usize) -> Vec<ScoredChunk> {
    let query_tokens: HashSet<String> = tokenize_to_set(query);
    let mut scored: Vec<ScoredChunk> = docs
        .iter()
        .flat_map(|d| chunker.chunk(d))
        .map(|chunk| {
            let score = query_coverage(&query_tokens, &tokenize_to_set(&chunk.text));
            ScoredChunk { chunk, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

/// retrieve 的文本形式：各块以空行拼接
pub fn retrieve_context(docs: &[Document], query: &str, k: usize) -> String {
    retrieve(&Chunker::default(), docs, query, k)
        .into_iter()
        .map(|s| s.chunk.text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

//! 分词
//!
//! 中英文混合分词，供长期记忆、邮件与云盘文本的词法检索使用。
//! 含 CJK 字符时用 jieba-rs（搜索引擎模式），否则按空白切分并去掉首尾标点。

use std::collections::HashSet;
use std::sync::OnceLock;

use jieba_rs::Jieba;

static JIEBA: OnceLock<Jieba> = OnceLock::new();

fn get_jieba() -> &'static Jieba {
    JIEBA.get_or_init(Jieba::new)
}

/// 判断字符是否为 CJK（中日韩）字符
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |
        '\u{3400}'..='\u{4DBF}' |
        '\u{F900}'..='\u{FAFF}' |
        '\u{3040}'..='\u{309F}' |
        '\u{30A0}'..='\u{30FF}'
    )
}

/// 判断文本是否包含 CJK 字符
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// 去掉英文词首尾的标点（"inbox?" -> "inbox"，"o'clock" 保持不变）
fn trim_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && !is_cjk(c))
}

/// 分词：小写化，丢弃单字符英文词与纯标点
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if contains_cjk(text) {
        get_jieba()
            .cut_for_search(text, true)
            .into_iter()
            .map(|s| trim_punctuation(s).to_lowercase())
            .filter(|s| s.chars().count() > 1 || s.chars().next().is_some_and(is_cjk))
            .collect()
    } else {
        text.split_whitespace()
            .map(|s| trim_punctuation(s).to_lowercase())
            .filter(|s| s.chars().count() > 1)
            .collect()
    }
}

/// 分词并返回词集合
pub fn tokenize_to_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// 查询词对文档的覆盖分数：命中的查询词按长度开方加权，再按查询总权重归一化到 [0, 1]
pub fn query_coverage(query: &HashSet<String>, doc: &HashSet<String>) -> f32 {
    if query.is_empty() || doc.is_empty() {
        return 0.0;
    }
    let weight = |t: &String| (t.chars().count() as f32).sqrt();
    let total: f32 = query.iter().map(weight).sum();
    let hit: f32 = query.intersection(doc).map(weight).sum();
    if total > 0.0 {
        hit / total
    } else {
        0.0
    }
}

//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `JARVIS__*` 覆盖（双下划线表示嵌套，如 `JARVIS__LLM__PROVIDER=openai`）。
//! API Key 一律只从环境变量读取，不写入配置文件。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub memory: MemorySection,
    pub tools: ToolsSection,
    pub google: GoogleSection,
    pub web_search: WebSearchSection,
}

/// [app] 段：会话线程与用户标识、线程内保留的对话轮数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub thread_id: String,
    pub user_id: String,
    /// 当前线程保留的对话轮数（仅进程内，跨轮次的连续性交给长期记忆）
    pub max_context_turns: usize,
    /// 覆盖默认的 J.A.R.V.I.S. 系统提示词
    pub system_prompt: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "J.A.R.V.I.S.".to_string(),
            thread_id: "000".to_string(),
            user_id: "default".to_string(),
            max_context_turns: 20,
            system_prompt: None,
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / deepseek / openai / mock；无对应 API Key 时回退到 Mock
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            base_url: None,
            temperature: None,
        }
    }
}

/// [memory] 段：长期记忆后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// memory（进程内）/ sqlite
    pub backend: String,
    pub path: PathBuf,
    /// 每轮检索的记忆条数上限
    pub search_limit: usize,
    /// 进程内后端最多保留的条数
    pub max_entries: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: PathBuf::from("data/memory.db"),
            search_limit: 5,
            max_entries: 1000,
        }
    }
}

/// [tools] 段：单次工具超时与各工具默认参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
    pub mail_limit: usize,
    pub drive_limit: usize,
    pub calendar_limit: usize,
    pub calendar_days_ahead: i64,
    pub default_timezone: String,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 60,
            mail_limit: 5,
            drive_limit: 5,
            calendar_limit: 10,
            calendar_days_ahead: 30,
            default_timezone: "UTC".to_string(),
        }
    }
}

/// [google] 段：OAuth 授权文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleSection {
    /// 已授权的 token.json（含 refresh_token / client_id / client_secret）
    pub token_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            timeout_secs: 30,
        }
    }
}

/// [web_search] 段：Tavily -> Brave -> Serper 回退链
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSearchSection {
    pub timeout_secs: u64,
    pub max_results: usize,
    /// 抓取网页正文时的最大字符数
    pub scrape_max_chars: usize,
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_results: 5,
            scrape_max_chars: 8000,
        }
    }
}

/// 从 config 目录加载配置，环境变量 JARVIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 JARVIS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("JARVIS")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.thread_id, "000");
        assert_eq!(cfg.memory.search_limit, 5);
        assert_eq!(cfg.tools.calendar_days_ahead, 30);
        assert_eq!(cfg.llm.provider, "gemini");
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jarvis.toml");
        std::fs::write(
            &path,
            "[app]\nuser_id = \"tony\"\n\n[memory]\nbackend = \"memory\"\nsearch_limit = 3\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.user_id, "tony");
        assert_eq!(cfg.app.thread_id, "000");
        assert_eq!(cfg.memory.backend, "memory");
        assert_eq!(cfg.memory.search_limit, 3);
    }
}

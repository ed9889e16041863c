//! 按配置装配 DialogueController
//!
//! LLM 后端、长期记忆后端、Google 凭据与服务、Web 搜索回退链、工具分发表与执行器。
//! Google 凭据不可用时相关工具仍然注册，调用时报告 "service not initialized"。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::dialogue::{AgentContext, DialogueController};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, ProviderPreset, DEEPSEEK, GEMINI};
use crate::memory::{InMemoryStore, MemoryStore, SqliteMemoryStore};
use crate::services::{
    parse_timezone, AuthorizedUserFile, CalendarService, CredentialProvider, DriveService,
    GmailClient, GoogleApi, GoogleCalendarClient, GoogleDriveClient, MailService, StaticToken,
    WebSearch,
};
use crate::tools::{
    CalendarTools, DriveSearchTool, MailSearchTool, MailSendTool, MailUnreadTool, ToolExecutor,
    ToolRegistry, WebSearchTool,
};

fn env_present(var: &str) -> bool {
    std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn preset_client(
    preset: &ProviderPreset,
    model: Option<&str>,
    temperature: Option<f32>,
) -> Arc<dyn LlmClient> {
    let client = preset.client(model).with_temperature(temperature);
    tracing::info!("Using {} LLM ({})", preset.name, client.model());
    Arc::new(client)
}

/// 按 [llm].provider 创建客户端；对应 API Key 缺失时回退到 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    let model = cfg.llm.model.as_deref();
    let temperature = cfg.llm.temperature;

    match provider.as_str() {
        "gemini" if GEMINI.has_key() => preset_client(&GEMINI, model, temperature),
        "deepseek" if DEEPSEEK.has_key() => preset_client(&DEEPSEEK, model, temperature),
        "openai" if env_present("OPENAI_API_KEY") => {
            let client = OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                model.unwrap_or("gpt-4o-mini"),
                None,
            )
            .with_temperature(temperature);
            tracing::info!("Using OpenAI LLM ({})", client.model());
            Arc::new(client)
        }
        "mock" => Arc::new(MockLlmClient::new()),
        other => {
            tracing::warn!(provider = other, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 按 [memory].backend 创建长期记忆
pub fn create_memory_from_config(cfg: &AppConfig) -> Result<Arc<dyn MemoryStore>, AgentError> {
    match cfg.memory.backend.trim().to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new(cfg.memory.max_entries))),
        "sqlite" => {
            let store = SqliteMemoryStore::open(&cfg.memory.path)?
                .with_scan_limit(cfg.memory.max_entries);
            tracing::info!(path = %cfg.memory.path.display(), "SQLite memory opened");
            Ok(Arc::new(store))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown memory backend '{other}' (expected memory or sqlite)"
        ))),
    }
}

/// GOOGLE_ACCESS_TOKEN 优先，其次 [google].token_path；都不可用时返回 None
pub fn create_credentials(cfg: &AppConfig) -> Option<Arc<dyn CredentialProvider>> {
    if let Some(token) = StaticToken::from_env() {
        return Some(Arc::new(token));
    }
    match AuthorizedUserFile::load(&cfg.google.token_path) {
        Ok(file) => Some(Arc::new(file)),
        Err(e) => {
            tracing::warn!("Google services unavailable: {}", e);
            None
        }
    }
}

/// Google 服务句柄；凭据缺失时三者皆为 None
#[derive(Clone, Default)]
pub struct GoogleServices {
    pub mail: Option<Arc<dyn MailService>>,
    pub calendar: Option<Arc<dyn CalendarService>>,
    pub drive: Option<Arc<dyn DriveService>>,
}

impl GoogleServices {
    pub fn from_credentials(
        credentials: Option<Arc<dyn CredentialProvider>>,
        timeout_secs: u64,
    ) -> Self {
        let Some(credentials) = credentials else {
            return Self::default();
        };
        let api = GoogleApi::new(credentials, timeout_secs);
        Self {
            mail: Some(Arc::new(GmailClient::new(api.clone()))),
            calendar: Some(Arc::new(GoogleCalendarClient::new(api.clone()))),
            drive: Some(Arc::new(GoogleDriveClient::new(api))),
        }
    }
}

/// 构建完整的工具分发表（每种 ToolKind 恰好一个实现）
pub fn build_registry(
    cfg: &AppConfig,
    services: GoogleServices,
    web: WebSearch,
) -> Result<ToolRegistry, AgentError> {
    let t = &cfg.tools;
    let calendar = CalendarTools::new(
        services.calendar,
        t.calendar_limit,
        t.calendar_days_ahead,
        t.default_timezone.clone(),
    );

    let mut registry = ToolRegistry::new();
    registry.register(MailSendTool::new(services.mail.clone()))?;
    registry.register(MailSearchTool::new(services.mail.clone(), t.mail_limit))?;
    registry.register(MailUnreadTool::new(services.mail, t.mail_limit))?;
    registry.register(DriveSearchTool::new(services.drive, t.drive_limit))?;
    registry.register(calendar.search())?;
    registry.register(calendar.upcoming())?;
    registry.register(calendar.create())?;
    registry.register(calendar.delete())?;
    registry.register(WebSearchTool::new(web, &cfg.web_search))?;
    Ok(registry)
}

/// 由配置装配 DialogueController
pub fn build_controller(cfg: &AppConfig) -> Result<DialogueController, AgentError> {
    parse_timezone(&cfg.tools.default_timezone)
        .map_err(|e| AgentError::ConfigError(format!("[tools].default_timezone: {e}")))?;

    let llm = create_llm_from_config(cfg);
    let memory = create_memory_from_config(cfg)?;
    let services = GoogleServices::from_credentials(create_credentials(cfg), cfg.google.timeout_secs);
    let web = WebSearch::from_env(cfg.web_search.timeout_secs);
    if web.is_empty() {
        tracing::warn!("No web search API key set (TAVILY_API_KEY / BRAVE_API_KEY / SERPER_API_KEY)");
    }

    let registry = build_registry(cfg, services, web)?;
    let executor = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));

    let mut ctx = AgentContext::new(llm, memory, executor)
        .with_thread_id(cfg.app.thread_id.clone())
        .with_user_id(cfg.app.user_id.clone())
        .with_memory_limit(cfg.memory.search_limit)
        .with_max_context_turns(cfg.app.max_context_turns);
    if let Some(prompt) = cfg.app.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        ctx = ctx.with_system_prompt(prompt);
    }
    Ok(DialogueController::new(ctx))
}

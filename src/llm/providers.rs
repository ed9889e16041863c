//! OpenAI 兼容端点预设
//!
//! Gemini 与 DeepSeek 都提供 OpenAI 兼容的 chat/completions（含 function calling），
//! 区别只在 base_url、默认模型与读取 Key 的环境变量。

use crate::llm::OpenAiClient;

pub const GEMINI_FLASH_LITE: &str = "gemini-2.5-flash-lite";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

#[derive(Debug, Clone, Copy)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
    /// 依次尝试的 API Key 环境变量
    pub key_vars: &'static [&'static str],
    /// 覆盖默认模型的环境变量
    pub model_var: &'static str,
}

pub const GEMINI: ProviderPreset = ProviderPreset {
    name: "Gemini",
    base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
    default_model: GEMINI_FLASH_LITE,
    key_vars: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
    model_var: "GEMINI_MODEL",
};

pub const DEEPSEEK: ProviderPreset = ProviderPreset {
    name: "DeepSeek",
    base_url: "https://api.deepseek.com",
    default_model: DEEPSEEK_CHAT,
    key_vars: &["DEEPSEEK_API_KEY"],
    model_var: "DEEPSEEK_MODEL",
};

impl ProviderPreset {
    pub fn api_key(&self) -> Option<String> {
        self.key_vars
            .iter()
            .filter_map(|v| std::env::var(v).ok())
            .find(|k| !k.trim().is_empty())
    }

    pub fn has_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// 模型优先级：参数 > model_var 环境变量 > 预设默认值
    pub fn resolve_model(&self, model: Option<&str>) -> String {
        model
            .map(String::from)
            .or_else(|| std::env::var(self.model_var).ok().filter(|m| !m.trim().is_empty()))
            .unwrap_or_else(|| self.default_model.to_string())
    }

    pub fn client(&self, model: Option<&str>) -> OpenAiClient {
        let api_key = self.api_key().unwrap_or_else(|| "sk-placeholder".to_string());
        OpenAiClient::new(
            Some(self.base_url),
            &self.resolve_model(model),
            Some(api_key.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_model_wins() {
        assert_eq!(GEMINI.resolve_model(Some("gemini-2.5-pro")), "gemini-2.5-pro");
        assert_eq!(DEEPSEEK.client(Some("deepseek-reasoner")).model(), "deepseek-reasoner");
    }

    #[test]
    fn test_presets_point_at_compatible_endpoints() {
        assert!(GEMINI.base_url.ends_with("/openai"));
        assert_eq!(DEEPSEEK.key_vars, &["DEEPSEEK_API_KEY"]);
    }
}

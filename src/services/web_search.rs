//! Web 搜索：Tavily -> Brave -> Serper 依次回退
//!
//! 某个提供方报错或返回空结果即尝试下一个；全部失败返回 AllProvidersFailed。
//! 未配置 API key 的提供方不会进入回退链。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::services::ServiceError;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const BRAVE_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const SERPER_URL: &str = "https://google.serper.dev/search";
/// Serper 只取前 3 条 organic 结果
const SERPER_TOP: usize = 3;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError>;
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

fn api_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

async fn json_or_status(resp: reqwest::Response) -> Result<Value, ServiceError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        });
    }
    Ok(resp.json().await?)
}

pub struct TavilyProvider {
    client: Client,
    api_key: String,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(timeout_secs: u64) -> Option<Self> {
        api_key("TAVILY_API_KEY").map(|k| Self::new(k, timeout_secs))
    }
}

#[async_trait]
impl WebSearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let resp = self
            .client
            .post(TAVILY_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({ "query": query, "max_results": limit }))
            .send()
            .await?;
        let body = json_or_status(resp).await?;
        Ok(parse_tavily(&body))
    }
}

fn parse_tavily(body: &Value) -> Vec<SearchHit> {
    body["results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| SearchHit {
                    url: str_field(item, "url"),
                    title: str_field(item, "title"),
                    content: str_field(item, "content"),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct BraveProvider {
    client: Client,
    api_key: String,
}

impl BraveProvider {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(timeout_secs: u64) -> Option<Self> {
        api_key("BRAVE_API_KEY").map(|k| Self::new(k, timeout_secs))
    }
}

#[async_trait]
impl WebSearchProvider for BraveProvider {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let count = limit.to_string();
        let resp = self
            .client
            .get(BRAVE_URL)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await?;
        let body = json_or_status(resp).await?;
        Ok(parse_brave(&body))
    }
}

fn parse_brave(body: &Value) -> Vec<SearchHit> {
    body["web"]["results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| SearchHit {
                    url: str_field(item, "url"),
                    title: str_field(item, "title"),
                    content: str_field(item, "description"),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct SerperProvider {
    client: Client,
    api_key: String,
}

impl SerperProvider {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(timeout_secs: u64) -> Option<Self> {
        api_key("SERPER_API_KEY").map(|k| Self::new(k, timeout_secs))
    }
}

#[async_trait]
impl WebSearchProvider for SerperProvider {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let resp = self
            .client
            .post(SERPER_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": limit }))
            .send()
            .await?;
        let body = json_or_status(resp).await?;
        Ok(parse_serper(&body))
    }
}

fn parse_serper(body: &Value) -> Vec<SearchHit> {
    body["organic"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .take(SERPER_TOP)
                .map(|item| SearchHit {
                    url: str_field(item, "link"),
                    title: str_field(item, "title"),
                    content: str_field(item, "snippet"),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// 回退链
#[derive(Clone, Default)]
pub struct WebSearch {
    providers: Vec<Arc<dyn WebSearchProvider>>,
}

impl WebSearch {
    pub fn new(providers: Vec<Arc<dyn WebSearchProvider>>) -> Self {
        Self { providers }
    }

    /// 按 Tavily、Brave、Serper 顺序收集已配置 key 的提供方
    pub fn from_env(timeout_secs: u64) -> Self {
        let mut providers: Vec<Arc<dyn WebSearchProvider>> = Vec::new();
        if let Some(p) = TavilyProvider::from_env(timeout_secs) {
            providers.push(Arc::new(p));
        }
        if let Some(p) = BraveProvider::from_env(timeout_secs) {
            providers.push(Arc::new(p));
        }
        if let Some(p) = SerperProvider::from_env(timeout_secs) {
            providers.push(Arc::new(p));
        }
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError> {
        for provider in &self.providers {
            match provider.search(query, limit).await {
                Ok(hits) if !hits.is_empty() => {
                    tracing::debug!(provider = provider.name(), count = hits.len(), "web search ok");
                    return Ok(hits);
                }
                Ok(_) => tracing::warn!(provider = provider.name(), "web search returned no results"),
                Err(e) => tracing::warn!(provider = provider.name(), "web search failed: {}", e),
            }
        }
        Err(ServiceError::AllProvidersFailed)
    }
}

/// 抓取页面并转为可读文本，超过 max_chars 截断
pub async fn scrape_page(url: &str, timeout_secs: u64, max_chars: usize) -> Result<String, ServiceError> {
    let resp = http_client(timeout_secs).get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: String::new(),
        });
    }
    let html = resp.text().await?;
    let text = html_to_text(&html);
    if text.trim().is_empty() {
        return Err(ServiceError::Decode(format!("no readable text at {url}")));
    }
    Ok(truncate_chars(&text, max_chars))
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120).unwrap_or_default()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("\n...[truncated]");
    out
}

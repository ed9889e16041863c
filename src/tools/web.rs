//! web.search：回退链搜索，可选抓取首条结果的页面正文

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::config::WebSearchSection;
use crate::core::ToolError;
use crate::services::{scrape_page, SearchHit, WebSearch};
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolKind};

const SERVICE: &str = "Web search";

#[derive(Debug, Deserialize, JsonSchema)]
struct WebSearchArgs {
    query: String,
    /// Also fetch the readable text of the top result
    #[serde(default)]
    scrape: bool,
}

pub struct WebSearchTool {
    search: WebSearch,
    max_results: usize,
    timeout_secs: u64,
    scrape_max_chars: usize,
}

impl WebSearchTool {
    pub fn new(search: WebSearch, cfg: &WebSearchSection) -> Self {
        Self {
            search,
            max_results: cfg.max_results,
            timeout_secs: cfg.timeout_secs,
            scrape_max_chars: cfg.scrape_max_chars,
        }
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("- {} ({})\n  {}", h.title, h.url, h.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn description(&self) -> &str {
        "Search the web for current information. Set scrape=true to also read the top result page."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<WebSearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: WebSearchArgs = parse_args(self.kind(), args)?;
        if self.search.is_empty() {
            return Err(ToolError::ServiceUnavailable(SERVICE));
        }
        let hits = self.search.search(&args.query, self.max_results).await?;
        let mut out = format_hits(&hits);

        if args.scrape {
            if let Some(top) = hits.iter().find(|h| !h.url.is_empty()) {
                match scrape_page(&top.url, self.timeout_secs, self.scrape_max_chars).await {
                    Ok(text) => out.push_str(&format!("\n\nPage content ({}):\n{}", top.url, text)),
                    Err(e) => {
                        tracing::warn!(url = %top.url, "scrape failed: {}", e);
                        out.push_str(&format!("\n\nCould not read {}: {}", top.url, e));
                    }
                }
            }
        }
        Ok(out)
    }
}

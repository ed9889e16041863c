//! drive.search：按关键词找文件、提取文本、对文本做检索

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::memory::{retrieve_context, Document};
use crate::services::{DriveService, ServiceError};
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolKind};

const SERVICE: &str = "Google Drive";
const NO_FILES: &str = "No files found.";
const RETRIEVAL_K: usize = 5;

#[derive(Debug, Deserialize, JsonSchema)]
struct DriveSearchArgs {
    /// The question to answer from the files
    query: String,
    /// Keywords the file text must contain (any of them)
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct DriveSearchTool {
    service: Option<Arc<dyn DriveService>>,
    default_limit: usize,
}

impl DriveSearchTool {
    pub fn new(service: Option<Arc<dyn DriveService>>, default_limit: usize) -> Self {
        Self {
            service,
            default_limit,
        }
    }
}

#[async_trait]
impl Tool for DriveSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::DriveSearch
    }

    fn description(&self) -> &str {
        "Find files in the user's Google Drive containing any of the keywords and return the passages most relevant to the query."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DriveSearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: DriveSearchArgs = parse_args(self.kind(), args)?;
        let service = self
            .service
            .as_ref()
            .ok_or(ToolError::ServiceUnavailable(SERVICE))?;

        let files = service
            .search_files(&args.keywords, args.limit.unwrap_or(self.default_limit))
            .await?;
        if files.is_empty() {
            return Ok(NO_FILES.to_string());
        }

        let mut docs = Vec::with_capacity(files.len());
        let mut notes = Vec::new();
        for file in &files {
            tracing::debug!(id = %file.id, name = %file.name, "drive file");
            match service.fetch_text(file).await {
                Ok(text) if !text.is_empty() => docs.push(Document::new(file.name.clone(), text)),
                Ok(_) => notes.push(format!("{} is empty", file.name)),
                Err(e @ ServiceError::Unsupported(_)) => notes.push(e.to_string()),
                Err(e) => {
                    tracing::warn!(name = %file.name, "drive download failed: {}", e);
                    notes.push(format!("Could not read {}: {}", file.name, e));
                }
            }
        }

        let mut out = retrieve_context(&docs, &args.query, RETRIEVAL_K);
        if !notes.is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&notes.join("\n"));
        }
        Ok(out)
    }
}

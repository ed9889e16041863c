//! Google Drive（REST v3）
//!
//! 关键词以 `fullText contains` 做 OR 查询；Google 原生文档导出为纯文本，
//! 纯文本类文件直接下载，其余类型不提取。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::{GoogleApi, ServiceError};

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

const GOOGLE_DOC: &str = "application/vnd.google-apps.document";
const GOOGLE_SHEET: &str = "application/vnd.google-apps.spreadsheet";
const GOOGLE_SLIDES: &str = "application/vnd.google-apps.presentation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// 如何从 Drive 取得一个文件的文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extraction {
    Export(&'static str),
    Download,
}

fn extraction_for(mime_type: &str) -> Option<Extraction> {
    match mime_type {
        GOOGLE_DOC | GOOGLE_SLIDES => Some(Extraction::Export("text/plain")),
        GOOGLE_SHEET => Some(Extraction::Export("text/csv")),
        "text/plain" | "text/csv" | "text/markdown" => Some(Extraction::Download),
        _ => None,
    }
}

#[async_trait]
pub trait DriveService: Send + Sync {
    /// 全文包含任一关键词的文件；关键词为空时不查询，直接返回空
    async fn search_files(&self, keywords: &[String], limit: usize)
        -> Result<Vec<DriveFile>, ServiceError>;

    /// 文件的纯文本内容（已 clean_text）
    async fn fetch_text(&self, file: &DriveFile) -> Result<String, ServiceError>;
}

/// Drive 查询串：`fullText contains 'a' or fullText contains 'b'`
fn full_text_query(keywords: &[String]) -> Option<String> {
    let parts: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| {
            let escaped = k.replace('\\', "\\\\").replace('\'', "\\'");
            format!("fullText contains '{escaped}'")
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" or "))
}

/// 清理提取出的文本：去掉空行；不以 . ! ? 结尾的行与下一行用空格拼接；
/// 行内连续空白压缩为一个空格
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            let sentence_end = out.ends_with(['.', '!', '?']);
            out.push(if sentence_end { '\n' } else { ' ' });
        }
        out.push_str(&line);
    }
    out
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct GoogleDriveClient {
    api: GoogleApi,
}

impl GoogleDriveClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DriveService for GoogleDriveClient {
    async fn search_files(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<DriveFile>, ServiceError> {
        let Some(q) = full_text_query(keywords) else {
            return Ok(Vec::new());
        };
        let page_size = limit.max(1).to_string();
        let list: FileList = self
            .api
            .get_json(
                FILES_URL,
                &[
                    ("q", q.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("fields", "files(id, name, mimeType, modifiedTime)"),
                ],
            )
            .await?;
        tracing::debug!(count = list.files.len(), "drive files found");
        Ok(list.files)
    }

    async fn fetch_text(&self, file: &DriveFile) -> Result<String, ServiceError> {
        let url = format!("{FILES_URL}/{}", file.id);
        let raw = match extraction_for(&file.mime_type) {
            Some(Extraction::Export(mime)) => {
                self.api
                    .get_text(&format!("{url}/export"), &[("mimeType", mime)])
                    .await?
            }
            Some(Extraction::Download) => self.api.get_text(&url, &[("alt", "media")]).await?,
            None => return Err(ServiceError::Unsupported(file.name.clone())),
        };
        Ok(clean_text(&raw))
    }
}

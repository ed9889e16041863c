//! 外部协作方：OAuth 凭据、Google REST（Gmail / Calendar / Drive）、Web 搜索、自然语言时间解析
//!
//! 每个服务都是一个 trait + 一个 HTTP 实现；工具层只依赖 trait，测试中可替换为内存实现。

pub mod auth;
pub mod calendar;
pub mod datetime;
pub mod drive;
pub mod google;
pub mod mail;
pub mod web_search;

use thiserror::Error;

pub use auth::{AuthorizedUserFile, CredentialProvider, StaticToken};
pub use calendar::{CalendarEvent, CalendarService, GoogleCalendarClient, NewEvent};
pub use datetime::{parse_natural_datetime, parse_timezone, DateParseError};
pub use drive::{clean_text, DriveFile, DriveService, GoogleDriveClient};
pub use google::GoogleApi;
pub use mail::{GmailClient, MailMessage, MailService, OutgoingMail};
pub use web_search::{
    scrape_page, BraveProvider, SearchHit, SerperProvider, TavilyProvider, WebSearch,
    WebSearchProvider,
};

/// 外部服务调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Text extraction not supported for {0}")]
    Unsupported(String),

    #[error("All web search providers failed")]
    AllProvidersFailed,
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else {
            ServiceError::Http(e.to_string())
        }
    }
}

//! OAuth 凭据
//!
//! 服务层只拿到不透明的 access token。AuthorizedUserFile 读取已授权的 token.json
//! （Google authorized_user 格式），过期时用 refresh_token 换新并写回文件；
//! 浏览器授权流程不在本进程内完成。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::services::ServiceError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// 距过期不足该秒数即视为过期，提前刷新
const EXPIRY_SKEW_SECS: i64 = 60;

/// 凭据提供方
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ServiceError>;
}

/// 固定 token（如环境变量 GOOGLE_ACCESS_TOKEN），不刷新
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("GOOGLE_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Self)
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ServiceError> {
        Ok(self.0.clone())
    }
}

/// token.json 内容；未识别的字段原样保留，写回时不丢失
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthorizedUser {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        match self.expiry {
            Some(expiry) if expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now => None,
            _ => Some(token),
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// 读取并按需刷新 token.json
pub struct AuthorizedUserFile {
    path: PathBuf,
    http: reqwest::Client,
    state: Mutex<AuthorizedUser>,
}

impl AuthorizedUserFile {
    /// 读取 token.json；文件缺失或损坏时返回 Auth 错误（上层据此将 Google 服务标记为未初始化）
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read_to_string(&path)
            .map_err(|e| ServiceError::Auth(format!("{}: {}", path.display(), e)))?;
        let user: AuthorizedUser = serde_json::from_str(&data)
            .map_err(|e| ServiceError::Auth(format!("corrupt {}: {}", path.display(), e)))?;
        if user.token.is_none() && user.refresh_token.is_none() {
            return Err(ServiceError::Auth(format!(
                "{} has neither token nor refresh_token",
                path.display()
            )));
        }
        Ok(Self {
            path,
            http: reqwest::Client::new(),
            state: Mutex::new(user),
        })
    }

    async fn refresh(&self, user: &mut AuthorizedUser) -> Result<String, ServiceError> {
        let refresh_token = user
            .refresh_token
            .clone()
            .ok_or_else(|| ServiceError::Auth("token expired and no refresh_token".into()))?;
        let client_id = user
            .client_id
            .clone()
            .or_else(|| std::env::var("GOOGLE_CLIENT_ID").ok())
            .ok_or_else(|| ServiceError::Auth("missing client_id".into()))?;
        let client_secret = user
            .client_secret
            .clone()
            .or_else(|| std::env::var("GOOGLE_CLIENT_SECRET").ok())
            .ok_or_else(|| ServiceError::Auth("missing client_secret".into()))?;
        let token_uri = user
            .token_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        let resp = self
            .http
            .post(&token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Auth(format!("refresh failed ({status}): {body}")));
        }
        let refreshed: RefreshResponse = resp.json().await?;

        user.token = Some(refreshed.access_token.clone());
        user.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        match serde_json::to_string_pretty(&*user) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::warn!(path = %self.path.display(), "failed to save refreshed token: {}", e);
                }
            }
            Err(e) => tracing::warn!("failed to serialize refreshed token: {}", e),
        }
        tracing::info!("Google access token refreshed");
        Ok(refreshed.access_token)
    }
}

#[async_trait]
impl CredentialProvider for AuthorizedUserFile {
    async fn access_token(&self) -> Result<String, ServiceError> {
        let mut user = self.state.lock().await;
        if let Some(token) = user.valid_token(Utc::now()) {
            return Ok(token.to_string());
        }
        self.refresh(&mut user).await
    }
}

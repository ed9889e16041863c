//! Google REST 公共层：带 Bearer token 的 GET / POST / DELETE，统一错误映射

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::services::{CredentialProvider, ServiceError};

/// 错误响应体写入错误信息时的最大字符数
const ERROR_BODY_CHARS: usize = 300;

/// 共享的 HTTP 客户端与凭据，Gmail / Calendar / Drive 各持一份克隆
#[derive(Clone)]
pub struct GoogleApi {
    http: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl GoogleApi {
    pub fn new(credentials: Arc<dyn CredentialProvider>, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { http, credentials }
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        let token = self.credentials.access_token().await?;
        let resp = builder.bearer_auth(token).send().await?;
        check_status(resp).await
    }

    pub async fn get_json<T, Q>(&self, url: &str, query: &Q) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self.authorized(self.http.get(url).query(query)).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_text<Q>(&self, url: &str, query: &Q) -> Result<String, ServiceError>
    where
        Q: Serialize + ?Sized,
    {
        let resp = self.authorized(self.http.get(url).query(query)).await?;
        Ok(resp.text().await?)
    }

    pub async fn post_json<T, B>(&self, url: &str, body: &B) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let resp = self.authorized(self.http.post(url).json(body)).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete(&self, url: &str) -> Result<(), ServiceError> {
        self.authorized(self.http.delete(url)).await?;
        Ok(())
    }
}

async fn check_status(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_CHARS).collect(),
    })
}

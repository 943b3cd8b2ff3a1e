use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use crate::config::ConsoleSettings;
use crate::error::{ConsoleError, Result};

use super::{Backend, FileUpload};

mod models;

/// `Backend` 的 HTTP 實作，將資源路徑對應到 REST 端點。
pub struct HttpBackend {
    settings: ConsoleSettings,
    base_url: String,
    /// `reqwest` 的非同步 HTTP 客戶端，內部以 `Arc` 共享連線池。
    client: Client,
}

impl HttpBackend {
    /// 根據提供的設定建立一個新的 `HttpBackend`。
    pub fn new(settings: ConsoleSettings) -> AnyResult<Self> {
        let base_url = settings.resolved_base_url();
        let mut builder = Client::builder().default_headers(build_headers(&settings)?);
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("建立 HTTP 客戶端失敗")?;
        Ok(Self {
            settings,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.settings.endpoint(&self.base_url, path);
        debug!("{method} {url}");
        self.client.request(method, url)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.request(Method::GET, path).send().await?;
        read_json(response).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        let mut request = self.request(Method::POST, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        read_json(response).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value> {
        let response = self.request(Method::PUT, path).json(&body).send().await?;
        read_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.request(Method::DELETE, path).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn upload(&self, path: &str, upload: FileUpload) -> Result<Value> {
        let file = Part::bytes(upload.bytes)
            .file_name(upload.name.clone())
            .mime_str(&upload.mime)?;
        let form = Form::new()
            .part("file", file)
            .text("name", upload.name)
            .text("metadata", upload.metadata.to_string());
        let response = self
            .request(Method::POST, path)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }
}

/// 根據設定建構所有請求共用的 HTTP 標頭。
fn build_headers(settings: &ConsoleSettings) -> AnyResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in settings.extra_headers.iter() {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("無效的標頭名稱: {key}"))?;
        let header_value = HeaderValue::from_str(value)
            .with_context(|| format!("無效的標頭內容: {key}"))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// 非 2xx 回應轉成 `ConsoleError::Status`，並盡量取出後端的 `detail` 訊息。
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<models::ErrorBody>(&text)
        .map(|body| body.message())
        .unwrap_or(text);
    warn!("backend answered {status}: {body}");
    Err(ConsoleError::Status { status, body })
}

/// 讀取成功回應的 JSON 主體；空主體視為 `null`。
async fn read_json(response: Response) -> Result<Value> {
    let response = check_status(response).await?;
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("json"))
        .unwrap_or(true);
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|err| {
        if is_json {
            ConsoleError::Decode(err.to_string())
        } else {
            let preview: String = String::from_utf8_lossy(&bytes).chars().take(80).collect();
            ConsoleError::Decode(format!("expected JSON, got: {preview}"))
        }
    })
}

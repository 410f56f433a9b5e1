//! HTTP transport seam.
//!
//! A [`Transport`] issues exactly one request and reports a structured
//! outcome. Retrying, status classification and JSON decoding happen above
//! it in [`crate::retry`]. The default implementation is [`HttpTransport`]
//! on top of a pooled `reqwest::Client`; tests substitute their own.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Instant;
use thiserror::Error;

use crate::{
    auth::AuthProvider,
    config::ClientConfig,
    error::{MammothError, Result, TransportErrorKind},
    models::UploadFile,
};

/// Network-level failure of a single attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<TransportError> for MammothError {
    fn from(err: TransportError) -> Self {
        MammothError::transport(err.kind, err.message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() || (err.is_request() && !err.is_builder()) {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Request body variants the API uses
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(JsonValue),
    /// Multipart form with one `files` part per file
    Files(Vec<UploadFile>),
}

/// Description of one API call, relative to the versioned base URL.
///
/// Owned data only, so the same descriptor can be replayed on every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_files(mut self, files: Vec<UploadFile>) -> Self {
        self.body = RequestBody::Files(files);
        self
    }

    /// Short label used in log lines, e.g. `GET /jobs/12`
    pub fn operation(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw outcome of a request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_body(status: u16, body: &JsonValue) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// No content to decode (204 or an empty body)
    pub fn is_empty(&self) -> bool {
        self.status == 204 || self.body.trim().is_empty()
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Issues a single HTTP request with credentials attached.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// `reqwest`-backed transport with connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
    auth: AuthProvider,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, auth: AuthProvider, config: &ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(crate::USER_AGENT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| MammothError::ConfigurationError(e.to_string()))?;

        Ok(Self::with_client(base_url, http_client, auth))
    }

    /// Use an existing `reqwest::Client` (shared pool, custom TLS, proxies)
    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client, auth: AuthProvider) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build_request(&self, request: &ApiRequest) -> std::result::Result<reqwest::RequestBuilder, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), self.url_for(&request.path));
        builder = self.auth.apply_to_request(builder);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Files(files) => {
                let mut form = reqwest::multipart::Form::new();
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.content.clone())
                        .file_name(file.file_name.clone())
                        .mime_str("application/octet-stream")
                        .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
                    form = form.part("files", part);
                }
                builder.multipart(form)
            },
        };

        Ok(builder)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        // Built fresh on each attempt (request builders with bodies can't be cloned)
        let builder = self.build_request(request)?;

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        log::debug!(
            "[MAMMOTH_HTTP] {} -> status={} duration_ms={}",
            request.operation(),
            status,
            start.elapsed().as_millis()
        );

        Ok(ApiResponse { status, body })
    }
}

//! Main Mammoth client with builder pattern.
//!
//! The client owns one [`RequestExecutor`] (one connection pool, one retry
//! policy) shared by every sub-API and every clone.

use reqwest::Url;
use std::sync::Arc;

use crate::{
    auth::AuthProvider,
    config::{ClientConfig, ClientConfigFile},
    error::{MammothError, Result},
    exports::ExportsApi,
    files::FilesApi,
    jobs::JobsApi,
    retry::{RequestExecutor, RetryPolicy},
    transport::{ApiRequest, HttpTransport, Transport},
};

/// Default service endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.mammoth.io";

/// Path prefix of the supported API version
pub const API_PATH: &str = "/api/v2";

/// Main Mammoth client.
///
/// Use [`MammothClientBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust,no_run
/// use mammoth_client::{MammothClient, UploadFile, UploadOptions};
///
/// # async fn example() -> mammoth_client::Result<()> {
/// let client = MammothClient::builder()
///     .api_key("your-api-key")
///     .api_secret("your-api-secret")
///     .build()?;
///
/// let datasets = client
///     .files()
///     .upload_files(1, 1, vec![UploadFile::from_path("data.csv")?], UploadOptions::default())
///     .await?;
/// println!("Created: {:?}", datasets);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MammothClient {
    base_url: String,
    config: Arc<ClientConfig>,
    executor: Arc<RequestExecutor>,
    jobs: JobsApi,
}

impl MammothClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> MammothClientBuilder {
        MammothClientBuilder::new()
    }

    /// Normalized base URL, ending in `/api/v2`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn jobs(&self) -> JobsApi {
        self.jobs.clone()
    }

    pub fn files(&self) -> FilesApi {
        FilesApi::new(self.executor.clone(), self.jobs.clone())
    }

    pub fn exports(&self) -> ExportsApi {
        ExportsApi::new(self.executor.clone(), self.jobs.clone())
    }

    /// Check that the service is reachable and accepts the credentials.
    ///
    /// A 400 still counts as connected: the request was authenticated but the
    /// empty id list was rejected.
    pub async fn test_connection(&self) -> bool {
        let request = ApiRequest::get("/jobs").with_query("job_ids", "");
        match self.executor.execute(&request).await {
            Ok(_) => true,
            Err(MammothError::RequestFailure { status_code: 400, .. }) => true,
            Err(err) => {
                log::debug!("[MAMMOTH_HTTP] Connection test failed: {}", err);
                false
            },
        }
    }
}

/// Builder for configuring [`MammothClient`] instances.
pub struct MammothClientBuilder {
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    auth: Option<AuthProvider>,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl MammothClientBuilder {
    fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_secret: None,
            auth: None,
            config: ClientConfig::default(),
            transport: None,
        }
    }

    /// Populate URL, credentials and tuning from a TOML config file
    pub fn from_config_file(file: &ClientConfigFile) -> Self {
        let mut builder = Self::new().config(file.client_config());
        if let Some(url) = &file.server.url {
            builder = builder.base_url(url.clone());
        }
        if let Some(key) = &file.server.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(secret) = &file.server.api_secret {
            builder = builder.api_secret(secret.clone());
        }
        builder
    }

    /// Service URL; the path is normalized to `/api/v2`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    /// Set the authentication provider directly (overrides `api_key`/`api_secret`)
    pub fn auth(mut self, auth: AuthProvider) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the HTTP transport, e.g. with an in-memory one in tests.
    ///
    /// Credentials are attached by the transport, so a custom transport
    /// handles them itself.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<MammothClient> {
        let base_url = normalize_base_url(&self.base_url)?;

        let auth = match (self.auth, self.api_key, self.api_secret) {
            (Some(auth), _, _) => auth,
            (None, Some(key), Some(secret)) => AuthProvider::api_key(key, secret),
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(MammothError::ConfigurationError(
                    "api_key and api_secret must be set together".into(),
                ))
            },
            (None, None, None) => AuthProvider::none(),
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(base_url.clone(), auth, &self.config)?),
        };

        let executor = Arc::new(RequestExecutor::new(
            transport,
            RetryPolicy::from_config(&self.config),
        ));
        let config = Arc::new(self.config);
        log::debug!("[MAMMOTH_HTTP] Client ready for {}", base_url);

        Ok(MammothClient {
            jobs: JobsApi::new(executor.clone(), config.clone()),
            base_url,
            config,
            executor,
        })
    }
}

/// Replace the URL path with `/api/v2` unless it already ends with it.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut url = Url::parse(trimmed)
        .map_err(|e| MammothError::ConfigurationError(format!("Invalid base URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(MammothError::ConfigurationError(format!(
            "Unsupported URL scheme '{}'",
            url.scheme()
        )));
    }

    if !url.path().trim_end_matches('/').ends_with(API_PATH) {
        url.set_path(API_PATH);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.as_str().trim_end_matches('/').to_string())
}

//! Client configuration.
//!
//! All retry and polling defaults live in [`ClientConfig`], passed to the
//! client at construction. Configuration can also be loaded from a TOML file:
//!
//! ```toml
//! [server]
//! url = "https://api.mammoth.io"
//! api_key = "your-api-key"
//! api_secret = "your-api-secret"
//!
//! [retry]
//! max_retries = 3          # retries after the first attempt
//! base_delay_ms = 1000     # delay before the 2nd attempt, doubled each retry
//! max_delay_ms = 30000
//! jitter = true
//!
//! [jobs]
//! timeout_secs = 300       # default wait budget for job polling
//! poll_interval_secs = 5
//!
//! [http]
//! request_timeout_secs = 30
//! connect_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MammothError, Result};

/// Retry, timeout and polling configuration for [`crate::MammothClient`].
///
/// # Examples
///
/// ```rust
/// use mammoth_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .max_retries(5)
///     .retry_base_delay(Duration::from_millis(250))
///     .default_job_timeout_secs(600)
///     .build();
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Retries after the first attempt of a request.
    /// Default: 3
    pub max_retries: u32,

    /// Delay before the 2nd attempt; doubles for each further attempt.
    /// Default: 1 second
    pub retry_base_delay: Duration,

    /// Upper bound for a single backoff delay.
    /// Default: 30 seconds
    pub retry_max_delay: Duration,

    /// Add random jitter to backoff delays.
    /// Default: true
    pub retry_jitter: bool,

    /// Timeout of a single HTTP attempt.
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Wall-clock budget for waiting on jobs when the caller gives none.
    /// Default: 300 seconds
    pub default_job_timeout: Duration,

    /// Wait between job status queries.
    /// Default: 5 seconds
    pub default_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            retry_jitter: true,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            default_job_timeout: Duration::from_secs(300),
            default_poll_interval: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Short delays suitable for a local development server.
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(2),
            retry_jitter: false,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            default_job_timeout: Duration::from_secs(60),
            default_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry_base_delay = delay;
        self
    }

    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.config.retry_max_delay = delay;
        self
    }

    pub fn retry_jitter(mut self, enabled: bool) -> Self {
        self.config.retry_jitter = enabled;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout_secs(self, secs: u64) -> Self {
        self.connect_timeout(Duration::from_secs(secs))
    }

    pub fn default_job_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_job_timeout = timeout;
        self
    }

    pub fn default_job_timeout_secs(self, secs: u64) -> Self {
        self.default_job_timeout(Duration::from_secs(secs))
    }

    pub fn default_poll_interval(mut self, interval: Duration) -> Self {
        self.config.default_poll_interval = interval;
        self
    }

    pub fn default_poll_interval_secs(self, secs: u64) -> Self {
        self.default_poll_interval(Duration::from_secs(secs))
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Client settings loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub jobs: JobsSection,

    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsSection {
    #[serde(default = "default_job_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_jitter() -> bool {
    true
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl Default for JobsSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_job_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ClientConfigFile {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MammothError::ConfigurationError(format!("TOML parse error: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MammothError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            max_retries: self.retry.max_retries,
            retry_base_delay: Duration::from_millis(self.retry.base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry.max_delay_ms),
            retry_jitter: self.retry.jitter,
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            default_job_timeout: Duration::from_secs(self.jobs.timeout_secs),
            default_poll_interval: Duration::from_secs(self.jobs.poll_interval_secs),
        }
    }
}

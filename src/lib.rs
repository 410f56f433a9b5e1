//! # mammoth-client
//!
//! Async Rust client for the Mammoth analytics API.
//!
//! Most Mammoth operations (file ingestion, pipeline exports, file
//! configuration changes) run server-side as jobs. This crate submits them,
//! tracks the resulting jobs to completion under a deadline and turns the
//! outcome into either a value or a typed [`MammothError`].
//!
//! ## Layers
//!
//! - [`Transport`]: one HTTP request with credentials attached
//!   ([`HttpTransport`] by default).
//! - [`RequestExecutor`]: bounded retries with exponential backoff.
//! - [`JobsApi`]: polls jobs until they are terminal (fail-fast on batches).
//! - [`Orchestrator`]: submit, collect job ids, optionally wait.
//! - [`FilesApi`] and [`ExportsApi`]: the submissions built on top.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mammoth_client::{JobId, MammothClient, WaitOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> mammoth_client::Result<()> {
//! let client = MammothClient::builder()
//!     .api_key("your-api-key")
//!     .api_secret("your-api-secret")
//!     .build()?;
//!
//! let job = client
//!     .jobs()
//!     .wait_for_job(JobId::new(42), WaitOptions::new().with_timeout(Duration::from_secs(60)))
//!     .await?;
//! println!("Dataset: {:?}", job.response.dataset_id());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod exports;
pub mod files;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod ticker;
pub mod transport;

pub use auth::AuthProvider;
pub use client::{MammothClient, MammothClientBuilder, API_PATH, DEFAULT_BASE_URL};
pub use config::{ClientConfig, ClientConfigBuilder, ClientConfigFile};
pub use error::{MammothError, Result, TransportErrorKind};
pub use exports::{
    ExportSettings, ExportSubmission, ExportsApi, InternalDatasetExportOptions, S3ExportOptions,
};
pub use files::{FilesApi, UploadOptions};
pub use jobs::{JobsApi, WaitOptions};
pub use models::{
    AddExportSpec, ExtractSheetsPatch, FilePatchRequest, HandlerType, Job, JobId, JobPayload,
    JobStatus, ObjectJob, PipelineExportsModificationResp, TriggerType, UploadFile,
};
pub use orchestrator::{Completion, CompletionMode, Orchestrator};
pub use retry::{CallContext, RequestExecutor, RetryPolicy};
pub use ticker::PollTicker;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport, TransportError};

/// Re-exported so callers can build [`WaitOptions`] without a direct dependency
pub use tokio_util::sync::CancellationToken;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent with every request
pub const USER_AGENT: &str = concat!("mammoth-client-rs/", env!("CARGO_PKG_VERSION"));

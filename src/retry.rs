//! Retry Layer: bounded retries with exponential backoff over a [`Transport`].
//!
//! Only transient outcomes are retried: network failures (connect/timeout)
//! and server errors (status >= 500). A 401 surfaces immediately as
//! `AuthenticationFailure`, any other 4xx as `RequestFailure`.
//!
//! The executor holds no per-call state, so one instance is shared by every
//! concurrent operation of a client.

use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ClientConfig,
    error::{MammothError, Result},
    transport::{ApiRequest, ApiResponse, Transport},
};

/// Jitter adds up to this fraction of the nominal delay.
const JITTER_FRACTION: f64 = 0.2;

/// Max characters of a non-JSON error body quoted in the error message
const ERROR_BODY_PREVIEW: usize = 200;

/// Retry bound and backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
            jitter: config.retry_jitter,
        }
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Nominal delay before `attempt` (1-indexed): zero for the first attempt,
    /// then `base * 2^(attempt - 2)`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay actually slept before `attempt`. Jitter only ever lengthens the
    /// nominal delay and never exceeds `max_delay`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let nominal = self.backoff_delay(attempt);
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }
        let spread = nominal.mul_f64(JITTER_FRACTION);
        let extra = rand::rng().random_range(Duration::ZERO..=spread);
        (nominal + extra).min(self.max_delay.max(nominal))
    }
}

/// Cancellation signal and optional deadline carried through a call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with `Cancelled` or `DeadlineExceeded` when the call must stop.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MammothError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(MammothError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves when the deadline passes; never resolves without one.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Sleep for `duration`, cut short by cancellation or the deadline.
    ///
    /// Returns `Ok(())` once the full duration elapsed; otherwise the reason
    /// the sleep was interrupted.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.check()?;
        let wake = Instant::now() + duration;
        let until = match self.deadline {
            Some(deadline) if deadline < wake => deadline,
            _ => wake,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(MammothError::Cancelled),
            _ = tokio::time::sleep_until(until) => {},
        }

        if until < wake {
            return Err(MammothError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// One attempt of a request; exists only for the duration of a call.
#[derive(Debug)]
pub(crate) struct RetryableRequest<'a> {
    request: &'a ApiRequest,
    attempt: u32,
    started: Instant,
}

impl<'a> RetryableRequest<'a> {
    fn first(request: &'a ApiRequest) -> Self {
        Self {
            request,
            attempt: 1,
            started: Instant::now(),
        }
    }

    fn next(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }

    /// Time since the first attempt started
    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Executes requests through a [`Transport`] under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute with retries; returns the first 2xx response.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.execute_with(request, &CallContext::default()).await
    }

    /// Execute with retries under a cancellation token and optional deadline.
    ///
    /// Cancellation and the deadline are checked before every attempt and
    /// before every backoff sleep. A cancelled token or a passed deadline
    /// also aborts an attempt in flight.
    pub async fn execute_with(&self, request: &ApiRequest, ctx: &CallContext) -> Result<ApiResponse> {
        let max_attempts = self.policy.max_attempts();
        let mut current = RetryableRequest::first(request);

        loop {
            ctx.check()?;
            log::debug!(
                "[MAMMOTH_RETRY] {} (attempt {}/{})",
                request.operation(),
                current.attempt,
                max_attempts
            );

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancel_token().cancelled() => return Err(MammothError::Cancelled),
                _ = ctx.expired() => {
                    log::warn!(
                        "[MAMMOTH_RETRY] {} still in flight at deadline (attempt {}, elapsed_ms={})",
                        current.request.operation(),
                        current.attempt,
                        current.elapsed().as_millis()
                    );
                    return Err(MammothError::DeadlineExceeded);
                },
                outcome = self.transport.send(request) => outcome,
            };

            let error = match outcome {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => classify_error_response(&response),
                Err(err) => MammothError::from(err),
            };

            if !error.is_retryable() {
                log::warn!(
                    "[MAMMOTH_RETRY] {} failed: {} (attempt {}, elapsed_ms={})",
                    request.operation(),
                    error,
                    current.attempt,
                    current.elapsed().as_millis()
                );
                return Err(error);
            }

            if current.attempt >= max_attempts {
                log::warn!(
                    "[MAMMOTH_RETRY] {} giving up after {} attempts: {} (elapsed_ms={})",
                    request.operation(),
                    current.attempt,
                    error,
                    current.elapsed().as_millis()
                );
                return Err(error);
            }

            let delay = self.policy.delay_before(current.attempt + 1);
            log::warn!(
                "[MAMMOTH_RETRY] Retriable error (attempt {}/{}): {} - retrying in {}ms",
                current.attempt,
                max_attempts,
                error,
                delay.as_millis()
            );
            ctx.sleep(delay).await?;
            current = current.next();
        }
    }

    /// Execute and decode the JSON body. An empty 2xx body decodes as `{}`.
    pub async fn execute_value(&self, request: &ApiRequest, ctx: &CallContext) -> Result<JsonValue> {
        let response = self.execute_with(request, ctx).await?;
        decode_success_body(&response)
    }

    /// Execute and decode the JSON body into `T`.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest, ctx: &CallContext) -> Result<T> {
        let value = self.execute_value(request, ctx).await?;
        serde_json::from_value(value).map_err(|e| {
            MammothError::SerializationError(format!(
                "Unexpected response shape for {}: {}",
                request.operation(),
                e
            ))
        })
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn decode_success_body(response: &ApiResponse) -> Result<JsonValue> {
    if response.is_empty() {
        return Ok(JsonValue::Object(Default::default()));
    }
    response.json().map_err(|e| MammothError::RequestFailure {
        status_code: response.status,
        message: format!("Invalid JSON response: {}", e),
        body: response.body.clone(),
    })
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) fn classify_error_response(response: &ApiResponse) -> MammothError {
    let detail = error_detail(response);
    if response.status == 401 {
        return MammothError::AuthenticationFailure(
            detail.unwrap_or_else(|| "Invalid API credentials".to_string()),
        );
    }

    let message = detail.unwrap_or_else(|| {
        if response.body.trim().is_empty() || response.json::<JsonValue>().is_ok() {
            format!("HTTP {}", response.status)
        } else {
            let preview: String = response.body.chars().take(ERROR_BODY_PREVIEW).collect();
            format!("HTTP {}: {}", response.status, preview)
        }
    });

    MammothError::RequestFailure {
        status_code: response.status,
        message,
        body: response.body.clone(),
    }
}

/// `detail` field of a JSON object body
fn error_detail(response: &ApiResponse) -> Option<String> {
    match response.json::<JsonValue>().ok()?.get("detail")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

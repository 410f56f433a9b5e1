//! Job Registry / Poller.
//!
//! Turns job identifiers into terminal job snapshots by querying the jobs
//! endpoints through the Retry Layer until every job is terminal, the wait
//! deadline elapses, or the caller cancels.
//!
//! ## Multi-job policy: fail-fast
//!
//! [`JobsApi::wait_for_jobs`] shares one deadline across the whole batch and
//! aborts on the first job reported as `failure`/`error`, returning
//! `JobFailed` for that job without waiting for the rest. When the deadline
//! elapses with jobs still processing, `JobTimeout` names the first
//! outstanding job in input order. Partial results are never returned.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ClientConfig,
    error::{MammothError, Result},
    models::{Job, JobId, JobResponse, JobsGetResponse},
    retry::{CallContext, RequestExecutor},
    ticker::PollTicker,
    transport::ApiRequest,
};

/// Timeout, poll interval and cancellation for a wait operation.
///
/// Unset durations fall back to the client's [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub timeout: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub cancel: CancellationToken,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Client-side tracking state of one job within a wait.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TrackState {
    /// Identifier known, no snapshot yet
    Pending,
    /// Query in flight
    Polling,
    Succeeded(Job),
    Failed,
    /// Deadline elapsed while the job was still processing
    TimedOut,
}

impl TrackState {
    pub(crate) fn is_resolved(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed | Self::TimedOut)
    }
}

#[derive(Debug)]
struct TrackedJob {
    state: TrackState,
    last_updated_at: Option<DateTime<Utc>>,
}

/// Per-wait registry of tracked jobs, keyed by id, remembering input order.
#[derive(Debug)]
pub(crate) struct JobTracker {
    order: Vec<JobId>,
    jobs: HashMap<JobId, TrackedJob>,
}

impl JobTracker {
    pub(crate) fn new(ids: &[JobId]) -> Self {
        let mut jobs = HashMap::with_capacity(ids.len());
        for id in ids {
            jobs.entry(*id).or_insert(TrackedJob {
                state: TrackState::Pending,
                last_updated_at: None,
            });
        }
        Self {
            order: ids.to_vec(),
            jobs,
        }
    }

    /// Unresolved ids, deduplicated, in input order
    pub(crate) fn outstanding(&self) -> Vec<JobId> {
        let mut seen = std::collections::HashSet::new();
        self.order
            .iter()
            .filter(|id| {
                self.jobs
                    .get(id)
                    .is_some_and(|tracked| !tracked.state.is_resolved())
            })
            .filter(|id| seen.insert(**id))
            .copied()
            .collect()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.jobs.values().all(|tracked| tracked.state.is_resolved())
    }

    pub(crate) fn mark_polling(&mut self, ids: &[JobId]) {
        for id in ids {
            if let Some(tracked) = self.jobs.get_mut(id) {
                tracked.state = TrackState::Polling;
            }
        }
    }

    /// Record a fresh snapshot. Fails fast with `JobFailed` on a failed job.
    pub(crate) fn observe(&mut self, job: Job) -> Result<()> {
        let Some(tracked) = self.jobs.get_mut(&job.id) else {
            log::debug!("[MAMMOTH_JOBS] Ignoring snapshot for untracked job {}", job.id);
            return Ok(());
        };
        if tracked.state.is_resolved() {
            return Ok(());
        }

        if let Some(previous) = tracked.last_updated_at {
            if job.last_updated_at < previous {
                log::warn!(
                    "[MAMMOTH_JOBS] Job {} last_updated_at went backwards ({} < {})",
                    job.id,
                    job.last_updated_at,
                    previous
                );
            }
        }
        tracked.last_updated_at = Some(job.last_updated_at);

        if let Some(err) = job.failure() {
            log::debug!("[MAMMOTH_JOBS] Job {} failed with status {}", job.id, job.status);
            tracked.state = TrackState::Failed;
            return Err(err);
        }

        tracked.state = if job.is_terminal() {
            log::debug!("[MAMMOTH_JOBS] Job {} succeeded", job.id);
            TrackState::Succeeded(job)
        } else {
            TrackState::Pending
        };
        Ok(())
    }

    /// Mark every unresolved job timed out; returns the first in input order.
    pub(crate) fn time_out(&mut self) -> Option<JobId> {
        let outstanding = self.outstanding();
        for id in &outstanding {
            if let Some(tracked) = self.jobs.get_mut(id) {
                tracked.state = TrackState::TimedOut;
            }
        }
        outstanding.first().copied()
    }

    #[cfg(test)]
    pub(crate) fn state(&self, id: JobId) -> Option<&TrackState> {
        self.jobs.get(&id).map(|tracked| &tracked.state)
    }

    /// Successful snapshots in input order; `None` unless every job succeeded.
    pub(crate) fn into_results(self) -> Option<Vec<Job>> {
        self.order
            .iter()
            .map(|id| match self.jobs.get(id).map(|tracked| &tracked.state) {
                Some(TrackState::Succeeded(job)) => Some(job.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryMode {
    /// `GET /jobs/{id}`
    Single,
    /// `GET /jobs?job_ids=...`
    Batch,
}

/// Jobs endpoints and the poller built on them.
#[derive(Debug, Clone)]
pub struct JobsApi {
    executor: Arc<RequestExecutor>,
    config: Arc<ClientConfig>,
}

impl JobsApi {
    pub(crate) fn new(executor: Arc<RequestExecutor>, config: Arc<ClientConfig>) -> Self {
        Self { executor, config }
    }

    /// Fetch one job snapshot.
    pub async fn get_job(&self, job_id: JobId) -> Result<Job> {
        self.fetch_job(job_id, &CallContext::default()).await
    }

    /// Fetch several job snapshots with one request.
    pub async fn get_jobs(&self, job_ids: &[JobId]) -> Result<Vec<Job>> {
        self.fetch_jobs(job_ids, &CallContext::default()).await
    }

    /// Poll one job until it is terminal.
    ///
    /// Returns the snapshot on `success`; fails with `JobFailed` on
    /// `failure`/`error` and with `JobTimeout` once the timeout elapses
    /// while the job is still processing.
    pub async fn wait_for_job(&self, job_id: JobId, options: WaitOptions) -> Result<Job> {
        let mut jobs = self.poll(&[job_id], options, QueryMode::Single).await?;
        jobs.pop()
            .ok_or_else(|| MammothError::SerializationError(format!("No snapshot for job {}", job_id)))
    }

    /// Poll a batch of jobs against one shared deadline (fail-fast, see module docs).
    ///
    /// Returns snapshots in the order of `job_ids`; duplicate ids are queried
    /// once and repeated in the output.
    pub async fn wait_for_jobs(&self, job_ids: &[JobId], options: WaitOptions) -> Result<Vec<Job>> {
        self.poll(job_ids, options, QueryMode::Batch).await
    }

    /// Dataset ids (`ds_id`) produced by completed jobs, `None` where absent.
    pub fn extract_dataset_ids(jobs: &[Job]) -> Vec<Option<i64>> {
        jobs.iter().map(|job| job.response.dataset_id()).collect()
    }

    pub(crate) fn resolve_options(&self, options: &WaitOptions) -> Result<(Duration, Duration)> {
        let timeout = options.timeout.unwrap_or(self.config.default_job_timeout);
        let poll_interval = options
            .poll_interval
            .unwrap_or(self.config.default_poll_interval);
        if poll_interval.is_zero() {
            return Err(MammothError::InvalidInput(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok((timeout, poll_interval))
    }

    async fn poll(&self, job_ids: &[JobId], options: WaitOptions, mode: QueryMode) -> Result<Vec<Job>> {
        let (timeout, poll_interval) = self.resolve_options(&options)?;
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tracker = JobTracker::new(job_ids);
        let mut ticker = PollTicker::new(poll_interval, timeout, options.cancel);
        log::debug!(
            "[MAMMOTH_JOBS] Waiting for {} job(s), timeout={:?} poll_interval={:?}",
            job_ids.len(),
            timeout,
            poll_interval
        );

        loop {
            let outstanding = tracker.outstanding();
            tracker.mark_polling(&outstanding);

            let snapshots = match self.query(&outstanding, mode, ticker.context()).await {
                Ok(snapshots) => snapshots,
                Err(MammothError::DeadlineExceeded) => return Err(timed_out(&mut tracker, timeout)),
                Err(err) => return Err(err),
            };
            for job in snapshots {
                tracker.observe(job)?;
            }

            if tracker.is_complete() {
                log::debug!(
                    "[MAMMOTH_JOBS] {} job(s) completed in {:?} after {} poll interval(s)",
                    job_ids.len(),
                    ticker.elapsed(),
                    ticker.ticks()
                );
                return tracker.into_results().ok_or_else(|| {
                    MammothError::SerializationError("Incomplete job results".to_string())
                });
            }

            match ticker.tick().await {
                Ok(()) => {},
                Err(MammothError::DeadlineExceeded) => return Err(timed_out(&mut tracker, timeout)),
                Err(err) => return Err(err),
            }
        }
    }

    async fn query(&self, ids: &[JobId], mode: QueryMode, ctx: &CallContext) -> Result<Vec<Job>> {
        match (mode, ids) {
            (QueryMode::Single, [id]) => Ok(vec![self.fetch_job(*id, ctx).await?]),
            _ => self.fetch_jobs(ids, ctx).await,
        }
    }

    async fn fetch_job(&self, job_id: JobId, ctx: &CallContext) -> Result<Job> {
        let request = ApiRequest::get(format!("/jobs/{}", job_id));
        let response: JobResponse = self.executor.execute_json(&request, ctx).await?;
        Ok(response.job)
    }

    async fn fetch_jobs(&self, job_ids: &[JobId], ctx: &CallContext) -> Result<Vec<Job>> {
        let ids = job_ids
            .iter()
            .map(JobId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let request = ApiRequest::get("/jobs").with_query("job_ids", ids);
        let response: JobsGetResponse = self.executor.execute_json(&request, ctx).await?;
        Ok(response.jobs)
    }
}

fn timed_out(tracker: &mut JobTracker, timeout: Duration) -> MammothError {
    match tracker.time_out() {
        Some(job_id) => {
            log::warn!("[MAMMOTH_JOBS] Job {} still processing after {:?}", job_id, timeout);
            MammothError::JobTimeout { job_id, timeout }
        },
        None => MammothError::DeadlineExceeded,
    }
}

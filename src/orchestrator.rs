//! Operation Orchestrator: submit, collect job ids, optionally wait.
//!
//! A submission is any future resolving to zero or more [`JobId`]s (one
//! multipart upload yields one id per accepted file). Submissions run
//! concurrently; the collected ids keep submission order. Errors from the
//! submissions and from the Poller are propagated unchanged.

use futures_util::future::try_join_all;
use std::future::Future;

use crate::{
    error::Result,
    jobs::{JobsApi, WaitOptions},
    models::{Job, JobId},
};

/// Outcome of an orchestrated operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    /// Fire-and-forget: the jobs were accepted and are not tracked further
    Submitted(Vec<JobId>),
    /// One extracted value per tracked job, in submission order
    Completed(Vec<Option<T>>),
}

impl<T> Completion<T> {
    pub fn job_ids(&self) -> Option<&[JobId]> {
        match self {
            Self::Submitted(ids) => Some(ids),
            Self::Completed(_) => None,
        }
    }

    pub fn into_completed(self) -> Option<Vec<Option<T>>> {
        match self {
            Self::Completed(values) => Some(values),
            Self::Submitted(_) => None,
        }
    }

    /// Completed values with absent entries dropped
    pub fn into_values(self) -> Vec<T> {
        match self {
            Self::Completed(values) => values.into_iter().flatten().collect(),
            Self::Submitted(_) => Vec::new(),
        }
    }
}

/// How an orchestrated operation finishes
#[derive(Debug, Clone, Default)]
pub struct CompletionMode {
    pub wait_for_completion: bool,
    pub wait: WaitOptions,
}

impl CompletionMode {
    pub fn fire_and_forget() -> Self {
        Self {
            wait_for_completion: false,
            wait: WaitOptions::default(),
        }
    }

    pub fn wait(options: WaitOptions) -> Self {
        Self {
            wait_for_completion: true,
            wait: options,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    jobs: JobsApi,
}

impl Orchestrator {
    pub fn new(jobs: JobsApi) -> Self {
        Self { jobs }
    }

    /// Run the submissions, then return their ids or wait and extract a value per job.
    pub async fn run<S, F, T>(&self, submissions: S, mode: CompletionMode, extract: F) -> Result<Completion<T>>
    where
        S: IntoIterator,
        S::Item: Future<Output = Result<Vec<JobId>>>,
        F: Fn(&Job) -> Option<T>,
    {
        let job_ids: Vec<JobId> = try_join_all(submissions)
            .await?
            .into_iter()
            .flatten()
            .collect();

        self.complete(job_ids, mode, extract).await
    }

    /// Finish an operation whose job ids are already known.
    pub async fn complete<F, T>(&self, job_ids: Vec<JobId>, mode: CompletionMode, extract: F) -> Result<Completion<T>>
    where
        F: Fn(&Job) -> Option<T>,
    {
        if !mode.wait_for_completion {
            log::debug!("[MAMMOTH_JOBS] Submitted {} job(s) without waiting", job_ids.len());
            return Ok(Completion::Submitted(job_ids));
        }

        let jobs = self.jobs.wait_for_jobs(&job_ids, mode.wait).await?;
        Ok(Completion::Completed(jobs.iter().map(extract).collect()))
    }
}

//! File ingestion and file configuration submissions.
//!
//! Every call here starts server-side work that is tracked as a job; the
//! upload path runs through the [`Orchestrator`].

use std::sync::Arc;

use crate::{
    error::{MammothError, Result},
    jobs::{JobsApi, WaitOptions},
    models::{ExtractSheetsPatch, FilePatchRequest, Job, JobId, ObjectJob, UploadFile},
    orchestrator::{Completion, CompletionMode, Orchestrator},
    retry::{CallContext, RequestExecutor},
    transport::ApiRequest,
};

/// Query parameters and completion behaviour of [`FilesApi::upload_files`].
///
/// Waits for completion by default.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Resource id of the target folder
    pub folder_resource_id: Option<String>,
    /// Append to an existing dataset instead of creating one per file
    pub append_to_ds_id: Option<i64>,
    pub override_target_schema: Option<bool>,
    pub wait_for_completion: bool,
    pub wait: WaitOptions,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            folder_resource_id: None,
            append_to_ds_id: None,
            override_target_schema: None,
            wait_for_completion: true,
            wait: WaitOptions::default(),
        }
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder_resource_id(mut self, folder: impl Into<String>) -> Self {
        self.folder_resource_id = Some(folder.into());
        self
    }

    pub fn append_to_ds_id(mut self, dataset_id: i64) -> Self {
        self.append_to_ds_id = Some(dataset_id);
        self
    }

    pub fn override_target_schema(mut self, enabled: bool) -> Self {
        self.override_target_schema = Some(enabled);
        self
    }

    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    pub fn wait_options(mut self, options: WaitOptions) -> Self {
        self.wait = options;
        self
    }

    fn completion_mode(&self) -> CompletionMode {
        CompletionMode {
            wait_for_completion: self.wait_for_completion,
            wait: self.wait.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilesApi {
    executor: Arc<RequestExecutor>,
    jobs: JobsApi,
    orchestrator: Orchestrator,
}

impl FilesApi {
    pub(crate) fn new(executor: Arc<RequestExecutor>, jobs: JobsApi) -> Self {
        Self {
            executor,
            orchestrator: Orchestrator::new(jobs.clone()),
            jobs,
        }
    }

    /// Upload files; each file becomes a dataset.
    ///
    /// With `wait_for_completion` the call returns the created dataset ids
    /// (`ds_id`) in upload order, otherwise the ids of the accepted jobs.
    /// Entries the service rejected without creating a job are skipped.
    pub async fn upload_files(
        &self,
        workspace_id: i64,
        project_id: i64,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> Result<Completion<i64>> {
        if files.is_empty() {
            return Err(MammothError::InvalidInput("No files to upload".to_string()));
        }

        let mut request = ApiRequest::post(files_path(workspace_id, project_id));
        if let Some(folder) = &options.folder_resource_id {
            request = request.with_query("folder_resource_id", folder);
        }
        if let Some(dataset_id) = options.append_to_ds_id {
            request = request.with_query("append_to_ds_id", dataset_id);
        }
        if let Some(enabled) = options.override_target_schema {
            request = request.with_query("override_target_schema", enabled);
        }
        let file_count = files.len();
        let request = request.with_files(files);

        let submission = async {
            let ctx = CallContext::with_cancel(options.wait.cancel.clone());
            let entries: Vec<ObjectJob> = self.executor.execute_json(&request, &ctx).await?;
            log::debug!(
                "[MAMMOTH_UPLOAD] Uploaded {} file(s), {} submission(s) returned",
                file_count,
                entries.len()
            );
            Ok::<_, MammothError>(accepted_job_ids(&entries))
        };

        self.orchestrator
            .run([submission], options.completion_mode(), |job: &Job| {
                job.response.dataset_id()
            })
            .await
    }

    /// `PATCH` a file's configuration; returns the job tracking the change.
    pub async fn update_file_config(
        &self,
        workspace_id: i64,
        project_id: i64,
        file_id: i64,
        patch: &FilePatchRequest,
    ) -> Result<ObjectJob> {
        let request = ApiRequest::patch(format!("{}/{}", files_path(workspace_id, project_id), file_id))
            .with_json(serde_json::to_value(patch)?);
        self.executor
            .execute_json(&request, &CallContext::default())
            .await
    }

    /// Supply the password of a password-protected file.
    pub async fn set_file_password(
        &self,
        workspace_id: i64,
        project_id: i64,
        file_id: i64,
        password: &str,
    ) -> Result<ObjectJob> {
        self.update_file_config(
            workspace_id,
            project_id,
            file_id,
            &FilePatchRequest::set_password(password),
        )
        .await
    }

    /// Extract sheets of a spreadsheet file into datasets.
    pub async fn extract_sheets(
        &self,
        workspace_id: i64,
        project_id: i64,
        file_id: i64,
        extract: ExtractSheetsPatch,
    ) -> Result<ObjectJob> {
        self.update_file_config(
            workspace_id,
            project_id,
            file_id,
            &FilePatchRequest::extract_sheets(extract),
        )
        .await
    }

    /// Wait for the job behind a single file submission.
    ///
    /// A submission the service rejected outright carries no job id and fails
    /// with `InvalidInput` describing the rejection.
    pub async fn wait_for_object_job(&self, submission: &ObjectJob, options: WaitOptions) -> Result<Job> {
        let Some(job_id) = submission.job_id else {
            return Err(MammothError::InvalidInput(format!(
                "Submission has no job to wait for (status {}): {}",
                submission
                    .status_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                submission.failure_reason.as_deref().unwrap_or("no reason given")
            )));
        };
        self.jobs.wait_for_job(job_id, options).await
    }
}

fn files_path(workspace_id: i64, project_id: i64) -> String {
    format!("/workspaces/{}/projects/{}/files", workspace_id, project_id)
}

fn accepted_job_ids(entries: &[ObjectJob]) -> Vec<JobId> {
    entries
        .iter()
        .filter_map(|entry| {
            if entry.job_id.is_none() {
                log::warn!(
                    "[MAMMOTH_UPLOAD] File rejected without a job (status {:?}): {}",
                    entry.status_code,
                    entry.failure_reason.as_deref().unwrap_or("no reason given")
                );
            }
            entry.job_id
        })
        .collect()
}

//! Dataview pipeline exports.
//!
//! Adding an export answers either 201 with the modification result (which
//! may reference a background job through `future_id`) or 202 with a job
//! envelope. Both shapes surface as [`ExportSubmission`].

use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;

use crate::{
    error::Result,
    jobs::{JobsApi, WaitOptions},
    models::{
        AddExportSpec, HandlerType, Job, JobId, JobResponse, PipelineExportsModificationResp,
        S3TargetProperties, TriggerType,
    },
    orchestrator::{Completion, CompletionMode, Orchestrator},
    retry::{CallContext, RequestExecutor},
    transport::ApiRequest,
};

/// Response of [`ExportsApi::add_export`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExportSubmission {
    /// 202: the export is running as a job
    Job(Job),
    /// 201: export added or edited
    Modified(PipelineExportsModificationResp),
}

impl ExportSubmission {
    /// Job to track, if the submission started one
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Job(job) => Some(job.id),
            Self::Modified(resp) => resp.future_id,
        }
    }

    fn from_value(value: JsonValue) -> Result<Self> {
        if value.get("job").is_some() {
            let envelope: JobResponse = serde_json::from_value(value)?;
            Ok(Self::Job(envelope.job))
        } else {
            Ok(Self::Modified(serde_json::from_value(value)?))
        }
    }
}

/// Pipeline placement and run behaviour shared by every export kind
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Position in the pipeline; `None` appends
    pub sequence: Option<i64>,
    /// Existing export to edit
    pub trigger_id: Option<i64>,
    pub end_of_pipeline: bool,
    pub trigger_type: TriggerType,
    pub condition: Map<String, JsonValue>,
    pub additional_properties: Map<String, JsonValue>,
    pub run_immediately: bool,
    pub validate_only: bool,
}

impl ExportSettings {
    pub fn with_trigger(trigger_type: TriggerType) -> Self {
        Self {
            sequence: None,
            trigger_id: None,
            end_of_pipeline: true,
            trigger_type,
            condition: Map::new(),
            additional_properties: Map::new(),
            run_immediately: true,
            validate_only: false,
        }
    }

    fn into_spec(self, dataview_id: i64, handler_type: HandlerType, target_properties: JsonValue) -> AddExportSpec {
        AddExportSpec {
            dataview_id,
            sequence: self.sequence,
            trigger_id: self.trigger_id,
            end_of_pipeline: self.end_of_pipeline,
            handler_type,
            trigger_type: self.trigger_type,
            target_properties,
            additional_properties: self.additional_properties,
            condition: self.condition,
            run_immediately: self.run_immediately,
            validate_only: self.validate_only,
        }
    }
}

/// Export to S3. Defaults: CSV, hidden columns excluded, formatting applied,
/// no trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct S3ExportOptions {
    pub file: String,
    pub file_type: String,
    pub include_hidden: bool,
    pub is_format_set: bool,
    pub use_format: bool,
    pub settings: ExportSettings,
}

impl S3ExportOptions {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            file_type: "csv".to_string(),
            include_hidden: false,
            is_format_set: true,
            use_format: true,
            settings: ExportSettings::with_trigger(TriggerType::None),
        }
    }

    pub fn file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn into_spec(self, dataview_id: i64) -> Result<AddExportSpec> {
        let target = serde_json::to_value(S3TargetProperties {
            file: self.file,
            file_type: self.file_type,
            include_hidden: self.include_hidden,
            is_format_set: self.is_format_set,
            use_format: self.use_format,
        })?;
        Ok(self.settings.into_spec(dataview_id, HandlerType::S3, target))
    }
}

/// Export into a new dataset of the same project. Runs on pipeline trigger by default.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalDatasetExportOptions {
    pub dataset_name: String,
    pub column_mapping: Option<Map<String, JsonValue>>,
    pub settings: ExportSettings,
}

impl InternalDatasetExportOptions {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            column_mapping: None,
            settings: ExportSettings::with_trigger(TriggerType::Pipeline),
        }
    }

    pub fn column_mapping(mut self, mapping: Map<String, JsonValue>) -> Self {
        self.column_mapping = Some(mapping);
        self
    }

    pub fn settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn into_spec(self, dataview_id: i64) -> AddExportSpec {
        let mut target = json!({ "dataset_name": self.dataset_name });
        if let Some(mapping) = self.column_mapping.filter(|m| !m.is_empty()) {
            target["COLUMN_MAPPING"] = JsonValue::Object(mapping);
        }
        self.settings
            .into_spec(dataview_id, HandlerType::InternalDataset, target)
    }
}

#[derive(Debug, Clone)]
pub struct ExportsApi {
    executor: Arc<RequestExecutor>,
    orchestrator: Orchestrator,
}

impl ExportsApi {
    pub(crate) fn new(executor: Arc<RequestExecutor>, jobs: JobsApi) -> Self {
        Self {
            executor,
            orchestrator: Orchestrator::new(jobs),
        }
    }

    /// Add (or, with `trigger_id`, edit) an export of a dataview pipeline.
    pub async fn add_export(
        &self,
        workspace_id: i64,
        project_id: i64,
        dataset_id: i64,
        dataview_id: i64,
        spec: &AddExportSpec,
    ) -> Result<ExportSubmission> {
        let request = ApiRequest::post(format!(
            "/workspaces/{}/projects/{}/datasets/{}/dataviews/{}/pipeline/exports",
            workspace_id, project_id, dataset_id, dataview_id
        ))
        .with_json(serde_json::to_value(spec)?);

        let value = self
            .executor
            .execute_value(&request, &CallContext::default())
            .await?;
        let submission = ExportSubmission::from_value(value)?;
        log::debug!(
            "[MAMMOTH_EXPORT] Export on dataview {} submitted, job={:?}",
            dataview_id,
            submission.job_id()
        );
        Ok(submission)
    }

    pub async fn create_s3_export(
        &self,
        workspace_id: i64,
        project_id: i64,
        dataset_id: i64,
        dataview_id: i64,
        options: S3ExportOptions,
    ) -> Result<ExportSubmission> {
        let spec = options.into_spec(dataview_id)?;
        self.add_export(workspace_id, project_id, dataset_id, dataview_id, &spec)
            .await
    }

    pub async fn create_internal_dataset_export(
        &self,
        workspace_id: i64,
        project_id: i64,
        dataset_id: i64,
        dataview_id: i64,
        options: InternalDatasetExportOptions,
    ) -> Result<ExportSubmission> {
        let spec = options.into_spec(dataview_id);
        self.add_export(workspace_id, project_id, dataset_id, dataview_id, &spec)
            .await
    }

    /// Wait for the job started by an export submission.
    ///
    /// Returns `None` without any request when the submission has no job.
    pub async fn wait_for_export(&self, submission: &ExportSubmission, options: WaitOptions) -> Result<Option<Job>> {
        let Some(job_id) = submission.job_id() else {
            return Ok(None);
        };

        let completion = self
            .orchestrator
            .complete(vec![job_id], CompletionMode::wait(options), |job: &Job| Some(job.clone()))
            .await?;
        Ok(match completion {
            Completion::Completed(mut jobs) => jobs.pop().flatten(),
            Completion::Submitted(_) => None,
        })
    }
}

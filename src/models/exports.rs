use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::job::JobId;

/// Destination type of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    Postgres,
    CsvFile,
    S3,
    Mysql,
    Mssql,
    Ftp,
    Sftp,
    Email,
    Elasticsearch,
    Powerbi,
    Redshift,
    Bigquery,
    InternalDataset,
    Publishdb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    None,
    Pipeline,
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Deleted,
    Executed,
    Executing,
    Edited,
    Added,
    Suspended,
    Suspending,
    #[serde(other)]
    Unknown,
}

/// Target properties of an S3 export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3TargetProperties {
    pub file: String,
    pub file_type: String,
    pub include_hidden: bool,
    pub is_format_set: bool,
    pub use_format: bool,
}

/// Body of `POST .../dataviews/{id}/pipeline/exports`.
///
/// `trigger_id` set means an existing export is edited rather than added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddExportSpec {
    #[serde(rename = "DATAVIEW_ID")]
    pub dataview_id: i64,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(rename = "TRIGGER_ID", default)]
    pub trigger_id: Option<i64>,
    pub end_of_pipeline: bool,
    pub handler_type: HandlerType,
    pub trigger_type: TriggerType,
    pub target_properties: JsonValue,
    pub additional_properties: Map<String, JsonValue>,
    pub condition: Map<String, JsonValue>,
    pub run_immediately: bool,
    pub validate_only: bool,
}

/// Result of an export add/edit that did not start a tracked job inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExportsModificationResp {
    pub trigger_id: i64,
    #[serde(default)]
    pub status: Option<ExportStatus>,
    /// Trackable job running in the background, if any
    #[serde(default)]
    pub future_id: Option<JobId>,
}

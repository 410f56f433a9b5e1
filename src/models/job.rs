use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::error::{MammothError, Result};

/// Identifier of a server-tracked asynchronous job.
///
/// Assigned by the service at submission time; the client never invents one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Parse a comma-separated list of job ids (e.g. `"1, 2,3"`).
    ///
    /// An empty or whitespace-only string yields an empty list.
    pub fn parse_list(input: &str) -> Result<Vec<JobId>> {
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }

        input
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i64>()
                    .map(JobId)
                    .map_err(|e| MammothError::InvalidInput(format!("Invalid job ID format: {}", e)))
            })
            .collect()
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a job as reported by the service.
///
/// `Processing` is the only documented non-terminal state. Statuses this
/// client does not know about decode as `Unknown` and are polled like
/// `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Success,
    Failure,
    Error,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Error)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Open-ended result payload of a job.
///
/// Empty while the job is processing. Known fields get typed accessors;
/// anything else stays reachable through [`JobPayload::get`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobPayload(Map<String, JsonValue>);

impl JobPayload {
    pub const DATASET_ID: &'static str = "ds_id";
    pub const FAILURE_REASON: &'static str = "failure_reason";

    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dataset produced by an ingestion job (`ds_id`).
    pub fn dataset_id(&self) -> Option<i64> {
        self.get_i64(Self::DATASET_ID)
    }

    /// Failure reason reported by the service, verbatim.
    pub fn failure_reason(&self) -> Option<&str> {
        self.0.get(Self::FAILURE_REASON).and_then(JsonValue::as_str)
    }

    /// Integer field lookup tolerant of ids encoded as strings.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }
}

// The service sends `null`, `{}` or omits the field while a job is running.
impl<'de> Deserialize<'de> for JobPayload {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<JsonValue>::deserialize(deserializer)?;
        match value {
            None | Some(JsonValue::Null) => Ok(Self::default()),
            Some(JsonValue::Object(map)) => Ok(Self(map)),
            Some(other) => {
                // Non-object payloads are kept under a synthetic key so nothing is lost
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Ok(Self(map))
            },
        }
    }
}

/// Snapshot of a job, fetched fresh on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub response: JobPayload,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub operation: String,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `JobFailed` for failed jobs, `None` otherwise.
    pub fn failure(&self) -> Option<MammothError> {
        self.status.is_failed().then(|| MammothError::JobFailed {
            job_id: self.id,
            reason: self.response.failure_reason().map(str::to_string),
        })
    }
}

/// Envelope of `GET /jobs/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub job: Job,
}

/// Envelope of `GET /jobs?job_ids=...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsGetResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Per-object result of a submission that started (or failed to start) a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectJob {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Accepts RFC 3339 and naive ISO-8601 timestamps; naive values are UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_json(status: &str, response: JsonValue) -> JsonValue {
        json!({
            "id": 42,
            "status": status,
            "response": response,
            "created_at": "2024-05-01T10:00:00Z",
            "last_updated_at": "2024-05-01T10:00:05.250",
            "path": "/api/v2/workspaces/1/projects/1/files",
            "operation": "file_upload"
        })
    }

    #[test]
    fn test_job_decodes_success_with_dataset_id() {
        let job: Job = serde_json::from_value(job_json("success", json!({"ds_id": 5}))).unwrap();
        assert_eq!(job.id, JobId::new(42));
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.is_terminal());
        assert_eq!(job.response.dataset_id(), Some(5));
        assert!(job.failure().is_none());
        assert!(job.last_updated_at >= job.created_at);
    }

    #[test]
    fn test_processing_job_with_null_response_is_empty() {
        let job: Job = serde_json::from_value(job_json("processing", JsonValue::Null)).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.response.is_empty());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_failed_job_maps_to_job_failed() {
        let job: Job =
            serde_json::from_value(job_json("error", json!({"failure_reason": "bad format"}))).unwrap();
        match job.failure() {
            Some(MammothError::JobFailed { job_id, reason }) => {
                assert_eq!(job_id, JobId::new(42));
                assert_eq!(reason.as_deref(), Some("bad format"));
            },
            other => panic!("Expected JobFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let job: Job = serde_json::from_value(job_json("queued", json!({}))).unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_dataset_id_accepts_string_encoding() {
        let payload: JobPayload = serde_json::from_value(json!({"ds_id": "17"})).unwrap();
        assert_eq!(payload.dataset_id(), Some(17));
    }

    #[test]
    fn test_parse_job_id_list() {
        assert_eq!(
            JobId::parse_list("1, 2,3").unwrap(),
            vec![JobId::new(1), JobId::new(2), JobId::new(3)]
        );
        assert!(JobId::parse_list("  ").unwrap().is_empty());
        assert!(matches!(JobId::parse_list("1,x"), Err(MammothError::InvalidInput(_))));
    }

    #[test]
    fn test_object_job_without_id() {
        let obj: ObjectJob =
            serde_json::from_value(json!({"status_code": 400, "failure_reason": "empty file"})).unwrap();
        assert_eq!(obj.job_id, None);
        assert_eq!(obj.status_code, Some(400));
    }
}

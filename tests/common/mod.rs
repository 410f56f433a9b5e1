#![allow(dead_code)]
//! Shared helpers for integration tests.
//!
//! [`ScriptedTransport`] replaces the HTTP layer: every request is recorded
//! with the (virtual) instant it was sent and answered by a handler closure.
//! [`FakeJobService`] is a handler that plays back a scripted status
//! sequence per job.

use async_trait::async_trait;
use mammoth_client::{
    ApiRequest, ApiResponse, ClientConfig, MammothClient, Transport, TransportError,
};
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub type Reply = Result<ApiResponse, TransportError>;

type Handler = Box<dyn Fn(&ApiRequest, usize) -> Reply + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: ApiRequest,
    pub at: Instant,
}

/// In-memory transport answering from a closure.
///
/// The closure receives the request and how many times that path has been
/// requested so far, this call included.
pub struct ScriptedTransport {
    handler: Handler,
    log: Mutex<Vec<RecordedRequest>>,
    started: Instant,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&ApiRequest, usize) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
            started: Instant::now(),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Requests whose path starts with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.request.path.starts_with(prefix))
            .count()
    }

    /// Offsets of every request from the transport's creation
    pub fn send_offsets(&self) -> Vec<Duration> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.at.duration_since(self.started))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let calls = {
            let mut log = self.log.lock().unwrap();
            log.push(RecordedRequest {
                request: request.clone(),
                at: Instant::now(),
            });
            log.iter().filter(|r| r.request.path == request.path).count()
        };
        (self.handler)(request, calls)
    }
}

/// Plays back scripted job snapshots.
///
/// Each query of a job consumes the next scripted snapshot; the last one
/// repeats forever, so terminal states stay terminal.
#[derive(Default)]
pub struct FakeJobService {
    scripts: Mutex<HashMap<i64, VecDeque<JsonValue>>>,
    queries: Mutex<HashMap<i64, usize>>,
}

impl FakeJobService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script a job: `processing` for `processing_polls` queries, then `last`.
    pub fn script(&self, id: i64, processing_polls: usize, last: JsonValue) {
        let mut snapshots: VecDeque<JsonValue> = (0..processing_polls)
            .map(|i| job_json(id, "processing", JsonValue::Null, i as i64))
            .collect();
        snapshots.push_back(last);
        self.scripts.lock().unwrap().insert(id, snapshots);
    }

    /// Script a job that never leaves `processing`
    pub fn script_forever_processing(&self, id: i64) {
        self.script(id, 0, job_json(id, "processing", JsonValue::Null, 0));
    }

    pub fn queries_of(&self, id: i64) -> usize {
        self.queries.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    fn next_snapshot(&self, id: i64) -> Option<JsonValue> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.get_mut(&id)?;
        *self.queries.lock().unwrap().entry(id).or_insert(0) += 1;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }

    /// Answer `GET /jobs/{id}` and `GET /jobs?job_ids=...`; `None` for other paths.
    pub fn respond(&self, request: &ApiRequest) -> Option<Reply> {
        if request.path == "/jobs" {
            let ids = request.query_value("job_ids").unwrap_or_default();
            let jobs: Vec<JsonValue> = ids
                .split(',')
                .filter_map(|id| id.trim().parse::<i64>().ok())
                .filter_map(|id| self.next_snapshot(id))
                .collect();
            return Some(Ok(ApiResponse::json_body(200, &json!({ "jobs": jobs }))));
        }

        let id = request.path.strip_prefix("/jobs/")?.parse::<i64>().ok()?;
        Some(Ok(match self.next_snapshot(id) {
            Some(job) => ApiResponse::json_body(200, &json!({ "job": job })),
            None => ApiResponse::json_body(404, &json!({ "detail": "Job not found" })),
        }))
    }
}

/// A job snapshot as the service returns it
pub fn job_json(id: i64, status: &str, response: JsonValue, updated_secs: i64) -> JsonValue {
    json!({
        "id": id,
        "status": status,
        "response": response,
        "created_at": "2024-05-01T10:00:00Z",
        "last_updated_at": format!("2024-05-01T10:{:02}:{:02}Z", updated_secs / 60 % 60, updated_secs % 60),
        "path": "/api/v2/workspaces/1/projects/1/files",
        "operation": "file_upload"
    })
}

pub fn success_job(id: i64, dataset_id: i64) -> JsonValue {
    job_json(id, "success", json!({ "ds_id": dataset_id }), 30)
}

pub fn failed_job(id: i64, reason: &str) -> JsonValue {
    job_json(id, "failure", json!({ "failure_reason": reason }), 30)
}

/// Jitter-free config with short delays so timings are exact
pub fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .max_retries(3)
        .retry_base_delay(Duration::from_millis(100))
        .retry_max_delay(Duration::from_secs(2))
        .retry_jitter(false)
        .default_job_timeout(Duration::from_secs(60))
        .default_poll_interval(Duration::from_secs(1))
        .build()
}

pub fn client_with(transport: Arc<ScriptedTransport>) -> MammothClient {
    MammothClient::builder()
        .base_url("http://localhost:8080")
        .config(test_config())
        .transport(transport)
        .build()
        .expect("client should build")
}

/// Transport backed by a job service, answering 404 for anything else
pub fn job_transport(service: Arc<FakeJobService>) -> Arc<ScriptedTransport> {
    ScriptedTransport::new(move |request, _| {
        service
            .respond(request)
            .unwrap_or_else(|| Ok(ApiResponse::new(404, "")))
    })
}

/// Paused-clock timer wakeups may land a millisecond late
pub fn assert_elapsed(started: Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{:?}, elapsed {:?}",
        expected,
        elapsed
    );
}

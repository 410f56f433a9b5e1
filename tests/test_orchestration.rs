//! Submit-then-track flows: file uploads, file configuration and exports.

mod common;

use common::*;
use mammoth_client::{
    ApiResponse, Completion, ExportSubmission, ExtractSheetsPatch, InternalDatasetExportOptions,
    JobId, MammothError, ObjectJob, RequestBody, S3ExportOptions, UploadFile, UploadOptions,
    WaitOptions,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;

const UPLOAD_PATH: &str = "/workspaces/1/projects/2/files";

/// Transport that accepts uploads with the given entries and serves jobs from `service`
fn upload_transport(service: Arc<FakeJobService>, entries: JsonValue) -> Arc<ScriptedTransport> {
    ScriptedTransport::new(move |request, _| {
        if request.path == UPLOAD_PATH {
            return Ok(ApiResponse::json_body(200, &entries));
        }
        service
            .respond(request)
            .unwrap_or_else(|| Ok(ApiResponse::new(404, "")))
    })
}

fn three_files() -> Vec<UploadFile> {
    vec![
        UploadFile::from_bytes("a.csv", "id,name\n1,a\n"),
        UploadFile::from_bytes("b.csv", "id,name\n2,b\n"),
        UploadFile::from_bytes("c.csv", "id,name\n3,c\n"),
    ]
}

fn accepted(ids: &[i64]) -> JsonValue {
    JsonValue::Array(
        ids.iter()
            .map(|id| json!({"job_id": id, "status_code": 202}))
            .collect(),
    )
}

fn quick_wait() -> WaitOptions {
    WaitOptions::new()
        .with_timeout(Duration::from_secs(60))
        .with_poll_interval(Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_upload_with_one_failed_job_raises_job_failed() {
    let service = FakeJobService::new();
    service.script(101, 1, success_job(101, 5));
    service.script(102, 0, success_job(102, 6));
    service.script(103, 1, failed_job(103, "bad format"));
    let transport = upload_transport(service, accepted(&[101, 102, 103]));
    let client = client_with(transport.clone());

    let err = client
        .files()
        .upload_files(1, 2, three_files(), UploadOptions::new().wait_options(quick_wait()))
        .await
        .unwrap_err();

    match err {
        MammothError::JobFailed { job_id, reason } => {
            assert_eq!(job_id, JobId::new(103));
            assert_eq!(reason.as_deref(), Some("bad format"));
        },
        other => panic!("Expected JobFailed, got {:?}", other),
    }
    assert_eq!(transport.count_prefix(UPLOAD_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_waits_and_returns_dataset_ids_in_order() {
    let service = FakeJobService::new();
    service.script(101, 2, success_job(101, 5));
    service.script(102, 0, success_job(102, 6));
    service.script(103, 1, job_json(103, "success", json!({"message": "no dataset"}), 9));
    let transport = upload_transport(service, accepted(&[101, 102, 103]));
    let client = client_with(transport.clone());

    let completion = client
        .files()
        .upload_files(1, 2, three_files(), UploadOptions::new().wait_options(quick_wait()))
        .await
        .unwrap();

    assert_eq!(completion, Completion::Completed(vec![Some(5), Some(6), None]));
    assert_eq!(completion.into_values(), vec![5, 6]);

    let upload = &transport.requests()[0].request;
    match &upload.body {
        RequestBody::Files(files) => {
            let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
            assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);
        },
        other => panic!("Expected multipart body, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_upload_fire_and_forget_returns_job_ids_without_polling() {
    let service = FakeJobService::new();
    let transport = upload_transport(service, accepted(&[101, 102, 103]));
    let client = client_with(transport.clone());

    let completion = client
        .files()
        .upload_files(
            1,
            2,
            three_files(),
            UploadOptions::new()
                .wait_for_completion(false)
                .folder_resource_id("folder-9")
                .append_to_ds_id(44)
                .override_target_schema(true),
        )
        .await
        .unwrap();

    assert_eq!(
        completion,
        Completion::Submitted(vec![JobId::new(101), JobId::new(102), JobId::new(103)])
    );
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.count_prefix("/jobs"), 0);

    let upload = &transport.requests()[0].request;
    assert_eq!(upload.query_value("folder_resource_id"), Some("folder-9"));
    assert_eq!(upload.query_value("append_to_ds_id"), Some("44"));
    assert_eq!(upload.query_value("override_target_schema"), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn test_upload_skips_entries_without_job() {
    let service = FakeJobService::new();
    service.script(201, 0, success_job(201, 8));
    let entries = json!([
        {"job_id": 201, "status_code": 202},
        {"status_code": 400, "failure_reason": "empty file"}
    ]);
    let client = client_with(upload_transport(service, entries));

    let completion = client
        .files()
        .upload_files(1, 2, three_files(), UploadOptions::new().wait_options(quick_wait()))
        .await
        .unwrap();
    assert_eq!(completion, Completion::Completed(vec![Some(8)]));
}

#[tokio::test(start_paused = true)]
async fn test_upload_submission_error_propagates_unchanged() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok(ApiResponse::json_body(403, &json!({"detail": "Project is read-only"})))
    });
    let client = client_with(transport.clone());

    let err = client
        .files()
        .upload_files(1, 2, three_files(), UploadOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MammothError::RequestFailure { status_code: 403, ref message, .. } if message == "Project is read-only"));
    assert_eq!(transport.count_prefix("/jobs"), 0);
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let transport = ScriptedTransport::new(|_, _| Ok(ApiResponse::new(204, "")));
    let client = client_with(transport.clone());

    let err = client
        .files()
        .upload_files(1, 2, Vec::new(), UploadOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MammothError::InvalidInput(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_password_and_wait_for_object_job() {
    let service = FakeJobService::new();
    service.script(301, 1, job_json(301, "success", json!({"file_id": 12}), 4));
    let svc = service.clone();
    let transport = ScriptedTransport::new(move |request, _| {
        if request.path == "/workspaces/1/projects/2/files/12" {
            return Ok(ApiResponse::json_body(202, &json!({"job_id": 301, "status_code": 202})));
        }
        svc.respond(request)
            .unwrap_or_else(|| Ok(ApiResponse::new(404, "")))
    });
    let client = client_with(transport.clone());
    let files = client.files();

    let submission = files.set_file_password(1, 2, 12, "hunter2").await.unwrap();
    assert_eq!(submission.job_id, Some(JobId::new(301)));

    let patch = &transport.requests()[0].request;
    assert_eq!(patch.method, reqwest::Method::PATCH);
    assert_eq!(
        patch.body,
        RequestBody::Json(json!({"patch": [{"op": "replace", "path": "password", "value": "hunter2"}]}))
    );

    let job = files.wait_for_object_job(&submission, quick_wait()).await.unwrap();
    assert_eq!(job.response.get_i64("file_id"), Some(12));
    assert_eq!(service.queries_of(301), 2);
}

#[tokio::test(start_paused = true)]
async fn test_extract_sheets_request_body() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok(ApiResponse::json_body(202, &json!({"job_id": 5, "status_code": 202})))
    });
    let client = client_with(transport.clone());

    client
        .files()
        .extract_sheets(
            1,
            2,
            3,
            ExtractSheetsPatch {
                sheets: vec!["Q1".into(), "Q2".into()],
                delete_file_after_extract: true,
                combine_after_extract: false,
            },
        )
        .await
        .unwrap();

    let request = &transport.requests()[0].request;
    assert_eq!(request.path, "/workspaces/1/projects/2/files/3");
    match &request.body {
        RequestBody::Json(body) => {
            assert_eq!(body["patch"][0]["path"], "extract_sheets");
            assert_eq!(body["patch"][0]["value"]["sheets"], json!(["Q1", "Q2"]));
        },
        other => panic!("Expected JSON body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_object_job_cannot_be_waited_on() {
    let transport = ScriptedTransport::new(|_, _| Ok(ApiResponse::new(204, "")));
    let client = client_with(transport.clone());
    let rejected = ObjectJob {
        status_code: Some(400),
        job_id: None,
        failure_reason: Some("wrong password".into()),
    };

    let err = client
        .files()
        .wait_for_object_job(&rejected, WaitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MammothError::InvalidInput(ref msg) if msg.contains("wrong password")));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_export_accepted_as_job_is_tracked() {
    let service = FakeJobService::new();
    service.script(401, 2, job_json(401, "success", json!({"ds_id": 77}), 12));
    let svc = service.clone();
    let transport = ScriptedTransport::new(move |request, _| {
        if request.path.ends_with("/pipeline/exports") {
            return Ok(ApiResponse::json_body(
                202,
                &json!({"job": job_json(401, "processing", JsonValue::Null, 0)}),
            ));
        }
        svc.respond(request)
            .unwrap_or_else(|| Ok(ApiResponse::new(404, "")))
    });
    let client = client_with(transport.clone());
    let exports = client.exports();

    let submission = exports
        .create_internal_dataset_export(1, 2, 3, 4, InternalDatasetExportOptions::new("copy"))
        .await
        .unwrap();
    assert!(matches!(submission, ExportSubmission::Job(_)));
    assert_eq!(submission.job_id(), Some(JobId::new(401)));

    let request = &transport.requests()[0].request;
    assert_eq!(
        request.path,
        "/workspaces/1/projects/2/datasets/3/dataviews/4/pipeline/exports"
    );
    match &request.body {
        RequestBody::Json(body) => {
            assert_eq!(body["DATAVIEW_ID"], 4);
            assert_eq!(body["handler_type"], "internal_dataset");
            assert_eq!(body["trigger_type"], "pipeline");
        },
        other => panic!("Expected JSON body, got {:?}", other),
    }

    let job = exports
        .wait_for_export(&submission, quick_wait())
        .await
        .unwrap()
        .expect("export job");
    assert_eq!(job.response.dataset_id(), Some(77));
}

#[tokio::test(start_paused = true)]
async fn test_export_added_without_job_needs_no_wait() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok(ApiResponse::json_body(201, &json!({"trigger_id": 15, "status": "added"})))
    });
    let client = client_with(transport.clone());
    let exports = client.exports();

    let submission = exports
        .create_s3_export(1, 2, 3, 4, S3ExportOptions::new("exports/out.csv"))
        .await
        .unwrap();
    match &submission {
        ExportSubmission::Modified(resp) => assert_eq!(resp.trigger_id, 15),
        other => panic!("Expected Modified, got {:?}", other),
    }

    let waited = exports.wait_for_export(&submission, quick_wait()).await.unwrap();
    assert!(waited.is_none());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_export_failure_is_reported_as_job_failed() {
    let service = FakeJobService::new();
    service.script(402, 0, failed_job(402, "S3 bucket not reachable"));
    let svc = service.clone();
    let transport = ScriptedTransport::new(move |request, _| {
        if request.path.ends_with("/pipeline/exports") {
            return Ok(ApiResponse::json_body(201, &json!({"trigger_id": 16, "future_id": 402})));
        }
        svc.respond(request)
            .unwrap_or_else(|| Ok(ApiResponse::new(404, "")))
    });
    let client = client_with(transport);
    let exports = client.exports();

    let submission = exports
        .create_s3_export(1, 2, 3, 4, S3ExportOptions::new("out.csv"))
        .await
        .unwrap();
    let err = exports.wait_for_export(&submission, quick_wait()).await.unwrap_err();
    assert!(matches!(err, MammothError::JobFailed { job_id, .. } if job_id == JobId::new(402)));
}

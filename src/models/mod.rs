//! Data models for mammoth-client.
//!
//! Wire shapes of job snapshots and of the submissions that create jobs.

pub mod exports;
pub mod files;
pub mod job;

pub use exports::{
    AddExportSpec, ExportStatus, HandlerType, PipelineExportsModificationResp, S3TargetProperties,
    TriggerType,
};
pub use files::{
    ExtractSheetsPatch, FilePatchData, FilePatchOperation, FilePatchPath, FilePatchRequest,
    FilePatchValue, UploadFile,
};
pub use job::{Job, JobId, JobPayload, JobResponse, JobStatus, JobsGetResponse, ObjectJob};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MammothError, Result};

/// One file to ingest.
///
/// Content is held in memory so a request can be rebuilt for every retry
/// attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn from_bytes(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk.
    ///
    /// Fails with `InvalidInput` when the path does not exist or is not a
    /// regular file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MammothError::InvalidInput(format!("File not found: {}", path.display())));
        }
        if !path.is_file() {
            return Err(MammothError::InvalidInput(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "uploaded_file".to_string());
        let content = std::fs::read(path)?;
        Ok(Self { file_name, content })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilePatchOperation {
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePatchPath {
    ExtractSheets,
    Password,
}

/// Sheet extraction settings for spreadsheet uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractSheetsPatch {
    pub sheets: Vec<String>,
    #[serde(default = "default_delete_file_after_extract")]
    pub delete_file_after_extract: bool,
    #[serde(default)]
    pub combine_after_extract: bool,
}

fn default_delete_file_after_extract() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePatchValue {
    Text(String),
    ExtractSheets(ExtractSheetsPatch),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePatchData {
    pub op: FilePatchOperation,
    pub path: FilePatchPath,
    pub value: FilePatchValue,
}

/// Body of `PATCH /workspaces/{w}/projects/{p}/files/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePatchRequest {
    pub patch: Vec<FilePatchData>,
}

impl FilePatchRequest {
    pub fn set_password(password: impl Into<String>) -> Self {
        Self {
            patch: vec![FilePatchData {
                op: FilePatchOperation::Replace,
                path: FilePatchPath::Password,
                value: FilePatchValue::Text(password.into()),
            }],
        }
    }

    pub fn extract_sheets(extract: ExtractSheetsPatch) -> Self {
        Self {
            patch: vec![FilePatchData {
                op: FilePatchOperation::Replace,
                path: FilePatchPath::ExtractSheets,
                value: FilePatchValue::ExtractSheets(extract),
            }],
        }
    }
}

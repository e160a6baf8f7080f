//! # contract: interfaces to the remote store
//!
//! The merge pipeline never talks to the remote store directly. It consumes
//! [`RemoteFile`] descriptors from a [`FileSource`] and hands the finished
//! workbook to an [`Uploader`]. The CLI crate implements both traits over the
//! Google Drive REST API; tests use the generated `MockFileSource` and
//! `MockUploader`.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` (behind the `test-export-mocks`
//!   feature, on by default) so downstream crates can use the mocks too.
//!
//! ## Errors
//! - Methods return boxed errors; the pipeline maps them onto
//!   [`MergeError`](crate::error::MergeError) variants and never retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::CollaboratorError;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIME: &str = "application/vnd.ms-excel";

/// A candidate spreadsheet in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Request to create a new file in the remote store.
pub struct NewUpload<'a> {
    pub name: &'a str,
    pub parent_folder_id: &'a str,
    pub mime_type: &'a str,
    pub content: &'a [u8],
}

/// The created remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
}

/// Listing and download side of the remote store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileSource: Send + Sync {
    /// List the non-trashed spreadsheets directly inside `folder_id`.
    async fn list_spreadsheets(&self, folder_id: &str)
        -> Result<Vec<RemoteFile>, CollaboratorError>;

    /// Download `file` into `dest_dir` and return the local path.
    async fn download(
        &self,
        file: &RemoteFile,
        dest_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError>;
}

/// Write side of the remote store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload<'a>(&self, req: NewUpload<'a>) -> Result<UploadedFile, CollaboratorError>;
}

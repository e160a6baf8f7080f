//! # Google Drive client
//!
//! Implements the core [`FileSource`] and [`Uploader`] traits over the Drive v3
//! REST API, authenticating as a service account.
//!
//! - Construct with [`DriveClient::from_credentials`] and call
//!   [`DriveClient::authenticate`] once so a bad key fails the run before any
//!   listing happens.
//! - Listing follows `nextPageToken` until the folder is exhausted.
//! - Uploads use a single `multipart/related` request: JSON metadata first,
//!   workbook bytes second.
//!
//! Every method returns boxed errors carrying the HTTP status and body; the
//! pipeline decides which run-level error they become.

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dth_merge_core::contract::{FileSource, NewUpload, RemoteFile, UploadedFile, Uploader};
use dth_merge_core::error::{CollaboratorError, MergeError};
use dth_merge_core::select::listing_query;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const LIST_FIELDS: &str = "files(id,name,createdTime,mimeType),nextPageToken";
const UPLOAD_FIELDS: &str = "id,name,webViewLink";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: String,
    name: String,
    web_view_link: Option<String>,
}

pub struct DriveClient {
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
}

impl DriveClient {
    /// Load the service account key at `path`. Fails with [`MergeError::Auth`]
    /// when the file is missing or is not a service account key.
    pub fn from_credentials(path: &Path) -> Result<Self, MergeError> {
        if !path.is_file() {
            tracing::error!(path = %path.display(), "Credential file not found");
            return Err(MergeError::Auth(format!(
                "credential file {} not found",
                path.display()
            )));
        }
        let account = CustomServiceAccount::from_file(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = ?e, "Failed to load service account key");
            MergeError::Auth(format!("invalid credential file {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "Loaded service account credentials");
        Ok(Self {
            http: reqwest::Client::new(),
            auth: Arc::new(account),
        })
    }

    /// Fetch a token now, so rejected credentials surface as an auth error.
    pub async fn authenticate(&self) -> Result<(), MergeError> {
        self.token().await.map(|_| ()).map_err(|e| {
            tracing::error!(error = %e, "Service account was rejected");
            MergeError::Auth(e.to_string())
        })
    }

    async fn token(&self) -> Result<String, CollaboratorError> {
        let token = self.auth.token(&[DRIVE_SCOPE]).await?;
        Ok(token.as_str().to_string())
    }
}

/// Turn a non-success response into an error carrying status and body.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, CollaboratorError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(format!("HTTP {status}: {body}").into())
}

/// Local name for a downloaded file. Path separators in remote names are
/// replaced so the file always lands inside the download directory.
pub fn local_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "download.xlsx".to_string(),
        _ => cleaned,
    }
}

/// Body of a `multipart/related` upload: metadata part, then content part.
pub fn multipart_body(boundary: &str, req: &NewUpload<'_>) -> Vec<u8> {
    let metadata = serde_json::json!({
        "name": req.name,
        "parents": [req.parent_folder_id],
        "mimeType": req.mime_type,
    });
    let mut body = Vec::with_capacity(req.content.len() + 512);
    // Writes into a Vec cannot fail.
    let _ = write!(
        body,
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {}\r\n\r\n",
        req.mime_type
    );
    body.extend_from_slice(req.content);
    let _ = write!(body, "\r\n--{boundary}--\r\n");
    body
}

#[async_trait]
impl FileSource for DriveClient {
    async fn list_spreadsheets(
        &self,
        folder_id: &str,
    ) -> Result<Vec<RemoteFile>, CollaboratorError> {
        let token = self.token().await?;
        let query = listing_query(folder_id);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.http.get(FILES_URL).bearer_auth(&token).query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("orderBy", "createdTime desc"),
                ("pageSize", PAGE_SIZE),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ]);
            if let Some(page) = &page_token {
                req = req.query(&[("pageToken", page.as_str())]);
            }
            let page: FileList = check(req.send().await?).await?.json().await?;
            tracing::debug!(count = page.files.len(), folder_id, "Listed page of files");
            files.extend(page.files);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        tracing::info!(count = files.len(), folder_id, "Listed folder");
        Ok(files)
    }

    async fn download(
        &self,
        file: &RemoteFile,
        dest_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        let token = self.token().await?;
        let url = format!("{FILES_URL}/{}", file.id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;
        let bytes = check(resp).await?.bytes().await?;

        // One directory per file id keeps same-named files apart.
        let dir = dest_dir.join(&file.id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(local_file_name(&file.name));
        fs::write(&path, &bytes)?;
        tracing::info!(name = %file.name, bytes = bytes.len(), path = %path.display(), "Downloaded file");
        Ok(path)
    }
}

#[async_trait]
impl Uploader for DriveClient {
    async fn upload<'a>(&self, req: NewUpload<'a>) -> Result<UploadedFile, CollaboratorError> {
        let token = self.token().await?;
        let boundary = format!("dth-merge-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &req);
        let resp = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", UPLOAD_FIELDS),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let created: CreatedFile = check(resp).await?.json().await?;
        tracing::info!(id = %created.id, name = %created.name, "Created remote file");
        Ok(UploadedFile {
            id: created.id,
            name: created.name,
            web_view_link: created.web_view_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_file_name_keeps_files_inside_the_directory() {
        assert_eq!(local_file_name("dth maret.xlsx"), "dth maret.xlsx");
        assert_eq!(local_file_name("a/b\\c.xlsx"), "a_b_c.xlsx");
        assert_eq!(local_file_name(".."), "download.xlsx");
    }

    #[test]
    fn multipart_body_has_metadata_then_content() {
        let req = NewUpload {
            name: "DTH_March_2024.xlsx",
            parent_folder_id: "folder-1",
            mime_type: "application/octet-stream",
            content: b"PK-bytes",
        };
        let body = String::from_utf8(multipart_body("b1", &req)).unwrap();
        assert!(body.starts_with("--b1\r\nContent-Type: application/json"));
        assert!(body.contains(r#""parents":["folder-1"]"#));
        assert!(body.contains(r#""name":"DTH_March_2024.xlsx""#));
        let meta_at = body.find("DTH_March_2024").unwrap();
        let content_at = body.find("PK-bytes").unwrap();
        assert!(meta_at < content_at);
        assert!(body.ends_with("\r\n--b1--\r\n"));
    }
}

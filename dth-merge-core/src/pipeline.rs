//! High-level pipeline: orchestrates list → download → extract → merge → write.
//!
//! This module provides the top-level orchestration for one monthly merge run:
//!   - Lists the source folder through a [`FileSource`] and selects spreadsheets
//!   - Downloads each file in turn into a temporary directory and extracts it
//!   - Applies the [`ReadPolicy`] to the per-file outcomes in one place
//!   - Combines, normalizes, renders and writes the merged workbook
//!   - Returns a [`MergeReport`] describing what was merged and where it went
//!
//! # Responsibilities
//! - Sequential, fail-fast orchestration: collaborator errors abort the run
//! - The temporary download directory is removed on success and on abort
//! - Nothing is written to any destination unless the merge succeeded
//!
//! # Navigation
//! - Main entrypoint: [`merge`]
//! - Per-file decision point: [`apply_read_policy`]

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

use crate::combine::combine;
use crate::config::{MergeConfig, ReadPolicy};
use crate::contract::{FileSource, RemoteFile, Uploader};
use crate::error::{CombineError, MergeError, ReadError, WriteError};
use crate::extract::extract_table;
use crate::normalize::normalize;
use crate::select::select_spreadsheets;
use crate::sink::{
    output_filename, render_xlsx, sha256_hex, stage_local, upload_workbook, Clock,
    SavedLocation, OUTPUT_EXTENSION,
};
use crate::table::Table;

/// Result of reading one selected file.
#[derive(Debug)]
pub struct FileOutcome {
    pub file: RemoteFile,
    pub result: Result<Table, ReadError>,
}

/// A file left out of the merge in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Tables that passed the read policy, in selection order.
#[derive(Debug, Default)]
pub struct AcceptedTables {
    pub tables: Vec<Table>,
    pub merged_files: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub success: bool,
    pub filename: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub files_merged: usize,
    pub merged_files: Vec<String>,
    pub skipped_files: Vec<SkippedFile>,
    pub saved_locations: Vec<SavedLocation>,
    pub sha256: String,
    pub created_at: DateTime<Local>,
}

/// The single strict/lenient decision over all per-file outcomes.
///
/// Strict mode fails on the first unreadable file. Lenient mode keeps the
/// readable ones and records the rest as skipped.
pub fn apply_read_policy(
    policy: ReadPolicy,
    outcomes: Vec<FileOutcome>,
) -> Result<AcceptedTables, MergeError> {
    let mut accepted = AcceptedTables::default();
    for FileOutcome { file, result } in outcomes {
        match result {
            Ok(table) => {
                accepted.merged_files.push(file.name);
                accepted.tables.push(table);
            }
            Err(e) if policy == ReadPolicy::Strict => {
                error!(file = %file.name, error = %e, "[MERGE][ERROR] Read failed in strict mode, aborting");
                return Err(MergeError::Read(e));
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "[MERGE] Skipping unreadable file");
                accepted.skipped.push(SkippedFile {
                    id: file.id,
                    name: file.name,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(accepted)
}

/// List the source folder and keep spreadsheet files, newest first.
pub async fn list_candidates<S>(
    config: &MergeConfig,
    source: &S,
) -> Result<Vec<RemoteFile>, MergeError>
where
    S: FileSource + ?Sized,
{
    let folder_id = &config.source_folder_id;
    let listed = source.list_spreadsheets(folder_id).await.map_err(|e| {
        error!(folder_id = %folder_id, error = ?e, "[MERGE][ERROR] Listing failed");
        MergeError::Listing {
            folder_id: folder_id.clone(),
            reason: e.to_string(),
        }
    })?;
    let selected = select_spreadsheets(listed);
    for file in &selected {
        info!(name = %file.name, id = %file.id, created_time = %file.created_time, "[MERGE] Candidate file");
    }
    Ok(selected)
}

/// Run one full merge.
pub async fn merge<S, U>(
    config: &MergeConfig,
    source: &S,
    uploader: &U,
    clock: &dyn Clock,
) -> Result<MergeReport, MergeError>
where
    S: FileSource + ?Sized,
    U: Uploader + ?Sized,
{
    info!("[MERGE] Starting merge pipeline");
    if !config.output.has_destination() {
        return Err(MergeError::Config(
            "no output destination: set a local directory or enable upload".into(),
        ));
    }

    // --- Step 1: Select ---
    let files = list_candidates(config, source).await?;
    if files.is_empty() {
        error!(folder_id = %config.source_folder_id, "[MERGE][ERROR] No spreadsheet files found");
        return Err(MergeError::NoFiles {
            folder_id: config.source_folder_id.clone(),
        });
    }
    info!(count = files.len(), "[MERGE] Files selected");

    // --- Step 2: Download and extract, one file at a time ---
    let workdir = tempfile::Builder::new()
        .prefix("dth-merge-")
        .tempdir()
        .map_err(|e| MergeError::Write {
            destination: "temporary directory".into(),
            reason: e.to_string(),
        })?;

    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let local = download(source, &file, workdir.path()).await?;
        let result = extract_table(&local, &config.extract);
        outcomes.push(FileOutcome { file, result });
    }

    // --- Step 3: Policy, combine, normalize ---
    let accepted = apply_read_policy(config.read_policy, outcomes)?;
    let skipped = accepted.skipped;
    let merged = combine(accepted.tables).map_err(|CombineError::NoData| {
        error!(failures = skipped.len(), "[MERGE][ERROR] No file could be read");
        MergeError::NoData {
            failures: skipped.iter().map(|s| s.name.clone()).collect(),
        }
    })?;
    let merged = normalize(merged);

    // --- Step 4: Write ---
    let filename = output_filename(&config.output.prefix, clock.today(), OUTPUT_EXTENSION);
    let bytes = render_xlsx(&merged).map_err(|e| MergeError::Write {
        destination: filename.clone(),
        reason: e.to_string(),
    })?;

    // The local copy stays staged until the upload succeeded, so a failed
    // upload leaves the output directory as it was.
    let staged = match &config.output.local_dir {
        Some(dir) => Some(stage_local(&bytes, dir, &filename).map_err(|e| local_write_error(dir, e))?),
        None => None,
    };
    let mut saved_locations = Vec::new();
    if let Some(folder_id) = &config.output.upload_folder_id {
        let saved = upload_workbook(uploader, &bytes, folder_id, &filename)
            .await
            .map_err(|e| {
                error!(folder_id = %folder_id, error = ?e, "[MERGE][ERROR] Upload failed");
                MergeError::Write {
                    destination: format!("drive folder {folder_id}"),
                    reason: e.to_string(),
                }
            })?;
        saved_locations.push(saved);
    }
    if let (Some(staged), Some(dir)) = (staged, &config.output.local_dir) {
        let saved = staged.commit().map_err(|e| local_write_error(dir, e))?;
        saved_locations.insert(0, saved);
    }

    // --- Step 5: Cleanup ---
    let workdir_path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        warn!(path = %workdir_path.display(), error = ?e, "[MERGE] Failed to remove temporary files");
    }

    let report = MergeReport {
        success: true,
        filename,
        total_rows: merged.total_rows(),
        total_columns: merged.total_columns(),
        files_merged: accepted.merged_files.len(),
        merged_files: accepted.merged_files,
        skipped_files: skipped,
        saved_locations,
        sha256: sha256_hex(&bytes),
        created_at: Local::now(),
    };
    info!(
        filename = %report.filename,
        files_merged = report.files_merged,
        skipped = report.skipped_files.len(),
        total_rows = report.total_rows,
        total_columns = report.total_columns,
        "[MERGE] Merge complete"
    );
    Ok(report)
}

fn local_write_error(dir: &Path, e: WriteError) -> MergeError {
    error!(dir = %dir.display(), error = %e, "[MERGE][ERROR] Local save failed");
    MergeError::Write {
        destination: dir.display().to_string(),
        reason: e.to_string(),
    }
}

async fn download<S>(source: &S, file: &RemoteFile, dir: &Path) -> Result<std::path::PathBuf, MergeError>
where
    S: FileSource + ?Sized,
{
    info!(name = %file.name, id = %file.id, "[MERGE] Downloading file");
    source.download(file, dir).await.map_err(|e| {
        error!(name = %file.name, error = ?e, "[MERGE][ERROR] Download failed");
        MergeError::Transfer {
            file: file.name.clone(),
            reason: e.to_string(),
        }
    })
}

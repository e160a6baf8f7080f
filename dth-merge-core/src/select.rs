//! File selection: which remote files are merged, and in what order.

use tracing::{debug, info};

use crate::contract::{RemoteFile, XLSX_MIME, XLS_MIME};

const SPREADSHEET_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Drive query for the spreadsheets directly inside `folder_id`.
pub fn listing_query(folder_id: &str) -> String {
    let folder_id = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "'{folder_id}' in parents and (mimeType='{XLSX_MIME}' or mimeType='{XLS_MIME}') and trashed=false"
    )
}

pub fn is_spreadsheet(file: &RemoteFile) -> bool {
    match file.mime_type.as_deref() {
        Some(mime) => mime == XLSX_MIME || mime == XLS_MIME,
        None => {
            let name = file.name.to_ascii_lowercase();
            SPREADSHEET_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        }
    }
}

/// Keep spreadsheet files only, newest first. Ties keep listing order.
pub fn select_spreadsheets(files: Vec<RemoteFile>) -> Vec<RemoteFile> {
    let listed = files.len();
    let mut selected: Vec<RemoteFile> = files
        .into_iter()
        .filter(|f| {
            let keep = is_spreadsheet(f);
            if !keep {
                debug!(name = %f.name, mime_type = ?f.mime_type, "Skipping non-spreadsheet file");
            }
            keep
        })
        .collect();
    selected.sort_by(|a, b| b.created_time.cmp(&a.created_time));
    info!(listed, selected = selected.len(), "Selected spreadsheet files");
    selected
}

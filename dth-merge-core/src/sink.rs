//! Output side of a run: naming, rendering and writing the merged workbook.
//!
//! The workbook is rendered to bytes once and then handed to every
//! destination, so a rendering failure never leaves a partial file behind.

use chrono::{Datelike, Local, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::contract::{NewUpload, Uploader, XLSX_MIME};
use crate::error::{CollaboratorError, WriteError};
use crate::table::{Table, Value};

pub const OUTPUT_EXTENSION: &str = "xlsx";
pub const OUTPUT_SHEET_NAME: &str = "Sheet1";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the run date that names the output file.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one date.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// `<prefix>_<MonthName>_<Year>.<ext>`, month names always in English.
pub fn output_filename(prefix: &str, date: NaiveDate, extension: &str) -> String {
    let month = chrono::Month::try_from(date.month() as u8)
        .map(|m| m.name())
        .unwrap_or("Unknown");
    format!("{prefix}_{month}_{}.{extension}", date.year())
}

/// Render `table` as a single-sheet workbook: header row first, one row per
/// table row, no banner.
pub fn render_xlsx(table: &Table) -> Result<Vec<u8>, WriteError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(OUTPUT_SHEET_NAME)?;

    for (c, column) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, column.name(), &header_format)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, column) in table.columns.iter().enumerate() {
            let c = c as u16;
            match row.get(column) {
                Value::Empty => {}
                Value::Text(s) if s.is_empty() => {}
                Value::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Value::Int(i) => {
                    worksheet.write_number(r, c, *i as f64)?;
                }
                Value::Number(n) if n.is_finite() => {
                    worksheet.write_number(r, c, *n)?;
                }
                Value::Number(_) => {}
                Value::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Value::DateTime(dt) => {
                    worksheet.write_datetime_with_format(r, c, dt, &date_format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Local,
    Drive,
}

/// Where the merged workbook ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedLocation {
    pub location: Destination,
    /// Filesystem path, or the remote file id.
    pub path: String,
    pub size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The workbook written to a temporary file next to its final path, not yet
/// visible under the output name. Dropping it removes the temporary file and
/// leaves any earlier output untouched.
pub struct StagedLocal {
    tmp: tempfile::NamedTempFile,
    dir: PathBuf,
    path: PathBuf,
}

impl StagedLocal {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the staged file into place, replacing an earlier output of the
    /// same name.
    pub fn commit(self) -> Result<SavedLocation, WriteError> {
        let StagedLocal { tmp, dir, path } = self;
        tmp.persist(&path)
            .map_err(|e| io_error(&dir, &path, e.error))?;

        let size = fs::metadata(&path).map(|m| m.len()).map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = size, "Saved merged workbook locally");
        Ok(SavedLocation {
            location: Destination::Local,
            path: path.display().to_string(),
            size_mb: size as f64 / BYTES_PER_MB,
            url: None,
        })
    }
}

fn io_error(dir: &Path, path: &Path, source: std::io::Error) -> WriteError {
    if source.kind() == std::io::ErrorKind::PermissionDenied {
        WriteError::NotWritable(dir.to_path_buf())
    } else {
        WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write `bytes` to a temporary file in `dir`, creating `dir` if needed.
/// Nothing appears under `dir/filename` until [`StagedLocal::commit`].
pub fn stage_local(bytes: &[u8], dir: &Path, filename: &str) -> Result<StagedLocal, WriteError> {
    fs::create_dir_all(dir).map_err(|source| WriteError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let metadata = fs::metadata(dir).map_err(|source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    if metadata.permissions().readonly() {
        error!(path = %dir.display(), "Output directory is read-only");
        return Err(WriteError::NotWritable(dir.to_path_buf()));
    }

    let path = dir.join(filename);
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, &path, e))?;
    tmp.write_all(bytes).map_err(|e| io_error(dir, &path, e))?;
    tmp.as_file().sync_all().map_err(|e| io_error(dir, &path, e))?;
    debug!(path = %path.display(), "Staged merged workbook");
    Ok(StagedLocal {
        tmp,
        dir: dir.to_path_buf(),
        path,
    })
}

/// Write `bytes` to `dir/filename` in one step: stage, then rename into place.
pub fn save_to_local(bytes: &[u8], dir: &Path, filename: &str) -> Result<SavedLocation, WriteError> {
    stage_local(bytes, dir, filename)?.commit()
}

/// Upload `bytes` as a new xlsx file in `folder_id`.
pub async fn upload_workbook<U>(
    uploader: &U,
    bytes: &[u8],
    folder_id: &str,
    filename: &str,
) -> Result<SavedLocation, CollaboratorError>
where
    U: Uploader + ?Sized,
{
    let req = NewUpload {
        name: filename,
        parent_folder_id: folder_id,
        mime_type: XLSX_MIME,
        content: bytes,
    };
    let uploaded = uploader.upload(req).await?;
    info!(file_id = %uploaded.id, folder_id, "Uploaded merged workbook");
    Ok(SavedLocation {
        location: Destination::Drive,
        path: uploaded.id,
        size_mb: bytes.len() as f64 / BYTES_PER_MB,
        url: uploaded.web_view_link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_uses_english_month_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(output_filename("DTH", date, "xlsx"), "DTH_March_2024.xlsx");
    }

    #[test]
    fn filename_follows_the_injected_clock() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(
            output_filename("DTH", clock.today(), OUTPUT_EXTENSION),
            "DTH_December_2023.xlsx"
        );
    }

    #[test]
    fn sha256_is_lower_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn save_creates_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("2024").join("03");
        let saved = save_to_local(b"first", &dir, "DTH_March_2024.xlsx").unwrap();
        assert_eq!(saved.location, Destination::Local);
        assert_eq!(fs::read(dir.join("DTH_March_2024.xlsx")).unwrap(), b"first");
    }

    #[test]
    fn second_save_in_the_same_month_replaces_the_first() {
        let tmp = tempfile::tempdir().unwrap();
        save_to_local(b"first run", tmp.path(), "DTH_March_2024.xlsx").unwrap();
        save_to_local(b"second", tmp.path(), "DTH_March_2024.xlsx").unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("DTH_March_2024.xlsx")]);
        assert_eq!(fs::read(tmp.path().join("DTH_March_2024.xlsx")).unwrap(), b"second");
    }

    #[test]
    fn dropped_stage_leaves_no_file_and_keeps_earlier_output() {
        let tmp = tempfile::tempdir().unwrap();
        save_to_local(b"february", tmp.path(), "DTH.xlsx").unwrap();

        let staged = stage_local(b"march", tmp.path(), "DTH.xlsx").unwrap();
        assert_eq!(staged.path(), tmp.path().join("DTH.xlsx"));
        drop(staged);

        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
        assert_eq!(fs::read(tmp.path().join("DTH.xlsx")).unwrap(), b"february");
    }

    #[test]
    fn parent_that_is_a_file_cannot_be_created() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let err = save_to_local(b"data", &blocker.join("out"), "DTH.xlsx").unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_not_writable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("locked");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        let result = save_to_local(b"data", &dir, "DTH.xlsx");
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, WriteError::NotWritable(ref p) if *p == dir), "got {err:?}");
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }
}

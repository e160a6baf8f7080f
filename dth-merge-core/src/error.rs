//! Error taxonomy for a merge run.
//!
//! Per-file read failures are [`ReadError`]s and may be tolerated depending on
//! the [`ReadPolicy`](crate::config::ReadPolicy). Every [`MergeError`] is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by remote-store collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ReadErrorKind {
    #[error("cannot open workbook: {0}")]
    Open(#[from] calamine::Error),

    #[error("worksheet {0} not found")]
    SheetNotFound(String),

    #[error("no header row after skipping {skip_rows} rows")]
    MissingHeader { skip_rows: usize },
}

/// A single file could not be parsed as expected.
#[derive(Error, Debug)]
#[error("failed to read '{file}': {kind}")]
pub struct ReadError {
    pub file: String,
    pub kind: ReadErrorKind,
}

impl ReadError {
    pub fn new(file: impl Into<String>, kind: ReadErrorKind) -> Self {
        Self {
            file: file.into(),
            kind,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CombineError {
    #[error("no tables to combine")]
    NoData,
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no write permission for {0}")]
    NotWritable(PathBuf),

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot render workbook: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),
}

/// Fatal errors of a merge run.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("listing folder {folder_id} failed: {reason}")]
    Listing { folder_id: String, reason: String },

    #[error("no spreadsheet files found in folder {folder_id}")]
    NoFiles { folder_id: String },

    #[error("transfer of '{file}' failed: {reason}")]
    Transfer { file: String, reason: String },

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("no data to merge: all {} file(s) failed to read", failures.len())]
    NoData { failures: Vec<String> },

    #[error("writing to {destination} failed: {reason}")]
    Write { destination: String, reason: String },
}

impl MergeError {
    /// Stable machine-readable tag used in the JSON error report.
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::Auth(_) => "auth",
            MergeError::Config(_) => "config",
            MergeError::Listing { .. } => "listing",
            MergeError::NoFiles { .. } => "no_files",
            MergeError::Transfer { .. } => "transfer",
            MergeError::Read(_) => "read",
            MergeError::NoData { .. } => "no_data",
            MergeError::Write { .. } => "write",
        }
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::table::KnownColumn;

pub const DEFAULT_SKIP_ROWS: usize = 4;
pub const DEFAULT_OUTPUT_PREFIX: &str = "DTH";

/// Which worksheet of each source file holds the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// What to do when a single file cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    /// Abort the run on the first unreadable file.
    Strict,
    /// Skip unreadable files and report them.
    #[default]
    Lenient,
}

impl std::str::FromStr for ReadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ReadPolicy::Strict),
            "lenient" => Ok(ReadPolicy::Lenient),
            other => Err(format!("unknown read policy '{other}' (expected strict or lenient)")),
        }
    }
}

/// Options for reading a single worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub sheet: SheetSelector,
    pub skip_rows: usize,
    /// Headers whose cells are always read as text.
    pub text_columns: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            sheet: SheetSelector::default(),
            skip_rows: DEFAULT_SKIP_ROWS,
            text_columns: default_text_columns(),
        }
    }
}

/// Identifier and code columns that must never go through float inference.
pub fn default_text_columns() -> Vec<String> {
    [
        KnownColumn::KodeAkunBelanja,
        KnownColumn::KodeAkunPotonganPajak,
        KnownColumn::NpwpBendahara,
        KnownColumn::IdBilling,
    ]
    .iter()
    .map(|c| c.header().to_string())
    .collect()
}

/// Where the merged workbook goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub prefix: String,
    pub local_dir: Option<PathBuf>,
    /// Remote folder to upload into; `None` disables the upload.
    pub upload_folder_id: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            local_dir: None,
            upload_folder_id: None,
        }
    }
}

impl OutputConfig {
    pub fn has_destination(&self) -> bool {
        self.local_dir.is_some() || self.upload_folder_id.is_some()
    }
}

/// Everything a merge run needs, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub source_folder_id: String,
    pub extract: ExtractOptions,
    pub read_policy: ReadPolicy,
    pub output: OutputConfig,
}

impl MergeConfig {
    pub fn new(source_folder_id: impl Into<String>) -> Self {
        Self {
            source_folder_id: source_folder_id.into(),
            extract: ExtractOptions::default(),
            read_policy: ReadPolicy::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            source_folder_id = %self.source_folder_id,
            sheet = ?self.extract.sheet,
            skip_rows = self.extract.skip_rows,
            read_policy = ?self.read_policy,
            local_dir = ?self.output.local_dir,
            upload_folder_id = ?self.output.upload_folder_id,
            "Loaded MergeConfig"
        );
        debug!(?self, "MergeConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_layout() {
        let config = MergeConfig::new("folder");
        assert_eq!(config.extract.skip_rows, 4);
        assert_eq!(config.extract.sheet, SheetSelector::Index(0));
        assert_eq!(config.read_policy, ReadPolicy::Lenient);
        assert_eq!(config.output.prefix, "DTH");
        assert!(!config.output.has_destination());
        assert!(config
            .extract
            .text_columns
            .contains(&"ID_BILLING".to_string()));
    }

    #[test]
    fn read_policy_parses_case_insensitively() {
        assert_eq!("STRICT".parse::<ReadPolicy>(), Ok(ReadPolicy::Strict));
        assert_eq!(" lenient ".parse::<ReadPolicy>(), Ok(ReadPolicy::Lenient));
        assert!("sometimes".parse::<ReadPolicy>().is_err());
    }
}

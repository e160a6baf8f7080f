/// `load_config` module: builds the run's [`MergeConfig`] from the environment
/// (optionally seeded from `.env`) and an optional static YAML file.
///
/// # Responsibilities
/// - Read secrets and folder ids from environment variables
/// - Read static settings (sheet layout, read policy, output) from YAML
/// - Apply precedence: environment over YAML over built-in defaults
/// - Validate that at least one output destination is enabled
///
/// # Environment
/// | variable | meaning |
/// |---|---|
/// | `CREDENTIAL_FILES` | service account key file (required) |
/// | `FOLDER_ID` | source folder (required) |
/// | `DESTINATION_FOLDER_ID` | upload folder, defaults to `FOLDER_ID` |
/// | `LOCAL_SAVE_PATH` | local output directory |
/// | `UPLOAD` | `true`/`false`, default `true` |
/// | `SKIP_ROWS` | banner rows, default 4 |
/// | `SHEET_NAME` / `SHEET_INDEX` | worksheet, default index 0 |
/// | `READ_POLICY` | `strict` or `lenient` |
/// | `OUTPUT_PREFIX` | output file prefix, default `DTH` |
///
/// Loading goes through a lookup function so tests can supply variables
/// without touching the process environment.
use anyhow::{anyhow, bail, Context, Result};
use dth_merge_core::config::{ExtractOptions, MergeConfig, OutputConfig, ReadPolicy, SheetSelector};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Static settings file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub skip_rows: Option<usize>,
    /// `sheet: {name: KPP}` or `sheet: {index: 1}`.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub sheet: Option<SheetSelector>,
    pub text_columns: Option<Vec<String>>,
    pub read_policy: Option<ReadPolicy>,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    pub prefix: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub upload: Option<bool>,
    pub destination_folder_id: Option<String>,
}

/// Everything the CLI needs to run.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub credentials_file: PathBuf,
    pub merge: MergeConfig,
}

/// Load from the process environment and an optional YAML file.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Load using `lookup` for environment variables. Empty values count as unset.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<CliConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let file = match path {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };

    let credentials_file = env("CREDENTIAL_FILES").map(PathBuf::from).ok_or_else(|| {
        error!("CREDENTIAL_FILES environment variable not set");
        anyhow!("CREDENTIAL_FILES environment variable not set")
    })?;
    let source_folder_id = env("FOLDER_ID").ok_or_else(|| {
        error!("FOLDER_ID environment variable not set");
        anyhow!("FOLDER_ID environment variable not set")
    })?;

    let skip_rows = match env("SKIP_ROWS") {
        Some(raw) => raw.parse::<usize>().map_err(|e| {
            error!(error = ?e, raw = %raw, "SKIP_ROWS must be a non-negative integer");
            anyhow!("SKIP_ROWS must be a non-negative integer: {e}")
        })?,
        None => file.skip_rows.unwrap_or(dth_merge_core::config::DEFAULT_SKIP_ROWS),
    };

    let sheet = match (env("SHEET_NAME"), env("SHEET_INDEX")) {
        (Some(name), _) => SheetSelector::Name(name),
        (None, Some(raw)) => SheetSelector::Index(
            raw.parse::<usize>()
                .map_err(|e| anyhow!("SHEET_INDEX must be a non-negative integer: {e}"))?,
        ),
        (None, None) => file.sheet.unwrap_or_default(),
    };

    let read_policy = match env("READ_POLICY") {
        Some(raw) => raw.parse::<ReadPolicy>().map_err(|e| anyhow!(e))?,
        None => file.read_policy.unwrap_or_default(),
    };

    let upload = match env("UPLOAD") {
        Some(raw) => parse_bool(&raw).ok_or_else(|| anyhow!("UPLOAD must be true or false, got '{raw}'"))?,
        None => file.output.upload.unwrap_or(true),
    };
    let upload_folder_id = upload.then(|| {
        env("DESTINATION_FOLDER_ID")
            .or(file.output.destination_folder_id.clone())
            .unwrap_or_else(|| source_folder_id.clone())
    });

    let output = OutputConfig {
        prefix: env("OUTPUT_PREFIX")
            .or(file.output.prefix)
            .unwrap_or_else(|| dth_merge_core::config::DEFAULT_OUTPUT_PREFIX.to_string()),
        local_dir: env("LOCAL_SAVE_PATH").map(PathBuf::from).or(file.output.local_dir),
        upload_folder_id,
    };

    let merge = MergeConfig {
        source_folder_id,
        extract: ExtractOptions {
            sheet,
            skip_rows,
            text_columns: file
                .text_columns
                .unwrap_or_else(dth_merge_core::config::default_text_columns),
        },
        read_policy,
        output,
    };

    validate(&merge)?;
    info!(
        credentials_file = %credentials_file.display(),
        source_folder_id = %merge.source_folder_id,
        "Config loaded and merged successfully"
    );
    Ok(CliConfig {
        credentials_file,
        merge,
    })
}

/// Reject configurations that cannot produce any output.
pub fn validate(config: &MergeConfig) -> Result<()> {
    if !config.output.has_destination() {
        error!("Neither LOCAL_SAVE_PATH nor upload is enabled");
        bail!("no output destination: set LOCAL_SAVE_PATH or enable UPLOAD");
    }
    Ok(())
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    // An empty file is a valid config with every key unset.
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

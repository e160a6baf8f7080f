/// # dth-merge CLI Interface (Module)
///
/// This module implements the command line surface of dth-merge: argument
/// parsing, config loading, wiring the Drive client into the core pipeline,
/// and the JSON result printed for the caller.
///
/// All merge logic (reading, combining, normalizing, writing) lives in the
/// [`dth-merge-core`] crate. This module is strictly CLI glue.
///
/// ## Output
/// - On success the [`MergeReport`] is printed to stdout as JSON.
/// - On failure `{"success": false, "error": ..., "kind": ...}` is printed to
///   stderr and [`run`] returns the error so `main` can exit with status 1.
///
/// ## How To Use
/// - Command line: `dth-merge merge --help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`dth-merge-core`]: ../../dth_merge_core/
use crate::drive::DriveClient;
use crate::load_config::{load_config, validate, CliConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use dth_merge_core::config::ReadPolicy;
use dth_merge_core::error::MergeError;
use dth_merge_core::pipeline::{list_candidates, merge, MergeReport};
use dth_merge_core::sink::SystemClock;
use serde_json::json;
use std::path::PathBuf;

/// CLI for dth-merge: combine the month's DTH exports into one workbook.
#[derive(Parser)]
#[clap(
    name = "dth-merge",
    version,
    about = "Merge the monthly DTH spreadsheet exports from a Google Drive folder into one workbook"
)]
pub struct Cli {
    /// Optional YAML file with static settings (sheet layout, output)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge every spreadsheet in the source folder and save the result
    Merge {
        /// Abort on the first unreadable file
        #[clap(long, conflicts_with = "lenient")]
        strict: bool,
        /// Skip unreadable files and report them
        #[clap(long)]
        lenient: bool,
        /// Do not upload the result to Drive
        #[clap(long)]
        no_upload: bool,
        /// Save the result into this directory
        #[clap(long)]
        local_dir: Option<PathBuf>,
    },
    /// List the spreadsheets a merge would read, newest first
    List,
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let result = execute(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("{}", error_json(e));
    }
    result
}

async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Merge {
            strict,
            lenient,
            no_upload,
            local_dir,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_overrides(&mut config, strict, lenient, no_upload, local_dir)?;
            config.merge.trace_loaded();
            tracing::info!(command = "merge", "Starting merge");

            let client = DriveClient::from_credentials(&config.credentials_file)?;
            client.authenticate().await?;
            let report = merge(&config.merge, &client, &client, &SystemClock).await?;
            print_report(&report)?;
            Ok(())
        }
        Commands::List => {
            let config = load_config(cli.config.as_deref())?;
            tracing::info!(command = "list", folder_id = %config.merge.source_folder_id, "Listing source folder");

            let client = DriveClient::from_credentials(&config.credentials_file)?;
            client.authenticate().await?;
            let files = list_candidates(&config.merge, &client).await?;
            println!("{}", serde_json::to_string_pretty(&files)?);
            Ok(())
        }
    }
}

/// Apply command line flags on top of the loaded config.
pub fn apply_overrides(
    config: &mut CliConfig,
    strict: bool,
    lenient: bool,
    no_upload: bool,
    local_dir: Option<PathBuf>,
) -> Result<()> {
    if strict {
        config.merge.read_policy = ReadPolicy::Strict;
    } else if lenient {
        config.merge.read_policy = ReadPolicy::Lenient;
    }
    if no_upload {
        config.merge.output.upload_folder_id = None;
    }
    if local_dir.is_some() {
        config.merge.output.local_dir = local_dir;
    }
    validate(&config.merge)
}

fn print_report(report: &MergeReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Error object printed on failure. Errors raised before the pipeline runs
/// (missing variables, bad YAML) are reported as `config`.
pub fn error_json(err: &anyhow::Error) -> String {
    let kind = err
        .downcast_ref::<MergeError>()
        .map(MergeError::kind)
        .unwrap_or("config");
    let value = json!({
        "success": false,
        "error": format!("{err:#}"),
        "kind": kind,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

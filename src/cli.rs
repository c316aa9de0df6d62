//! CLI interface for fleet dispatch.
//!
//! Three tools, one per operation family, each a thin binary over this module:
//!
//! - `fleet-release` — build every container image, then tag every release.
//! - `fleet-delete` — delete the release and tag of a version everywhere.
//! - `fleet-deploy` — deploy every module to a venue, optionally with the
//!   top-level infrastructure stages around them.
//!
//! A failing repository never stops a run. Whether failures change the exit
//! status is a policy: `--strict` or `fail-on-error = true` in the config.

mod format;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::dispatch::{self, Batch, Dispatcher};
use crate::execute::Executor;
use crate::manifest::Manifest;
use crate::telemetry::{self, LogFormat};

use format::{format_request, format_result, format_tally};

/// Flags every tool shares.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// GitHub token to perform API requests. Falls back to `GITHUB_TOKEN`.
    #[arg(short = 't', long)]
    ghtoken: Option<String>,

    /// Config file (default `~/.fleet-dispatch/config.toml`, if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fleet manifest to use instead of the configured or built-in one.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Print the planned requests without sending them.
    #[arg(long)]
    dry_run: bool,

    /// Exit non-zero if any target fails.
    #[arg(long)]
    strict: bool,

    /// Write the JSON run report to this file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Log line format (overrides the config).
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

/// Trigger container builds and releases for every module.
#[derive(Debug, Parser)]
#[command(name = "fleet-release")]
pub struct ReleaseCli {
    /// Branch to build and release from.
    #[arg(short, long)]
    branch: Option<String>,

    /// Version to release under.
    #[arg(short, long)]
    version: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

/// Delete a version's release and tag from every module.
#[derive(Debug, Parser)]
#[command(name = "fleet-delete")]
pub struct DeleteCli {
    /// Version whose release and tag to delete.
    #[arg(short, long)]
    version: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

/// Trigger deploys for every module.
#[derive(Debug, Parser)]
#[command(name = "fleet-deploy")]
pub struct DeployCli {
    /// Branch to deploy.
    #[arg(short, long)]
    branch: Option<String>,

    /// Venue to deploy to.
    #[arg(short = 'n', long)]
    venue: Option<String>,

    /// Version to deploy under.
    #[arg(short, long)]
    version: Option<String>,

    /// Also deploy the top-level infrastructure stages.
    #[arg(short = 'a', long)]
    toplevel: bool,

    #[command(flatten)]
    common: CommonArgs,
}

/// Run `fleet-release`, returning an error message on failure.
pub fn release() -> Result<ExitCode, String> {
    let cli = ReleaseCli::parse();
    run_batch(&cli.common, &Batch::release(cli.branch, cli.version))
}

/// Run `fleet-delete`, returning an error message on failure.
pub fn delete() -> Result<ExitCode, String> {
    let cli = DeleteCli::parse();
    run_batch(&cli.common, &Batch::delete(cli.version))
}

/// Run `fleet-deploy`, returning an error message on failure.
pub fn deploy() -> Result<ExitCode, String> {
    let cli = DeployCli::parse();
    let batch = Batch::deploy(cli.branch, cli.version, cli.venue, cli.toplevel);
    run_batch(&cli.common, &batch)
}

/// Load config and manifest, then run the batch under a scoped log subscriber.
fn run_batch(common: &CommonArgs, batch: &Batch) -> Result<ExitCode, String> {
    let config = Config::load(common.config.as_deref()).map_err(|e| e.to_string())?;
    let manifest = config
        .manifest(common.manifest.as_deref())
        .map_err(|e| e.to_string())?;

    let format = common.log_format.unwrap_or(config.log_format);
    let dispatch = telemetry::dispatch(format);

    tracing::dispatcher::with_default(&dispatch, || {
        if common.dry_run {
            cmd_plan(&manifest, batch)
        } else {
            cmd_run(common, &config, &manifest, batch)
        }
    })
}

fn cmd_plan(manifest: &Manifest, batch: &Batch) -> Result<ExitCode, String> {
    let requests = dispatch::plan(manifest, batch).map_err(|e| e.to_string())?;
    for request in &requests {
        println!("{}", format_request(request));
    }
    eprintln!("{} request(s) planned", requests.len());
    Ok(ExitCode::SUCCESS)
}

fn cmd_run(
    common: &CommonArgs,
    config: &Config,
    manifest: &Manifest,
    batch: &Batch,
) -> Result<ExitCode, String> {
    let credentials = Credentials::resolve(common.ghtoken.as_deref()).map_err(|e| e.to_string())?;
    let executor = Executor::new(config).map_err(|e| e.to_string())?;

    let report = Dispatcher::new(manifest, &executor)
        .report(batch, &credentials)
        .map_err(|e| e.to_string())?;

    for result in &report.results {
        println!("{}", format_result(result));
    }
    println!("{}", format_tally(&report.results));

    if let Some(path) = &common.out {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("failed to serialize report: {e}"))?;
        fs::write(path, json).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        eprintln!("Report → {}", path.display());
    }

    if fails_run(report.failed(), common.strict || config.fail_on_error) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Whether a finished run exits non-zero: only with failures, and only when asked.
fn fails_run(failed: usize, fail_on_error: bool) -> bool {
    failed > 0 && fail_on_error
}

/// Turn a tool's result into the process exit status.
pub fn exit(result: Result<ExitCode, String>) -> ExitCode {
    result.unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        ExitCode::FAILURE
    })
}

use anyhow::{bail, Context as _, Result};
use std::path::PathBuf;
use std::process::ExitCode;

use super::{exit_code_for, print_device_results, print_json, select_hosts, FilterArgs};
use crate::config::{Config, PathManager};
use crate::eos::EosSession;
use crate::models::{DeviceResult, ResolvedHost};
use crate::output;
use crate::runner::run_on_hosts;
use crate::ssh::Transport;

pub const DRY_RUN_OPERATION: &str = "Push (Dry-Run)";
pub const COMMIT_OPERATION: &str = "Push (Commit)";

/// Push rendered configurations to devices (dry-run by default)
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PushArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Show the diff without committing (the default)
    #[arg(short = 'd', long = "dry-run", conflicts_with = "commit")]
    pub dry_run: bool,

    /// Commit configuration changes to devices
    #[arg(short = 'c', long = "commit", conflicts_with = "dry_run")]
    pub commit: bool,

    /// Override the directory holding rendered configurations
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(long)]
    pub force: bool,

    /// Print the operation result as JSON
    #[arg(long)]
    pub json: bool,
}

impl PushArgs {
    pub fn is_commit(&self) -> bool {
        self.commit && !self.dry_run
    }
}

pub async fn execute<T: Transport>(config: &Config, args: &PushArgs, transport: &T) -> Result<ExitCode> {
    if args.dry_run && args.commit {
        bail!("Cannot use both --dry-run and --commit");
    }
    if args.is_commit() && args.json && !args.force {
        bail!("--json with --commit needs --force, there is no prompt in JSON mode");
    }

    let selection = select_hosts(config, &args.filter)?;

    let paths = PathManager::new(config, None, args.output_dir.clone());
    paths.ensure_output_dir()?;
    paths.config_files()?;

    if !args.json {
        output::display_filtered_hosts(&selection.hosts, Some(&selection.filter_text()))?;
    }

    if selection.is_empty() {
        if !args.json {
            output::print(format!(
                "{} No devices match the specified filter",
                console::style("Warning:").yellow()
            ))?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.is_commit() {
        if !args.json {
            output::print(format!(
                "{} This will COMMIT configuration changes to devices!",
                console::style("⚠ WARNING:").red().bold()
            ))?;
            output::print(format!("{} {}", console::style("Devices affected:").yellow(), selection.hosts.len()))?;
        }
        if !args.force && !output::confirm("Do you want to continue?")? {
            output::print(console::style("Operation cancelled").yellow().to_string())?;
            return Ok(ExitCode::SUCCESS);
        }
    } else if !args.json {
        output::print(format!(
            "{} - No changes will be committed",
            console::style("INFO: Running in DRY-RUN mode").cyan()
        ))?;
    }

    let commit = args.is_commit();
    let paths = &paths;
    let timeout = config.ssh_timeout_secs;
    let operation = if commit { COMMIT_OPERATION } else { DRY_RUN_OPERATION };

    let result = run_on_hosts(operation, selection.hosts, config.num_workers, |host| async move {
        push_host(&host, paths, transport, timeout, commit).await
    })
    .await?;

    if args.json {
        print_json(&result)?;
    } else {
        for (hostname, diff) in result.diffs() {
            output::display_diff(hostname, diff)?;
        }
        print_device_results(&result)?;
        output::display_operation_summary(&result.to_summary())?;
    }

    Ok(exit_code_for(&result))
}

/// Load the host's rendered config and run it through an EOS session
async fn push_host<T: Transport>(
    host: &ResolvedHost,
    paths: &PathManager,
    transport: &T,
    timeout_secs: u64,
    commit: bool,
) -> Result<DeviceResult> {
    let path = paths.config_path(&host.name);
    let config = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("No rendered configuration at {}", path.display()))?;

    let target = host.connection_target(timeout_secs)?;
    let session = EosSession::new(transport, &target);

    if commit {
        let diff = session.commit_config(&config).await.context("Commit failed")?;
        tracing::info!("{}: configuration committed", host.name);
        let result = DeviceResult::success(&host.name)?.with_message("Configuration committed successfully");
        return Ok(if diff.trim().is_empty() { result } else { result.with_diff(diff) });
    }

    let diff = session.dry_run(&config).await?;
    if diff.trim().is_empty() {
        Ok(DeviceResult::skipped(&host.name)?.with_message("No configuration changes"))
    } else {
        Ok(DeviceResult::success(&host.name)?
            .with_message("Diff retrieved successfully")
            .with_diff(diff))
    }
}

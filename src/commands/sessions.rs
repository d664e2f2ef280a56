use anyhow::Result;
use std::collections::BTreeMap;
use std::process::ExitCode;

use super::{exit_code_for, print_device_results, select_hosts, FilterArgs};
use crate::config::Config;
use crate::eos::EosSession;
use crate::models::{ConfigSession, DeviceResult, HostSession, OperationResult, ResolvedHost};
use crate::output;
use crate::runner::collect_on_hosts;
use crate::ssh::Transport;

pub const LIST_OPERATION: &str = "List Configuration Sessions";
pub const ABORT_OPERATION: &str = "Session Abort";

/// Manage EOS configuration sessions
#[derive(Debug, Clone, clap::Subcommand)]
pub enum SessionsCommand {
    /// List configuration sessions on devices
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Abort pending configuration sessions (interactive unless --force)
    Abort {
        #[command(flatten)]
        filter: FilterArgs,

        /// Abort every pending session without prompting
        #[arg(long)]
        force: bool,
    },
}

impl SessionsCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionsCommand::List { .. } => "sessions list",
            SessionsCommand::Abort { .. } => "sessions abort",
        }
    }
}

/// What the user picked from the abort menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortChoice {
    All,
    Select,
    Cancel,
}

impl AbortChoice {
    pub fn from_menu(answer: &str) -> Self {
        match answer.trim() {
            "1" => AbortChoice::All,
            "2" => AbortChoice::Select,
            _ => AbortChoice::Cancel,
        }
    }
}

pub async fn execute<T: Transport>(
    config: &Config,
    command: &SessionsCommand,
    transport: &T,
    verbose: bool,
) -> Result<ExitCode> {
    match command {
        SessionsCommand::List { filter } => list(config, filter, transport, verbose).await,
        SessionsCommand::Abort { filter, force } => abort(config, filter, *force, transport).await,
    }
}

/// Query every host for its sessions. Query failures are recorded as FAILED.
async fn fetch_sessions<T: Transport>(
    config: &Config,
    hosts: Vec<ResolvedHost>,
    transport: &T,
) -> Result<(BTreeMap<String, Vec<ConfigSession>>, OperationResult)> {
    let timeout = config.ssh_timeout_secs;
    let outcomes = collect_on_hosts(hosts, config.num_workers, |host| async move {
        let target = host.connection_target(timeout)?;
        EosSession::new(transport, &target).list_sessions().await
    })
    .await;

    let mut queried = OperationResult::new(LIST_OPERATION)?;
    let mut found = BTreeMap::new();
    for (hostname, outcome) in outcomes {
        match outcome {
            Ok(sessions) => {
                queried.add(
                    DeviceResult::success(&hostname)?.with_message(format!("{} session(s)", sessions.len())),
                );
                found.insert(hostname, sessions);
            }
            Err(e) => {
                tracing::warn!("{}: session query failed: {:#}", hostname, e);
                queried.add(DeviceResult::failed(&hostname, format!("Failed to query sessions - {:#}", e))?);
            }
        }
    }
    Ok((found, queried))
}

async fn list<T: Transport>(config: &Config, filter: &FilterArgs, transport: &T, verbose: bool) -> Result<ExitCode> {
    let selection = select_hosts(config, filter)?;
    output::display_filtered_hosts(&selection.hosts, Some(&selection.filter_text()))?;

    if selection.is_empty() {
        output::print(format!("{} No devices match the specified filter", console::style("Warning:").yellow()))?;
        return Ok(ExitCode::SUCCESS);
    }

    let (found, queried) = fetch_sessions(config, selection.hosts, transport).await?;

    output::print(console::style("Configuration Sessions:").cyan().bold().to_string())?;
    let mut total = 0;
    let mut devices = 0;
    for (hostname, sessions) in &found {
        if sessions.is_empty() {
            output::print(format!("{} {}: No sessions", console::style("✓").green(), hostname))?;
            continue;
        }
        devices += 1;
        total += sessions.len();
        output::print(format!("{} {}: {} session(s)", console::style("•").yellow(), hostname, sessions.len()))?;
        for session in sessions {
            let marker = if session.current { " (current)" } else { "" };
            output::print(format!("   - {} - {}{}", session.name, session.state, marker))?;
            if verbose && !session.details.is_empty() {
                output::print(format!("     {}", console::style(&session.details).dim()))?;
            }
        }
    }
    for failed in queried.results().iter().filter(|r| r.error().is_some()) {
        output::print(format!(
            "{} {}: {}",
            console::style("✗").red(),
            failed.hostname(),
            failed.message()
        ))?;
    }

    output::print("")?;
    if total > 0 {
        output::print(format!(
            "{} Found {} session(s) across {} device(s)",
            console::style("Summary:").yellow().bold(),
            total,
            devices
        ))?;
    } else {
        output::print(format!(
            "{} No sessions found on any device",
            console::style("Summary:").green().bold()
        ))?;
    }

    Ok(exit_code_for(&queried))
}

async fn abort<T: Transport>(config: &Config, filter: &FilterArgs, force: bool, transport: &T) -> Result<ExitCode> {
    let selection = select_hosts(config, filter)?;
    output::display_filtered_hosts(&selection.hosts, Some(&selection.filter_text()))?;

    if selection.is_empty() {
        output::print(format!("{} No devices match the specified filter", console::style("Warning:").yellow()))?;
        return Ok(ExitCode::SUCCESS);
    }

    let hosts_by_name: BTreeMap<String, ResolvedHost> =
        selection.hosts.iter().map(|h| (h.name.clone(), h.clone())).collect();

    let (found, queried) = fetch_sessions(config, selection.hosts, transport).await?;
    for failed in queried.results().iter().filter(|r| r.error().is_some()) {
        output::print(format!("{} {}: {}", console::style("✗").red(), failed.hostname(), failed.message()))?;
    }

    let pending = pending_sessions(&found);
    if pending.is_empty() {
        output::print(format!(
            "{} No pending configuration sessions found on any device",
            console::style("✓").green()
        ))?;
        return Ok(exit_code_for(&queried));
    }

    show_pending(&pending)?;

    if force {
        return abort_all(config, &pending, &hosts_by_name, transport).await;
    }

    output::print(console::style("What would you like to do?").cyan().bold().to_string())?;
    output::print("  [1] Abort ALL pending sessions on all devices")?;
    output::print("  [2] Select specific sessions to abort")?;
    output::print("  [3] Cancel")?;
    let answer = output::prompt_choice("Enter your choice", &["1", "2", "3"], "3")?;

    match AbortChoice::from_menu(&answer) {
        AbortChoice::All => {
            output::print(format!(
                "{} This will ABORT all pending sessions on all devices!",
                console::style("⚠ WARNING:").yellow().bold()
            ))?;
            if output::confirm("Are you sure?")? {
                abort_all(config, &pending, &hosts_by_name, transport).await
            } else {
                cancelled()
            }
        }
        AbortChoice::Select => abort_selected(config, &pending, &hosts_by_name, transport).await,
        AbortChoice::Cancel => cancelled(),
    }
}

fn cancelled() -> Result<ExitCode> {
    output::print(console::style("Operation cancelled").yellow().to_string())?;
    Ok(ExitCode::SUCCESS)
}

/// Pending sessions flattened in host name order
pub fn pending_sessions(found: &BTreeMap<String, Vec<ConfigSession>>) -> Vec<HostSession> {
    found
        .iter()
        .flat_map(|(hostname, sessions)| {
            sessions.iter().filter(|s| s.is_pending()).map(move |s| HostSession {
                hostname: hostname.clone(),
                session: s.clone(),
            })
        })
        .collect()
}

fn show_pending(pending: &[HostSession]) -> std::io::Result<()> {
    output::print("")?;
    output::print(console::style("Pending Configuration Sessions:").yellow().bold().to_string())?;
    for line in output::format_sessions_table(pending) {
        output::print(line)?;
    }

    let devices: std::collections::BTreeSet<&str> = pending.iter().map(|s| s.hostname.as_str()).collect();
    output::print("")?;
    output::print(format!(
        "{} {} session(s) across {} device(s)",
        console::style("Total:").bold(),
        pending.len(),
        devices.len()
    ))
}

/// Abort every pending session on the devices that have one
async fn abort_all<T: Transport>(
    config: &Config,
    pending: &[HostSession],
    hosts_by_name: &BTreeMap<String, ResolvedHost>,
    transport: &T,
) -> Result<ExitCode> {
    let hosts: Vec<ResolvedHost> = hosts_by_name
        .values()
        .filter(|h| pending.iter().any(|s| s.hostname == h.name))
        .cloned()
        .collect();

    let result = abort_pending_on(config, hosts, transport).await?;

    print_device_results(&result)?;
    output::display_operation_summary(&result.to_summary())?;
    Ok(exit_code_for(&result))
}

/// Abort whatever is still pending on each host. The list is re-read on the
/// device, so a host with nothing left is reported and left out of the result.
async fn abort_pending_on<T: Transport>(
    config: &Config,
    hosts: Vec<ResolvedHost>,
    transport: &T,
) -> Result<OperationResult> {
    let timeout = config.ssh_timeout_secs;
    let outcomes = collect_on_hosts(hosts, config.num_workers, |host| async move {
        let target = host.connection_target(timeout)?;
        EosSession::new(transport, &target).abort_pending().await
    })
    .await;

    let mut result = OperationResult::new(ABORT_OPERATION)?;
    for (hostname, outcome) in outcomes {
        match outcome {
            Ok(0) => {
                tracing::info!("{}: no pending sessions left", hostname);
                output::print(format!("{} {}: No sessions to abort", console::style("○").dim(), hostname))?;
            }
            Ok(count) => result.add(
                DeviceResult::success(&hostname)?.with_message(format!("Aborted {} session(s)", count)),
            ),
            Err(e) => {
                tracing::warn!("{}: {:#}", hostname, e);
                result.add(DeviceResult::failed(&hostname, format!("{:#}", e))?);
            }
        }
    }
    Ok(result)
}

/// Parse a selection like `1,3,5` or `all` into zero-based indices.
/// `None` means the user cancelled.
pub fn parse_selection(input: &str, count: usize) -> Result<Option<Vec<usize>>> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("cancel") {
        return Ok(None);
    }
    if input.eq_ignore_ascii_case("all") {
        return Ok(Some((0..count).collect()));
    }

    let mut indices = Vec::new();
    for part in input.split(',') {
        let number: usize = part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid session number '{}'", part.trim()))?;
        if number == 0 || number > count {
            anyhow::bail!("Session number {} is out of range (1-{})", number, count);
        }
        if !indices.contains(&(number - 1)) {
            indices.push(number - 1);
        }
    }
    Ok(Some(indices))
}

async fn abort_selected<T: Transport>(
    config: &Config,
    pending: &[HostSession],
    hosts_by_name: &BTreeMap<String, ResolvedHost>,
    transport: &T,
) -> Result<ExitCode> {
    output::print("")?;
    output::print(console::style("Enter session numbers separated by commas (e.g. 1,3) or 'all'").dim().to_string())?;
    let answer = output::prompt("Sessions to abort", "")?;

    let Some(indices) = parse_selection(&answer, pending.len())? else {
        return cancelled();
    };
    let selected: Vec<&HostSession> = indices.iter().map(|i| &pending[*i]).collect();

    output::print(format!(
        "{} About to abort {} session(s)",
        console::style("⚠ WARNING:").yellow().bold(),
        selected.len()
    ))?;
    for s in &selected {
        output::print(format!("   - {}: {}", s.hostname, s.session.name))?;
    }
    if !output::confirm("Proceed with abort?")? {
        return cancelled();
    }

    let result = abort_sessions(config, &selected, hosts_by_name, transport).await?;
    print_device_results(&result)?;
    output::display_operation_summary(&result.to_summary())?;
    Ok(exit_code_for(&result))
}

/// Abort the given sessions one by one; one result per session
async fn abort_sessions<T: Transport>(
    config: &Config,
    selected: &[&HostSession],
    hosts_by_name: &BTreeMap<String, ResolvedHost>,
    transport: &T,
) -> Result<OperationResult> {
    let mut result = OperationResult::new(ABORT_OPERATION)?;

    for s in selected {
        let outcome = match hosts_by_name.get(&s.hostname) {
            Some(host) => match host.connection_target(config.ssh_timeout_secs) {
                Ok(target) => EosSession::new(transport, &target).abort(&s.session.name).await,
                Err(e) => Err(e),
            },
            None => Err(anyhow::anyhow!("Unknown host {}", s.hostname)),
        };

        result.add(match outcome {
            Ok(()) => DeviceResult::success(&s.hostname)?
                .with_message(format!("Session {} aborted successfully", s.session.name)),
            Err(e) => DeviceResult::failed(
                &s.hostname,
                format!("Session {} abort failed: {:#}", s.session.name, e),
            )?,
        });
    }
    Ok(result)
}

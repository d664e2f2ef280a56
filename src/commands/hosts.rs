use anyhow::{Context as _, Result};
use std::process::ExitCode;

use super::{load_inventory, select_hosts, FilterArgs};
use crate::config::Config;
use crate::output;

/// Show the inventory hosts selected by the filters
#[derive(Debug, Clone, Default, clap::Args)]
pub struct HostsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Show where each variable of one host is inherited from
    #[arg(long, value_name = "NAME", conflicts_with = "filters")]
    pub trace: Option<String>,
}

pub fn execute(config: &Config, args: &HostsArgs) -> Result<ExitCode> {
    if let Some(name) = &args.trace {
        return trace(config, name);
    }

    let selection = select_hosts(config, &args.filter)?;
    output::display_filtered_hosts(&selection.hosts, Some(&selection.filter_text()))?;
    Ok(ExitCode::SUCCESS)
}

fn trace(config: &Config, name: &str) -> Result<ExitCode> {
    let inventory = load_inventory(config)?;
    let host = inventory
        .host(name)
        .with_context(|| format!("Host '{}' not found in inventory", name))?;
    let traces = inventory.trace(name).unwrap_or_default();
    output::display_trace(&host, &traces)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::write_inventory;

    #[test]
    fn test_hosts_with_and_without_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_inventory(tmp.path());

        let args = HostsArgs {
            filter: FilterArgs {
                filters: vec!["group=spines".to_string()],
            },
            ..Default::default()
        };
        assert_eq!(execute(&config, &args).unwrap(), ExitCode::SUCCESS);

        let none = HostsArgs {
            filter: FilterArgs {
                filters: vec!["role=firewall".to_string()],
            },
            ..Default::default()
        };
        assert_eq!(execute(&config, &none).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_missing_inventory_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            inventory_hosts: tmp.path().join("nope.json"),
            ..write_inventory(tmp.path())
        };
        assert!(execute(&config, &HostsArgs::default()).is_err());
    }

    #[test]
    fn test_trace_known_and_unknown_host() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_inventory(tmp.path());

        let known = HostsArgs {
            trace: Some("l1".to_string()),
            ..Default::default()
        };
        assert_eq!(execute(&config, &known).unwrap(), ExitCode::SUCCESS);

        let unknown = HostsArgs {
            trace: Some("x9".to_string()),
            ..Default::default()
        };
        let err = execute(&config, &unknown).unwrap_err();
        assert!(err.to_string().contains("'x9' not found"));
    }
}

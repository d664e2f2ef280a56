pub mod hosts;
pub mod push;
pub mod render;
pub mod sessions;

use anyhow::Result;
use std::process::ExitCode;

use crate::config::Config;
use crate::errors::{PathError, ValidationError};
use crate::filters;
use crate::inventory::Inventory;
use crate::models::{FilterExpression, OperationResult, OperationStatus, ResolvedHost};
use crate::output;

/// Device filter options shared by every command
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterArgs {
    /// Filter devices (e.g. role=leaf). Repeat to AND filters; use | for OR (e.g. 'role=leaf|spine')
    #[arg(short = 'f', long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,
}

/// Hosts picked out of the inventory by the command line filters
pub struct Selection {
    pub expression: Option<FilterExpression>,
    pub hosts: Vec<ResolvedHost>,
}

impl Selection {
    pub fn filter_text(&self) -> String {
        filters::describe(self.expression.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Parse the filters, then load the inventory and apply them.
/// Filters are validated before any file is touched.
pub fn select_hosts(config: &Config, args: &FilterArgs) -> Result<Selection> {
    let expression = filters::parse_many(Some(args.filters.as_slice()))?;

    let inventory = load_inventory(config)?;

    let hosts = inventory.filter(expression.as_ref());
    tracing::info!(
        "Selected {} of {} host(s) with filter: {}",
        hosts.len(),
        inventory.len(),
        filters::describe(expression.as_ref())
    );

    Ok(Selection { expression, hosts })
}

/// Load the inventory files named by the configuration
pub fn load_inventory(config: &Config) -> Result<Inventory> {
    let inventory = Inventory::load(
        &config.inventory_hosts,
        &config.inventory_groups,
        &config.inventory_defaults,
    )?;
    if inventory.is_empty() {
        tracing::warn!("Inventory {} has no hosts", config.inventory_hosts.display());
    }
    Ok(inventory)
}

/// 1 when any device failed, else 0
pub fn exit_code_for(result: &OperationResult) -> ExitCode {
    if result.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// One status line per device result
pub fn print_device_results(result: &OperationResult) -> std::io::Result<()> {
    for r in result.results() {
        let line = match r.status() {
            OperationStatus::Success => format!("{} {}: {}", console::style("✓").green(), r.hostname(), r.message()),
            OperationStatus::Skipped => format!("{} {}: {}", console::style("○").dim(), r.hostname(), r.message()),
            OperationStatus::Failed => format!(
                "{} {}: {}",
                console::style("✗").red(),
                r.hostname(),
                r.error().unwrap_or_else(|| r.message())
            ),
        };
        output::print(line)?;
    }
    Ok(())
}

/// Summary plus per-device results as a single JSON document
pub fn print_json(result: &OperationResult) -> Result<()> {
    let doc = serde_json::json!({
        "summary": result.to_summary(),
        "started_at": result.started_at(),
        "results": result.results(),
    });
    output::print(serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

/// Usage lines shown after a filter syntax error
pub fn usage_examples(command: &str) -> Vec<String> {
    vec![
        format!("netauto {}", command),
        format!("netauto {} --filter role=leaf", command),
        format!("netauto {} --filter 'role=leaf|spine'", command),
        format!("netauto {} --filter role=leaf --filter name=l1", command),
    ]
}

/// Print a command error in user terms. Every error maps to exit code 1.
pub fn report_error(command: &str, err: &anyhow::Error, verbose: bool) -> ExitCode {
    if let Some(e) = err.downcast_ref::<ValidationError>() {
        let _ = output::print_error("Error:", e.to_string());
        let _ = output::eprint("");
        let _ = output::eprint(console::style("Examples of valid usage:").yellow().to_string());
        for example in usage_examples(command) {
            let _ = output::eprint(format!("  {}", example));
        }
    } else if let Some(e) = err.downcast_ref::<PathError>() {
        let _ = output::print_error("Path error:", e.to_string());
        let tip = match e {
            PathError::TemplatesNotFound(_) | PathError::TemplatesNotDirectory(_) | PathError::NoTemplates(_) => {
                "Use --templates-dir to specify a custom templates directory"
            }
            PathError::NoConfigs(_) => "Run 'netauto render' first to generate configuration files",
            _ => "Check directory permissions or use --output-dir to specify a writable directory",
        };
        let _ = output::print_tip(tip);
    } else if verbose {
        let _ = output::print_error("Error:", format!("{:?}", err));
    } else {
        let _ = output::print_error("Error:", format!("{:#}", err));
    }
    ExitCode::FAILURE
}

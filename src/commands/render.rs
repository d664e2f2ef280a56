use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;

use super::{exit_code_for, print_device_results, print_json, select_hosts, FilterArgs};
use crate::config::{Config, PathManager};
use crate::output;
use crate::render::Renderer;
use crate::runner::run_on_hosts;

pub const OPERATION_NAME: &str = "Configuration Rendering";

/// Render device configurations from templates
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Override the output directory for generated configurations
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Override the templates directory
    #[arg(short = 't', long = "templates-dir")]
    pub templates_dir: Option<PathBuf>,

    /// Print the operation result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config: &Config, args: &RenderArgs) -> Result<ExitCode> {
    let selection = select_hosts(config, &args.filter)?;

    let paths = PathManager::new(config, args.templates_dir.clone(), args.output_dir.clone());
    paths.validate_templates_dir()?;
    paths.ensure_output_dir()?;

    if !args.json {
        output::display_filtered_hosts(&selection.hosts, Some(&selection.filter_text()))?;
    }

    if selection.is_empty() {
        if !args.json {
            output::print(console::style("No devices match the filter criteria. Nothing to render.").yellow().to_string())?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let renderer = Renderer::new(paths.templates_dir(), paths.output_dir())?;
    let renderer = &renderer;

    tracing::info!(
        "Rendering {} host(s) from {} into {}",
        selection.hosts.len(),
        paths.templates_dir().display(),
        paths.output_dir().display()
    );

    let result = run_on_hosts(OPERATION_NAME, selection.hosts, config.num_workers, |host| async move {
        Ok::<_, anyhow::Error>(renderer.render_to_file(&host)?)
    })
    .await?;

    if args.json {
        print_json(&result)?;
    } else {
        print_device_results(&result)?;
        output::display_operation_summary(&result.to_summary())?;
    }

    Ok(exit_code_for(&result))
}

mod commands;
mod config;
mod eos;
mod errors;
mod filters;
mod inventory;
mod models;
mod output;
mod render;
mod runner;
mod ssh;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::hosts::HostsArgs;
use commands::push::PushArgs;
use commands::render::RenderArgs;
use commands::sessions::SessionsCommand;
use config::Config;
use ssh::SshTransport;

#[derive(Parser)]
#[command(name = "netauto")]
#[command(about = "Render and push Arista EOS configurations for a lab fabric")]
#[command(version)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render device configurations from templates
    Render(RenderArgs),

    /// Push rendered configurations to devices (dry-run by default)
    Push(PushArgs),

    /// Manage configuration sessions on devices
    #[command(subcommand)]
    Sessions(SessionsCommand),

    /// Show inventory hosts matching the filters
    Hosts(HostsArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Render(_) => "render",
            Commands::Push(_) => "push",
            Commands::Sessions(cmd) => cmd.name(),
            Commands::Hosts(_) => "hosts",
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "netauto=debug" } else { "netauto=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = Config::load();
    tracing::debug!("Project root: {}", cfg.project_root.display());
    tracing::debug!("Inventory: {}", cfg.inventory_hosts.display());
    tracing::debug!("Workers: {}, SSH timeout: {}s", cfg.num_workers, cfg.ssh_timeout_secs);

    let transport = SshTransport;
    let outcome = match &cli.command {
        Commands::Render(args) => commands::render::execute(&cfg, args).await,
        Commands::Push(args) => commands::push::execute(&cfg, args, &transport).await,
        Commands::Sessions(cmd) => commands::sessions::execute(&cfg, cmd, &transport, cli.verbose).await,
        Commands::Hosts(args) => commands::hosts::execute(&cfg, args),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => commands::report_error(cli.command.name(), &e, cli.verbose),
    }
}

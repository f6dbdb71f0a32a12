use clap::Parser;
use gnt_cli::cli::{Cli, Commands};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Normalize {
            input,
            config,
            out,
            include_deleted,
        } => {
            info!(input = %input.display(), "normalizing");
            commands::normalize::handle(input, config.as_deref(), out.as_deref(), *include_deleted)
        }
        Commands::Validate {
            input,
            config,
            json,
        } => {
            info!(input = %input.display(), "validating");
            commands::validate::handle(input, config.as_deref(), *json)
        }
        Commands::Stats {
            input,
            config,
            normalized,
            emit,
            dot,
        } => commands::stats::handle(input, config.as_deref(), *normalized, *emit, dot.as_deref()),
    }
}
